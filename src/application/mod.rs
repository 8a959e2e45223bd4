//! Application Layer
//!
//! The metric collection and the process-wide handle that owns it.

pub mod handle;
pub mod metric_collection;

pub use handle::CollectionHandle;
pub use metric_collection::MetricCollection;
