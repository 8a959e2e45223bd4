//! discovery-metrics Library
//!
//! In-memory, time-bounded store of discovery latency metrics with a
//! prober that produces them and an HTTP API that serves them.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{CollectionHandle, MetricCollection};
pub use config::{load_config, Config};
pub use domain::entities::{InstanceKey, Metric, MetricJson};
pub use domain::ports::MetricSink;
pub use domain::value_objects::Seconds;
pub use error::CollectionError;
