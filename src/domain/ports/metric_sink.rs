//! Metric Sink Port
//!
//! Defines the interface the discovery prober records measurements through.

use crate::domain::entities::Metric;
use crate::error::CollectionError;

/// Destination for discovery metrics.
///
/// This is an outbound port for the prober. Implementations must accept
/// metrics in chronological order and stamp unstamped ones on arrival.
pub trait MetricSink: Send + Sync {
    /// Record a single measurement.
    fn record(&self, metric: Metric) -> Result<(), CollectionError>;
}
