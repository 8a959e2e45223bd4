//! Metric Collection Errors
//!
//! Every condition here is returned immediately to the caller and is
//! recoverable; nothing in the collection is fatal to the process.

/// Errors returned by metric collection operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// Operation invoked before the collection was initialized.
    #[error("metric collection is not initialized")]
    NilCollection,
    /// Append was handed no metric.
    #[error("cannot append a missing metric")]
    NilMetric,
    /// The retention period could not be re-read from configuration.
    #[error("failed to load configuration: {0}")]
    Config(String),
    /// Created outside a tokio runtime, so expiry cannot be scheduled.
    #[error("metric collection requires a running tokio runtime")]
    NoRuntime,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CollectionError::NilCollection.to_string(),
            "metric collection is not initialized"
        );
        assert_eq!(
            CollectionError::NilMetric.to_string(),
            "cannot append a missing metric"
        );
        assert_eq!(
            CollectionError::NoRuntime.to_string(),
            "metric collection requires a running tokio runtime"
        );
        assert!(CollectionError::Config("bad file".to_string())
            .to_string()
            .contains("bad file"));
    }
}
