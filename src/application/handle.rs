//! Collection Handle
//!
//! Process-wide holder for the metric collection. It starts out
//! uninitialized so collaborators wired up before startup finishes (or
//! after teardown) get an error instead of a crash.

use crate::application::metric_collection::MetricCollection;
use crate::domain::entities::{Metric, MetricJson};
use crate::domain::ports::MetricSink;
use crate::error::CollectionError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Shared, possibly uninitialized, metric collection.
///
/// Cloning shares the same slot. Construct once at startup, hand clones
/// to the prober and API server, and call [`shutdown`](Self::shutdown)
/// once at teardown.
#[derive(Clone, Default)]
pub struct CollectionHandle {
    slot: Arc<RwLock<Option<Arc<MetricCollection>>>>,
}

impl CollectionHandle {
    /// A handle with no collection behind it yet.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// A handle with a freshly started collection.
    pub fn new(expire_period: Duration) -> Result<Self, CollectionError> {
        let handle = Self::default();
        handle.init(expire_period)?;
        Ok(handle)
    }

    /// Create the collection, replacing and stopping any previous one.
    ///
    /// On error the handle keeps whatever it held before.
    pub fn init(&self, expire_period: Duration) -> Result<(), CollectionError> {
        let collection = MetricCollection::new(expire_period)?;
        let previous = self.slot.write().replace(collection);
        if let Some(previous) = previous {
            tracing::warn!("metric collection re-initialized, discarding previous one");
            previous.shutdown();
        }
        Ok(())
    }

    /// The current collection, if initialized.
    pub fn get(&self) -> Option<Arc<MetricCollection>> {
        self.slot.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.read().is_some()
    }

    fn collection(&self) -> Result<Arc<MetricCollection>, CollectionError> {
        self.get().ok_or(CollectionError::NilCollection)
    }

    pub fn append(&self, metric: impl Into<Option<Metric>>) -> Result<(), CollectionError> {
        self.collection()?.append(metric)
    }

    pub fn since(&self, t: DateTime<Utc>) -> Result<Option<Vec<Arc<Metric>>>, CollectionError> {
        self.collection()?.since(t)
    }

    pub fn json_since(&self, t: DateTime<Utc>) -> Result<Option<Vec<MetricJson>>, CollectionError> {
        self.collection()?.json_since(t)
    }

    /// Re-read the retention period. A no-op when uninitialized.
    pub fn reload(&self) -> Result<(), CollectionError> {
        match self.get() {
            Some(collection) => collection.reload(),
            None => Ok(()),
        }
    }

    /// Stop expiry and release the collection. A no-op when uninitialized.
    pub fn shutdown(&self) {
        if let Some(collection) = self.slot.write().take() {
            collection.shutdown();
        }
    }
}

impl MetricSink for CollectionHandle {
    fn record(&self, metric: Metric) -> Result<(), CollectionError> {
        self.append(metric)
    }
}
