//! Metric Collection - time-bounded store of discovery metrics
//!
//! Holds the most recent discovery measurements in timestamp order so the
//! monitoring API can ask for everything since a point in time. A background
//! task trims entries that fall out of the retention window once a second.

use crate::config::load_config;
use crate::domain::entities::{Metric, MetricJson};
use crate::domain::ports::MetricSink;
use crate::error::CollectionError;
use crate::infrastructure::shutdown::ShutdownController;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;

/// How often the background task trims expired metrics.
const EXPIRY_INTERVAL: Duration = Duration::from_secs(1);

struct CollectionState {
    /// Metrics in non-decreasing timestamp order
    metrics: VecDeque<Arc<Metric>>,
    /// How long metrics are kept
    expire_period: Duration,
}

impl CollectionState {
    /// Drop every metric strictly older than `t`. Returns how many went.
    fn remove_before(&mut self, t: DateTime<Utc>) -> usize {
        let first = self.metrics.partition_point(|m| m.timestamp < t);
        self.metrics.drain(..first);
        first
    }
}

/// Thread-safe, time-ordered collection of discovery metrics.
///
/// Callers are expected to append in chronological order; the range
/// operations rely on it and do not re-sort. Every operation takes the
/// same lock, so expiry never interleaves with reads or writes.
pub struct MetricCollection {
    state: Mutex<CollectionState>,
    shutdown: ShutdownController,
}

impl MetricCollection {
    /// Create an empty collection and start its expiry task.
    ///
    /// Fails with [`CollectionError::NoRuntime`] outside a tokio runtime.
    pub fn new(expire_period: Duration) -> Result<Arc<Self>, CollectionError> {
        let runtime = Handle::try_current().map_err(|_| CollectionError::NoRuntime)?;

        let collection = Arc::new(Self {
            state: Mutex::new(CollectionState {
                metrics: VecDeque::new(),
                expire_period,
            }),
            shutdown: ShutdownController::new(),
        });
        collection.start_expiry(&runtime);
        Ok(collection)
    }

    /// Spawn the once-a-second expiry loop.
    ///
    /// The loop holds only a weak reference, so dropping the last handle
    /// also ends it.
    fn start_expiry(self: &Arc<Self>, runtime: &Handle) {
        let collection: Weak<Self> = Arc::downgrade(self);
        let mut shutdown_rx = self.shutdown.subscribe();

        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(EXPIRY_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(collection) = collection.upgrade() else {
                            break;
                        };
                        let removed = collection.expire(Utc::now());
                        if removed > 0 {
                            tracing::debug!("metric collection expired {} entries", removed);
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            drop(ticker);
            tracing::debug!("metric collection expiry stopped");
        });
    }

    /// Append a metric, stamping it with the current time if unstamped.
    ///
    /// Accepts `Option<Metric>` so a missing record is reported as
    /// [`CollectionError::NilMetric`] rather than silently dropped.
    pub fn append(&self, metric: impl Into<Option<Metric>>) -> Result<(), CollectionError> {
        let mut metric = metric.into().ok_or(CollectionError::NilMetric)?;

        // Stamp under the lock so concurrent appends stay in time order.
        let mut state = self.state.lock();
        if metric.is_unstamped() {
            metric.timestamp = Utc::now();
        }
        state.metrics.push_back(Arc::new(metric));
        Ok(())
    }

    /// Metrics with a timestamp on or after `t`, oldest first.
    ///
    /// Returns `Ok(None)` when nothing is stored at all and `Ok(Some(vec![]))`
    /// when `t` is newer than every stored metric. The result shares the
    /// records but not the storage, so later expiry cannot change it.
    pub fn since(&self, t: DateTime<Utc>) -> Result<Option<Vec<Arc<Metric>>>, CollectionError> {
        let state = self.state.lock();
        if state.metrics.is_empty() {
            return Ok(None);
        }

        let first = state.metrics.partition_point(|m| m.timestamp < t);
        Ok(Some(state.metrics.range(first..).cloned().collect()))
    }

    /// [`since`](Self::since) projected into API display records.
    pub fn json_since(&self, t: DateTime<Utc>) -> Result<Option<Vec<MetricJson>>, CollectionError> {
        let raw = self.since(t)?;
        Ok(raw.map(|metrics| metrics.iter().map(|m| MetricJson::from(m.as_ref())).collect()))
    }

    /// Trim everything older than `now - expire_period`.
    ///
    /// Period lookup and trim happen under the same lock.
    fn expire(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.lock();
        match expiry_cutoff(now, state.expire_period) {
            Some(cutoff) => state.remove_before(cutoff),
            None => 0,
        }
    }

    /// Re-read the retention period from configuration and apply it.
    pub fn reload(&self) -> Result<(), CollectionError> {
        let cfg = load_config().map_err(|e| CollectionError::Config(format!("{:#}", e)))?;
        self.set_expire_period(cfg.retention_period());
        Ok(())
    }

    /// Change the retention period. Returns whether it changed.
    ///
    /// Existing metrics are left alone; the new period applies from the
    /// next expiry tick.
    pub fn set_expire_period(&self, period: Duration) -> bool {
        let mut state = self.state.lock();
        if state.expire_period == period {
            return false;
        }
        tracing::info!(
            "metric collection expire period changed from {:?} to {:?}",
            state.expire_period,
            period
        );
        state.expire_period = period;
        true
    }

    pub fn expire_period(&self) -> Duration {
        self.state.lock().expire_period
    }

    /// Stop the expiry task. Further calls are no-ops.
    ///
    /// The collection stays usable afterwards but is no longer trimmed.
    pub fn shutdown(&self) {
        if self.shutdown.shutdown() {
            tracing::info!("metric collection: signalling expiry task to stop");
        } else {
            tracing::debug!("metric collection: expiry task already stopping");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_shutdown()
    }

    pub fn len(&self) -> usize {
        self.state.lock().metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().metrics.is_empty()
    }
}

impl Drop for MetricCollection {
    fn drop(&mut self) {
        self.shutdown.shutdown();
    }
}

impl MetricSink for MetricCollection {
    fn record(&self, metric: Metric) -> Result<(), CollectionError> {
        self.append(metric)
    }
}

/// `now - period`, or `None` when that is not representable.
fn expiry_cutoff(now: DateTime<Utc>, period: Duration) -> Option<DateTime<Utc>> {
    let period = TimeDelta::from_std(period).ok()?;
    now.checked_sub_signed(period)
}
