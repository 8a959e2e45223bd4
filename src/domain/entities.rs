//! Domain Entities - Core business objects
//!
//! These entities represent the discovery measurements stored by the
//! metric collection and the display records handed to API consumers.

use crate::domain::value_objects::{format_timestamp, Seconds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Identifies a discovered instance by hostname and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    /// Hostname (or IP literal) of the instance
    pub hostname: String,
    /// Service port of the instance
    pub port: u16,
}

impl InstanceKey {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

impl FromStr for InstanceKey {
    type Err = String;

    /// Parse `host:port`. The port is taken after the last colon.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("missing port in instance key {:?}", s))?;
        if host.is_empty() {
            return Err(format!("missing hostname in instance key {:?}", s));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port in instance key {:?}: {}", s, e))?;
        Ok(Self::new(host, port))
    }
}

/// A single discovery measurement.
///
/// A metric whose `timestamp` is the zero value (the UNIX epoch, which is
/// what `Default` yields) has not been stamped yet; the collection stamps
/// it with the current time when it is appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// When the measurement was taken
    pub timestamp: DateTime<Utc>,
    /// Instance that was probed
    pub instance_key: InstanceKey,
    /// Time spent reaching the backend before talking to the instance
    pub backend_latency: Duration,
    /// Time the instance took to respond
    pub instance_latency: Duration,
    /// Total time of the probe
    pub total_latency: Duration,
    /// Error outcome of the probe, if it failed
    pub err: Option<String>,
}

impl Metric {
    /// Create an unstamped metric with zero latencies.
    pub fn new(instance_key: InstanceKey) -> Self {
        Self {
            timestamp: DateTime::<Utc>::default(),
            instance_key,
            backend_latency: Duration::ZERO,
            instance_latency: Duration::ZERO,
            total_latency: Duration::ZERO,
            err: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_latencies(mut self, backend: Duration, instance: Duration, total: Duration) -> Self {
        self.backend_latency = backend;
        self.instance_latency = instance;
        self.total_latency = total;
        self
    }

    pub fn with_error(mut self, err: impl Into<String>) -> Self {
        self.err = Some(err.into());
        self
    }

    /// Whether the metric still carries the zero timestamp.
    pub fn is_unstamped(&self) -> bool {
        self.timestamp == DateTime::<Utc>::default()
    }
}

/// Serialization-friendly projection of a [`Metric`] for API consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricJson {
    pub timestamp: String,
    pub hostname: String,
    pub port: u16,
    pub backend_latency: Seconds,
    pub instance_latency: Seconds,
    pub total_latency: Seconds,
    pub err: Option<String>,
}

impl From<&Metric> for MetricJson {
    fn from(m: &Metric) -> Self {
        Self {
            timestamp: format_timestamp(&m.timestamp),
            hostname: m.instance_key.hostname.clone(),
            port: m.instance_key.port,
            backend_latency: Seconds::from(m.backend_latency),
            instance_latency: Seconds::from(m.instance_latency),
            total_latency: Seconds::from(m.total_latency),
            err: m.err.clone(),
        }
    }
}
