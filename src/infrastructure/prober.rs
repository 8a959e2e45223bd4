//! Discovery Prober
//!
//! Periodically probes discovered instances via TCP or HTTP and records one
//! latency metric per probe.

use crate::domain::entities::{InstanceKey, Metric};
use crate::domain::ports::MetricSink;
use crate::infrastructure::shutdown::ShutdownController;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// Prober configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Interval between probe rounds
    pub interval: Duration,
    /// Timeout for each step of a probe
    pub timeout: Duration,
    /// Type of probe
    pub probe_type: ProbeType,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(1),
            probe_type: ProbeType::Tcp,
        }
    }
}

/// Type of probe sent to an instance.
#[derive(Debug, Clone)]
pub enum ProbeType {
    /// Simple TCP connection check
    Tcp,
    /// HTTP GET request (expects 2xx response)
    Http { path: String },
}

/// Active prober feeding a metric sink.
///
/// Each probe measures three latencies: resolving the instance address
/// (backend), the instance answering the probe (instance) and the whole
/// probe (total). The metric is left unstamped so the sink stamps it.
#[derive(Clone)]
pub struct DiscoveryProber {
    config: ProbeConfig,
    targets: Arc<Vec<InstanceKey>>,
    sink: Arc<dyn MetricSink>,
}

impl DiscoveryProber {
    /// Create a new prober.
    pub fn new(config: ProbeConfig, targets: Vec<InstanceKey>, sink: Arc<dyn MetricSink>) -> Self {
        Self {
            config,
            targets: Arc::new(targets),
            sink,
        }
    }

    /// Start the probe loop. It runs until `shutdown` is requested.
    pub fn start(&self, shutdown: ShutdownController) -> JoinHandle<()> {
        let prober = self.clone();
        let mut shutdown_rx = shutdown.subscribe();

        tokio::spawn(async move {
            if shutdown.is_shutdown() {
                return;
            }
            let mut interval = tokio::time::interval(prober.config.interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        prober.probe_all().await;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            tracing::debug!("discovery prober stopped");
        })
    }

    /// Probe every target once and record the results.
    ///
    /// Returns how many metrics the sink accepted.
    pub async fn probe_all(&self) -> usize {
        let mut recorded = 0;

        for key in self.targets.iter() {
            let metric = Self::probe(key, &self.config).await;
            tracing::debug!(
                "probed {} total={:?} err={:?}",
                key,
                metric.total_latency,
                metric.err
            );

            match self.sink.record(metric) {
                Ok(()) => recorded += 1,
                Err(e) => tracing::warn!("failed to record discovery metric for {}: {}", key, e),
            }
        }

        recorded
    }

    /// Perform a single probe against an instance.
    pub async fn probe(key: &InstanceKey, config: &ProbeConfig) -> Metric {
        let metric = Metric::new(key.clone());
        let start = Instant::now();

        let addr = match Self::resolve(key, config.timeout).await {
            Ok(addr) => addr,
            Err(e) => {
                let elapsed = start.elapsed();
                return metric
                    .with_latencies(elapsed, Duration::ZERO, elapsed)
                    .with_error(e);
            }
        };
        let backend_latency = start.elapsed();

        let instance_start = Instant::now();
        let result = match &config.probe_type {
            ProbeType::Tcp => Self::tcp_check(addr, config.timeout).await,
            ProbeType::Http { path } => Self::http_check(addr, path, config.timeout).await,
        };
        let instance_latency = instance_start.elapsed();

        let metric = metric.with_latencies(backend_latency, instance_latency, start.elapsed());
        match result {
            Ok(()) => metric,
            Err(e) => metric.with_error(e),
        }
    }

    /// Resolve the instance to its first socket address.
    async fn resolve(key: &InstanceKey, timeout: Duration) -> Result<SocketAddr, String> {
        let lookup = tokio::net::lookup_host((key.hostname.as_str(), key.port));
        match tokio::time::timeout(timeout, lookup).await {
            Ok(Ok(mut addrs)) => addrs
                .next()
                .ok_or_else(|| format!("resolve failed: no addresses for {}", key)),
            Ok(Err(e)) => Err(format!("resolve failed: {}", e)),
            Err(_) => Err("resolve timeout".to_string()),
        }
    }

    /// TCP connection check.
    async fn tcp_check(addr: SocketAddr, timeout: Duration) -> Result<(), String> {
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(mut stream)) => {
                let _ = stream.shutdown().await;
                Ok(())
            }
            Ok(Err(e)) => Err(format!("connection failed: {}", e)),
            Err(_) => Err("connection timeout".to_string()),
        }
    }

    /// HTTP check.
    async fn http_check(addr: SocketAddr, path: &str, timeout: Duration) -> Result<(), String> {
        let url = format!("http://{}{}", addr, path);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("client error: {}", e))?;

        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(format!("unhealthy status: {}", resp.status())),
            Err(e) => Err(format!("request failed: {}", e)),
        }
    }
}
