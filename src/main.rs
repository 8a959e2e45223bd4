//! discovery-metrics - in-memory discovery latency store with HTTP API
//!
//! This is the composition root that wires together all the components.

use discovery_metrics::adapters::inbound::ApiServer;
use discovery_metrics::application::CollectionHandle;
use discovery_metrics::config::load_config;
use discovery_metrics::domain::ports::MetricSink;
use discovery_metrics::infrastructure::{
    shutdown_signal, ConfigChange, ConfigWatcher, DiscoveryProber, ProbeConfig, ProbeType,
    ShutdownController,
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting discovery-metrics listen={} retention={:?} targets={}",
        cfg.api_listen_addr,
        cfg.retention_period(),
        cfg.probe_targets.len()
    );

    let shutdown = ShutdownController::new();

    // ===== COMPOSITION ROOT =====

    // 1. Metric collection (process-wide, passed explicitly)
    let collection = CollectionHandle::new(cfg.retention_period())?;

    // 2. Prober feeding the collection
    let probe_type = match &cfg.probe_http_path {
        Some(path) => ProbeType::Http { path: path.clone() },
        None => ProbeType::Tcp,
    };
    let sink: Arc<dyn MetricSink> = Arc::new(collection.clone());
    let prober = DiscoveryProber::new(
        ProbeConfig {
            interval: cfg.probe_interval(),
            timeout: cfg.probe_timeout(),
            probe_type,
        },
        cfg.probe_targets.clone(),
        sink,
    );
    prober.start(shutdown.clone());

    // 3. Configuration reload: file changes and SIGHUP
    let watcher = Arc::new(ConfigWatcher::default());
    if let Some(path) = &cfg.config_file {
        watcher.watch_file(path).await?;
        tracing::info!("watching configuration file {}", path);
    }
    tokio::spawn(reload_on_change(
        watcher.subscribe(),
        collection.clone(),
        shutdown.clone(),
    ));
    watcher.clone().start(shutdown.clone());
    #[cfg(unix)]
    tokio::spawn(reload_on_sighup(watcher.clone(), shutdown.clone()));

    // 4. Termination signals
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // 5. Inbound API, runs until shutdown
    let server = ApiServer::new(cfg.api_listen_addr.clone(), collection.clone());
    let result = server.run(shutdown.clone()).await;

    shutdown.shutdown();
    collection.shutdown();
    tracing::info!("discovery-metrics stopped");

    result
}

/// Apply a configuration change to the collection's retention period.
async fn reload_on_change(
    mut changes: broadcast::Receiver<ConfigChange>,
    collection: CollectionHandle,
    shutdown: ShutdownController,
) {
    let mut shutdown_rx = shutdown.subscribe();

    loop {
        let change = tokio::select! {
            change = changes.recv() => change,
            _ = shutdown_rx.recv() => break,
        };

        match change {
            Ok(change) => tracing::info!(?change, "reloading configuration"),
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!("missed {} configuration changes, reloading", missed)
            }
            Err(RecvError::Closed) => break,
        }

        if let Err(e) = collection.reload() {
            tracing::warn!("configuration reload failed: {}", e);
        }
    }
}

#[cfg(unix)]
async fn reload_on_sighup(watcher: Arc<ConfigWatcher>, shutdown: ShutdownController) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("failed to install SIGHUP handler: {}", e);
            return;
        }
    };
    let mut shutdown_rx = shutdown.subscribe();

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                tracing::info!("received SIGHUP, requesting configuration reload");
                watcher.notify_reload();
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}
