use crate::domain::entities::InstanceKey;
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    // Metric collection settings
    pub discovery_collection_retention_secs: u64,

    // Discovery metrics API settings
    pub api_listen_addr: String,

    // Prober settings
    pub probe_targets: Vec<InstanceKey>,
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
    /// HTTP path to GET instead of a plain TCP connect
    pub probe_http_path: Option<String>,

    // Optional JSON file providing the base layer, watched for changes
    pub config_file: Option<String>,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery_collection_retention_secs: 120,
            api_listen_addr: "0.0.0.0:3000".to_string(),
            probe_targets: Vec::new(),
            probe_interval_secs: 5,
            probe_timeout_ms: 1000,
            probe_http_path: None,
            config_file: None,
            debug: false,
        }
    }
}

impl Config {
    /// Retention window of the metric collection.
    pub fn retention_period(&self) -> Duration {
        Duration::from_secs(self.discovery_collection_retention_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Load configuration.
///
/// If `DISCOVERY_CONFIG_FILE` names a JSON file its values form the base
/// layer; environment variables override them. Unparsable numbers keep the
/// base value, invalid probe targets are an error.
pub fn load_config() -> anyhow::Result<Config> {
    let config_file = std::env::var("DISCOVERY_CONFIG_FILE").ok();

    let mut cfg = match &config_file {
        Some(path) => load_config_file(path)?,
        None => Config::default(),
    };
    cfg.config_file = config_file;

    cfg.discovery_collection_retention_secs = env_u64(
        "DISCOVERY_COLLECTION_RETENTION_SECS",
        cfg.discovery_collection_retention_secs,
    );

    if let Ok(addr) = std::env::var("DISCOVERY_API_LISTEN_ADDR") {
        cfg.api_listen_addr = addr;
    }

    if let Ok(targets) = std::env::var("DISCOVERY_PROBE_TARGETS") {
        cfg.probe_targets = parse_targets(&targets)?;
    }

    cfg.probe_interval_secs = env_u64("DISCOVERY_PROBE_INTERVAL_SECS", cfg.probe_interval_secs);
    cfg.probe_timeout_ms = env_u64("DISCOVERY_PROBE_TIMEOUT_MS", cfg.probe_timeout_ms);

    if let Ok(path) = std::env::var("DISCOVERY_PROBE_HTTP_PATH") {
        cfg.probe_http_path = Some(path);
    }

    if std::env::var("DEBUG").is_ok() {
        cfg.debug = true;
    }

    Ok(cfg)
}

/// Read the JSON base layer.
pub fn load_config_file(path: &str) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path))?;
    let cfg = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path))?;
    Ok(cfg)
}

fn env_u64(key: &str, current: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(current)
}

fn parse_targets(list: &str) -> anyhow::Result<Vec<InstanceKey>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<InstanceKey>().map_err(anyhow::Error::msg))
        .collect()
}

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
