//! Configuration Hot Reload
//!
//! Watches configuration files for changes and broadcasts reload events, so
//! the metric collection can pick up a new retention period without a
//! restart.

use crate::infrastructure::shutdown::ShutdownController;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// Configuration change event.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigChange {
    /// A configuration file was modified
    FileModified(PathBuf),
    /// A reload was requested explicitly (e.g. SIGHUP)
    FullReload,
}

/// Configuration watcher that detects changes.
pub struct ConfigWatcher {
    /// Files being watched with their last modification time
    watched_files: Arc<RwLock<HashMap<PathBuf, SystemTime>>>,
    /// Broadcast channel for change notifications
    change_tx: broadcast::Sender<ConfigChange>,
    /// Poll interval for file changes
    poll_interval: Duration,
}

impl ConfigWatcher {
    /// Create a new configuration watcher.
    pub fn new(poll_interval: Duration) -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            watched_files: Arc::new(RwLock::new(HashMap::new())),
            change_tx,
            poll_interval,
        }
    }

    /// Add a file to watch for changes.
    pub async fn watch_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigWatchError> {
        let path = path.as_ref().to_path_buf();

        let mtime = std::fs::metadata(&path)
            .map_err(|e| ConfigWatchError::FileError(path.clone(), e.to_string()))?
            .modified()
            .map_err(|e| ConfigWatchError::FileError(path.clone(), e.to_string()))?;

        self.watched_files.write().await.insert(path, mtime);
        Ok(())
    }

    /// Subscribe to configuration changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.change_tx.subscribe()
    }

    /// Manually trigger a full reload notification.
    pub fn notify_reload(&self) {
        let _ = self.change_tx.send(ConfigChange::FullReload);
    }

    /// Check watched files for modifications.
    async fn check_files(&self) -> Vec<PathBuf> {
        let mut modified = Vec::new();
        let mut files = self.watched_files.write().await;

        for (path, last_mtime) in files.iter_mut() {
            if let Ok(metadata) = std::fs::metadata(path) {
                if let Ok(mtime) = metadata.modified() {
                    if mtime > *last_mtime {
                        modified.push(path.clone());
                        *last_mtime = mtime;
                    }
                }
            }
        }

        modified
    }

    /// Start the file watcher loop.
    ///
    /// This spawns a background task that periodically checks for file
    /// changes until `shutdown` is requested.
    pub fn start(self: Arc<Self>, shutdown: ShutdownController) -> JoinHandle<()> {
        let watcher = self.clone();
        let mut shutdown_rx = shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(watcher.poll_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let modified = watcher.check_files().await;
                        for path in modified {
                            tracing::info!(?path, "configuration file modified");
                            let _ = watcher.change_tx.send(ConfigChange::FileModified(path));
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        })
    }
}

impl Default for ConfigWatcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Errors that can occur during configuration watching.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigWatchError {
    /// File operation failed
    #[error("file error for {0:?}: {1}")]
    FileError(PathBuf, String),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Push a file's mtime forward so the change is visible regardless of
    /// filesystem timestamp granularity.
    fn bump_mtime(file: &NamedTempFile) {
        let later = SystemTime::now() + Duration::from_secs(5);
        file.as_file().set_modified(later).unwrap();
    }

    #[test]
    fn test_config_watcher_new() {
        let watcher = ConfigWatcher::new(Duration::from_secs(10));
        assert_eq!(watcher.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_config_watcher_default() {
        let watcher = ConfigWatcher::default();
        assert_eq!(watcher.poll_interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_watch_file() {
        let watcher = ConfigWatcher::default();
        let temp_file = NamedTempFile::new().unwrap();

        let result = watcher.watch_file(temp_file.path()).await;
        assert!(result.is_ok());
        assert!(watcher.watched_files.read().await.contains_key(temp_file.path()));
    }

    #[tokio::test]
    async fn test_watch_nonexistent_file() {
        let watcher = ConfigWatcher::default();
        let result = watcher.watch_file("/nonexistent/file.conf").await;
        assert!(matches!(result, Err(ConfigWatchError::FileError(_, _))));
    }

    #[tokio::test]
    async fn test_notify_reload() {
        let watcher = ConfigWatcher::default();
        let mut rx = watcher.subscribe();

        watcher.notify_reload();

        let change = rx.recv().await.unwrap();
        assert_eq!(change, ConfigChange::FullReload);
    }

    #[tokio::test]
    async fn test_check_files_detects_modification() {
        let watcher = ConfigWatcher::default();
        let mut temp_file = NamedTempFile::new().unwrap();

        watcher.watch_file(temp_file.path()).await.unwrap();

        // First check should find no modifications
        let modified = watcher.check_files().await;
        assert!(modified.is_empty());

        writeln!(temp_file, r#"{{"discovery_collection_retention_secs": 30}}"#).unwrap();
        bump_mtime(&temp_file);

        // Second check should detect modification
        let modified = watcher.check_files().await;
        assert_eq!(modified, vec![temp_file.path().to_path_buf()]);

        // And only once
        assert!(watcher.check_files().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_broadcasts_file_change() {
        let watcher = Arc::new(ConfigWatcher::new(Duration::from_millis(20)));
        let temp_file = NamedTempFile::new().unwrap();
        watcher.watch_file(temp_file.path()).await.unwrap();

        let mut rx = watcher.subscribe();
        let shutdown = ShutdownController::new();
        let handle = watcher.clone().start(shutdown.clone());

        bump_mtime(&temp_file);

        let change = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change, ConfigChange::FileModified(temp_file.path().to_path_buf()));

        shutdown.shutdown();
        assert!(tokio::time::timeout(Duration::from_secs(1), handle).await.is_ok());
    }

    #[test]
    fn test_config_watch_error_display() {
        let err = ConfigWatchError::FileError(PathBuf::from("/test"), "not found".to_string());
        assert!(err.to_string().contains("file error"));
        assert!(err.to_string().contains("/test"));
    }
}
