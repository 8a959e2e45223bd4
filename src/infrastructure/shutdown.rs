//! Shutdown Coordination
//!
//! Idempotent cancellation shared by the metric collection's expiry task,
//! the prober, the config watcher and the API server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Cancellation token for background loops.
///
/// Requesting shutdown more than once, or after every listener has
/// already exited, is a harmless no-op.
#[derive(Clone)]
pub struct ShutdownController {
    /// Whether shutdown has been initiated
    shutdown_initiated: Arc<AtomicBool>,
    /// Broadcast channel for shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownController {
    /// Create a new shutdown controller.
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Subscribe to shutdown notifications.
    ///
    /// Subscribe before spawning the task that listens, otherwise a
    /// shutdown requested in between is missed by `recv`. Use [`wait`]
    /// when that ordering cannot be guaranteed.
    ///
    /// [`wait`]: ShutdownController::wait
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Request shutdown.
    ///
    /// Returns `true` only for the call that actually initiated it.
    pub fn shutdown(&self) -> bool {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            return false;
        }
        // No receivers is fine: nobody is left to stop.
        let _ = self.shutdown_tx.send(());
        true
    }

    /// Check if shutdown has been initiated.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested, including before this call.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Install signal handlers for graceful shutdown.
///
/// Returns a future that completes when a shutdown signal is received.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }

    controller.shutdown();
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shutdown_controller_new() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutdown());
    }

    #[test]
    fn test_shutdown_controller_default() {
        let controller = ShutdownController::default();
        assert!(!controller.is_shutdown());
    }

    #[test]
    fn test_shutdown_initiates_once() {
        let controller = ShutdownController::new();

        assert!(controller.shutdown());
        assert!(controller.is_shutdown());

        // Calling again should be idempotent
        assert!(!controller.shutdown());
        assert!(controller.is_shutdown());
    }

    #[test]
    fn test_shutdown_without_subscribers_does_not_block() {
        let controller = ShutdownController::new();
        let rx = controller.subscribe();
        drop(rx);

        assert!(controller.shutdown());
        assert!(!controller.shutdown());
    }

    #[tokio::test]
    async fn test_subscribe_receives_shutdown() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();

        controller.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_after_shutdown_returns_immediately() {
        let controller = ShutdownController::new();
        controller.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), controller.wait()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_resolves_on_later_shutdown() {
        let controller = ShutdownController::new();
        let ctrl = controller.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            ctrl.shutdown();
        });

        let result = tokio::time::timeout(Duration::from_millis(500), controller.wait()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_pending_without_shutdown() {
        let controller = ShutdownController::new();
        let result = tokio::time::timeout(Duration::from_millis(50), controller.wait()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_clone() {
        let controller = ShutdownController::new();
        let cloned = controller.clone();

        cloned.shutdown();
        assert!(controller.is_shutdown());
    }
}
