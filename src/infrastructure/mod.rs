//! Infrastructure Layer
//!
//! Background loops and cross-cutting concerns around the metric collection.

pub mod config_watcher;
pub mod prober;
pub mod shutdown;

pub use config_watcher::{ConfigChange, ConfigWatchError, ConfigWatcher};
pub use prober::{DiscoveryProber, ProbeConfig, ProbeType};
pub use shutdown::{shutdown_signal, ShutdownController};
