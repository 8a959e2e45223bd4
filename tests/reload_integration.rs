//! Integration test for configuration hot reload
//!
//! A modified config file is picked up by the watcher and applied to the
//! collection's retention period.

use discovery_metrics::infrastructure::{ConfigChange, ConfigWatcher, ShutdownController};
use discovery_metrics::CollectionHandle;
use std::io::{Seek, Write};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

fn write_retention(file: &mut NamedTempFile, secs: u64) {
    file.as_file().set_len(0).unwrap();
    file.rewind().unwrap();
    writeln!(file, r#"{{"discovery_collection_retention_secs": {}}}"#, secs).unwrap();
    file.as_file().sync_all().unwrap();
}

#[tokio::test]
async fn test_file_change_reloads_retention() {
    let mut file = NamedTempFile::new().unwrap();
    write_retention(&mut file, 45);
    std::env::set_var("DISCOVERY_CONFIG_FILE", file.path());

    let collection = CollectionHandle::new(Duration::from_secs(120)).unwrap();
    collection.reload().unwrap();
    assert_eq!(
        collection.get().unwrap().expire_period(),
        Duration::from_secs(45)
    );

    let watcher = Arc::new(ConfigWatcher::new(Duration::from_millis(20)));
    watcher.watch_file(file.path()).await.unwrap();
    let mut changes = watcher.subscribe();
    let shutdown = ShutdownController::new();
    let handle = watcher.clone().start(shutdown.clone());

    write_retention(&mut file, 30);
    file.as_file()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    let change = tokio::time::timeout(Duration::from_secs(1), changes.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(change, ConfigChange::FileModified(file.path().to_path_buf()));

    collection.reload().unwrap();
    assert_eq!(
        collection.get().unwrap().expire_period(),
        Duration::from_secs(30)
    );

    shutdown.shutdown();
    assert!(tokio::time::timeout(Duration::from_secs(1), handle).await.is_ok());
    collection.shutdown();
    std::env::remove_var("DISCOVERY_CONFIG_FILE");
}
