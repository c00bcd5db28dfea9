//! Resume across runs and processes

use crate::support::mock_source::{expected_timestamp, MockSource};
use block_timestamp_downloader::checkpoint::{
    CheckpointStore, JsonFileBackend, MemoryBackend, SnapshotBackend,
};
use block_timestamp_downloader::downloader::{RunStatus, SyncConfig, SyncExecutor};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config() -> SyncConfig {
    SyncConfig::default()
        .with_batch_size(4)
        .with_concurrency_limit(2)
        .with_wave_cooldown(Duration::ZERO)
}

#[tokio::test]
async fn test_interrupted_sync_matches_single_run() {
    // Reference: one uninterrupted run
    let reference = MemoryBackend::new();
    SyncExecutor::open(Arc::new(MockSource::new(40)), reference.clone(), config())
        .unwrap()
        .run()
        .await
        .unwrap();

    // Same range split over three runs with a growing frontier
    let resumed = MemoryBackend::new();
    let mut fetched = Vec::new();
    for to_block in [9, 25, 40] {
        let source = Arc::new(MockSource::new(40));
        SyncExecutor::open(source.clone(), resumed.clone(), config())
            .unwrap()
            .with_to_block(Some(to_block))
            .run()
            .await
            .unwrap();
        fetched.extend(source.requested());
    }

    assert_eq!(resumed.snapshot(), reference.snapshot());

    // No index was fetched twice across the runs
    let unique: HashSet<u64> = fetched.iter().copied().collect();
    assert_eq!(unique.len(), fetched.len());
    assert_eq!(fetched.len(), 41);
}

#[tokio::test]
async fn test_json_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("block_timestamps.json");

    let report = SyncExecutor::open(
        Arc::new(MockSource::new(15)),
        JsonFileBackend::new(&path),
        config(),
    )
    .unwrap()
    .run()
    .await
    .unwrap();
    assert_eq!(report.committed, 16);

    // A fresh executor (as in a new process) sees every committed block
    let source = Arc::new(MockSource::new(20));
    let mut executor =
        SyncExecutor::open(source.clone(), JsonFileBackend::new(&path), config()).unwrap();
    assert_eq!(executor.store().map().len(), 16);

    let report = executor.run().await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(source.requested(), (16..=20).collect::<Vec<_>>());

    let store = CheckpointStore::load(JsonFileBackend::new(&path)).unwrap();
    assert_eq!(store.map().len(), 21);
    assert_eq!(store.map().get(20), Some(expected_timestamp(20).as_str()));
}

#[tokio::test]
async fn test_legacy_store_is_resumed_and_upgraded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("block_timestamps.json");
    let legacy = format!(
        "{{\n  \"0\": \"{}\",\n  \"1\": \"{}\",\n  \"2\": \"{}\"\n}}",
        expected_timestamp(0),
        expected_timestamp(1),
        expected_timestamp(2)
    );
    std::fs::write(&path, legacy).unwrap();

    let source = Arc::new(MockSource::new(5));
    let report = SyncExecutor::open(source.clone(), JsonFileBackend::new(&path), config())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.committed, 3);
    assert_eq!(source.requested(), vec![3, 4, 5]);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("\"schema_version\""));

    let mut backend = JsonFileBackend::new(&path);
    let map = backend.read_snapshot().unwrap().unwrap();
    assert_eq!(map.len(), 6);
    assert_eq!(map.get(0), Some(expected_timestamp(0).as_str()));
}
