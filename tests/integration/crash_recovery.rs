//! Fatal store and source failures

use crate::support::mock_source::{expected_timestamp, MockSource};
use block_timestamp_downloader::checkpoint::CheckpointMap;
use block_timestamp_downloader::checkpoint::{JsonFileBackend, MemoryBackend, StoreError};
use block_timestamp_downloader::downloader::{SyncConfig, SyncError, SyncExecutor};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config() -> SyncConfig {
    SyncConfig::default().with_wave_cooldown(Duration::ZERO)
}

#[tokio::test]
async fn test_flush_failure_leaves_exact_prefix_durable() {
    let backend = MemoryBackend::new().fail_writes_after(7);
    let source = Arc::new(MockSource::new(23));

    let mut executor = SyncExecutor::open(source, backend.clone(), config()).unwrap();
    let err = executor.run().await.unwrap_err();

    match &err {
        SyncError::Commit {
            last_committed,
            source: StoreError::IoError(_),
        } => assert_eq!(*last_committed, Some(6)),
        other => panic!("Expected commit error, got {other:?}"),
    }
    assert_eq!(err.last_committed(), Some(6));

    // Exactly the first seven blocks are durable, and memory agrees
    let durable = backend.snapshot().unwrap();
    assert_eq!(durable.len(), 7);
    assert_eq!(durable.max_index(), Some(6));
    assert_eq!(executor.store().map(), &durable);
}

#[tokio::test]
async fn test_recovery_after_flush_failure() {
    let failing = MemoryBackend::new().fail_writes_after(7);
    let _ = SyncExecutor::open(Arc::new(MockSource::new(23)), failing.clone(), config())
        .unwrap()
        .run()
        .await;

    let recovered = MemoryBackend::with_snapshot(failing.snapshot().unwrap());
    let source = Arc::new(MockSource::new(23));
    let report = SyncExecutor::open(source.clone(), recovered.clone(), config())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.committed, 17);
    assert_eq!(source.requested(), (7..=23).collect::<Vec<_>>());
    assert_eq!(recovered.snapshot().unwrap().len(), 24);
}

#[tokio::test]
async fn test_undecodable_store_aborts_before_fetching() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("block_timestamps.json");
    let corrupt = format!("{{\"0\": \"{}\", \"1\": ", expected_timestamp(0));
    std::fs::write(&path, &corrupt).unwrap();

    let source = Arc::new(MockSource::new(23));
    let result = SyncExecutor::open(source.clone(), JsonFileBackend::new(&path), config());

    assert!(matches!(
        result,
        Err(SyncError::Load(StoreError::DecodeError(_)))
    ));
    assert_eq!(source.frontier_calls(), 0);
    assert!(source.requested().is_empty());
    // The damaged file is left for inspection
    assert_eq!(std::fs::read_to_string(&path).unwrap(), corrupt);
}

#[tokio::test]
async fn test_frontier_failure_aborts_without_commits() {
    let backend = MemoryBackend::new();
    let source = Arc::new(MockSource::unavailable());

    let err = SyncExecutor::open(source.clone(), backend.clone(), config())
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Frontier { .. }));
    assert_eq!(err.last_committed(), None);
    assert!(source.requested().is_empty());
    assert_eq!(backend.write_count(), 0);
}

fn committed_prefix(last: u64) -> CheckpointMap {
    (0..=last).map(|index| (index, expected_timestamp(index))).collect()
}

#[tokio::test]
async fn test_first_flush_failure_reports_resumed_block() {
    let backend = MemoryBackend::with_snapshot(committed_prefix(9)).fail_writes_after(0);
    let source = Arc::new(MockSource::new(12));

    let mut executor = SyncExecutor::open(source, backend.clone(), config()).unwrap();
    let err = executor.run().await.unwrap_err();

    assert!(matches!(err, SyncError::Commit { .. }));
    assert_eq!(err.last_committed(), Some(9));
    assert!(err.to_string().contains("last committed block: 9"));
    assert_eq!(backend.snapshot().unwrap().max_index(), Some(9));
    assert_eq!(executor.store().map().max_index(), Some(9));
}

#[tokio::test]
async fn test_frontier_failure_reports_resumed_block() {
    let backend = MemoryBackend::with_snapshot(committed_prefix(9));
    let source = Arc::new(MockSource::unavailable());

    let err = SyncExecutor::open(source, backend.clone(), config())
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Frontier { .. }));
    assert_eq!(err.last_committed(), Some(9));
    assert_eq!(backend.write_count(), 0);
}
