//! End-to-end sync runs against an in-process source

use crate::support::mock_source::{expected_timestamp, MockSource};
use block_timestamp_downloader::checkpoint::{CheckpointMap, MemoryBackend};
use block_timestamp_downloader::downloader::{RunStatus, SyncConfig, SyncExecutor};
use block_timestamp_downloader::IndexRange;
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> SyncConfig {
    SyncConfig::default().with_wave_cooldown(Duration::ZERO)
}

#[tokio::test]
async fn test_empty_store_syncs_to_frontier_in_one_wave() {
    let source = Arc::new(MockSource::new(23));
    let backend = MemoryBackend::new();

    let mut executor = SyncExecutor::open(source.clone(), backend.clone(), fast_config()).unwrap();
    let report = executor.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.frontier, 23);
    assert_eq!(report.planned_range, IndexRange::new(0, 23));
    assert_eq!(report.planned, 24);
    assert_eq!(report.committed, 24);
    assert_eq!(report.failed, 0);
    assert_eq!(report.waves, 1);
    assert_eq!(report.last_committed, Some(23));

    assert_eq!(source.requested(), (0..=23).collect::<Vec<_>>());

    let snapshot = backend.snapshot().unwrap();
    assert_eq!(snapshot.len(), 24);
    for index in 0..=23 {
        assert_eq!(snapshot.get(index), Some(expected_timestamp(index).as_str()));
    }
    // One durable flush per committed record
    assert_eq!(backend.write_count(), 24);
}

#[tokio::test]
async fn test_second_run_plans_nothing() {
    let backend = MemoryBackend::new();
    let first = Arc::new(MockSource::new(23));
    SyncExecutor::open(first, backend.clone(), fast_config())
        .unwrap()
        .run()
        .await
        .unwrap();

    let second = Arc::new(MockSource::new(23));
    let mut executor = SyncExecutor::open(second.clone(), backend.clone(), fast_config()).unwrap();
    let report = executor.run().await.unwrap();

    assert_eq!(report.status, RunStatus::AlreadySynced);
    assert_eq!(report.committed, 0);
    assert_eq!(report.waves, 0);
    assert!(report.planned_range.is_none());
    assert!(second.requested().is_empty());
    assert_eq!(second.frontier_calls(), 1);
    assert_eq!(backend.write_count(), 24);
}

#[tokio::test]
async fn test_partial_store_fetches_only_new_blocks() {
    let existing: CheckpointMap = (0..=9).map(|i| (i, expected_timestamp(i))).collect();
    let backend = MemoryBackend::with_snapshot(existing);
    let source = Arc::new(MockSource::new(12));

    let mut executor = SyncExecutor::open(source.clone(), backend.clone(), fast_config()).unwrap();
    let report = executor.run().await.unwrap();

    assert_eq!(report.planned_range, IndexRange::new(10, 12));
    assert_eq!(report.waves, 1);
    assert_eq!(report.committed, 3);
    assert_eq!(source.requested(), vec![10, 11, 12]);
    assert_eq!(backend.write_count(), 3);
    assert_eq!(executor.store().map().len(), 13);
    assert_eq!(executor.store().map().max_index(), Some(12));
}

#[tokio::test]
async fn test_to_block_caps_frontier() {
    let source = Arc::new(MockSource::new(1_000));
    let backend = MemoryBackend::new();

    let mut executor = SyncExecutor::open(source.clone(), backend.clone(), fast_config())
        .unwrap()
        .with_to_block(Some(7));
    let report = executor.run().await.unwrap();

    assert_eq!(report.frontier, 7);
    assert_eq!(report.committed, 8);
    assert_eq!(source.requested(), (0..=7).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_frontier_zero_fetches_genesis_only() {
    let source = Arc::new(MockSource::new(0));
    let backend = MemoryBackend::new();

    let report = SyncExecutor::open(source.clone(), backend.clone(), fast_config())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.committed, 1);
    assert_eq!(source.requested(), vec![0]);
}

#[tokio::test]
async fn test_invalid_config_rejected_before_loading() {
    let source = Arc::new(MockSource::new(5));
    let result = SyncExecutor::open(
        source.clone(),
        MemoryBackend::new(),
        SyncConfig::default().with_concurrency_limit(0),
    );

    assert!(matches!(
        result,
        Err(block_timestamp_downloader::downloader::SyncError::InvalidConfig(_))
    ));
    assert_eq!(source.frontier_calls(), 0);
}
