//! Wave cooldown and graceful shutdown

use crate::support::mock_source::MockSource;
use block_timestamp_downloader::checkpoint::MemoryBackend;
use block_timestamp_downloader::downloader::{RunStatus, SyncConfig, SyncExecutor};
use block_timestamp_downloader::shutdown::ShutdownCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn paced_config() -> SyncConfig {
    SyncConfig::default()
        .with_batch_size(5)
        .with_concurrency_limit(2)
        .with_wave_cooldown(Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_separates_waves() {
    let source = Arc::new(MockSource::new(29));
    let started = Instant::now();

    let report = SyncExecutor::open(source.clone(), MemoryBackend::new(), paced_config())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.waves, 3);
    for wave_start in [10u64, 20] {
        let previous = source.requested_at(wave_start - 10).unwrap();
        let next = source.requested_at(wave_start).unwrap();
        assert!(next.duration_since(previous) >= Duration::from_secs(1));
    }
    // One cooldown after each of the three waves
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_cooldown_stops_after_committed_wave() {
    let source = Arc::new(MockSource::new(29));
    let backend = MemoryBackend::new();
    let shutdown = ShutdownCoordinator::shared();

    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            shutdown.request_shutdown();
        })
    };

    let started = Instant::now();
    let report = SyncExecutor::open(source.clone(), backend.clone(), paced_config())
        .unwrap()
        .with_shutdown(shutdown)
        .run()
        .await
        .unwrap();
    trigger.await.unwrap();

    assert_eq!(report.status, RunStatus::Interrupted);
    assert_eq!(report.waves, 1);
    assert_eq!(report.committed, 10);
    assert_eq!(report.last_committed, Some(9));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(source.requested(), (0..=9).collect::<Vec<_>>());
    assert_eq!(backend.snapshot().unwrap().len(), 10);

    // The next run picks up at block 10
    let next = Arc::new(MockSource::new(29));
    let report = SyncExecutor::open(next.clone(), backend.clone(), paced_config())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(next.requested(), (10..=29).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_start_dispatches_nothing() {
    let source = Arc::new(MockSource::new(29));
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let report = SyncExecutor::open(source.clone(), MemoryBackend::new(), paced_config())
        .unwrap()
        .with_shutdown(shutdown)
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Interrupted);
    assert_eq!(report.waves, 0);
    assert!(source.requested().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_in_final_cooldown_still_completes() {
    let source = Arc::new(MockSource::new(9));
    let shutdown = ShutdownCoordinator::shared();

    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            shutdown.request_shutdown();
        })
    };

    let report = SyncExecutor::open(source, MemoryBackend::new(), paced_config())
        .unwrap()
        .with_shutdown(shutdown)
        .run()
        .await
        .unwrap();
    trigger.await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.committed, 10);
}
