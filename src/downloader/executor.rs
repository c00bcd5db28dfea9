//! Sync executor
//!
//! Drives one run: frontier lookup, planning, then wave after wave of
//! dispatch, reorder, commit and cooldown until the plan is exhausted or a
//! shutdown is requested.

use super::planner;
use super::progress::ProgressTracker;
use super::report::{RunStatus, SyncReport};
use super::scheduler::{dispatch_wave, WavePlanner};
use super::{SyncConfig, SyncError};
use crate::checkpoint::{CheckpointStore, SnapshotBackend};
use crate::metrics::{self, SyncMetrics};
use crate::shutdown::{self, SharedShutdown};
use crate::source::BlockSource;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn, Instrument};

/// Runs syncs of one block source into one checkpoint store
pub struct SyncExecutor<B> {
    source: Arc<dyn BlockSource>,
    store: CheckpointStore<B>,
    config: SyncConfig,
    to_block: Option<u64>,
    shutdown: Option<SharedShutdown>,
    progress_tracker: ProgressTracker,
}

impl<B: SnapshotBackend> SyncExecutor<B> {
    /// Validate `config` and load the checkpoint store from `backend`.
    ///
    /// Picks up the global shutdown handle if one is registered.
    pub fn open(
        source: Arc<dyn BlockSource>,
        backend: B,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        config.validate().map_err(SyncError::InvalidConfig)?;
        let store = CheckpointStore::load(backend).map_err(SyncError::Load)?;

        Ok(Self {
            source,
            store,
            config,
            to_block: None,
            shutdown: shutdown::get_global_shutdown(),
            progress_tracker: ProgressTracker::default(),
        })
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Cap the frontier at `to_block` (the run stops at `min(latest, to_block)`).
    pub fn with_to_block(mut self, to_block: Option<u64>) -> Self {
        self.to_block = to_block;
        self
    }

    /// Override the progress tracker cadence.
    pub fn with_progress_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.progress_tracker = tracker;
        self
    }

    /// Checkpoint store as of the last commit
    pub fn store(&self) -> &CheckpointStore<B> {
        &self.store
    }

    /// Release the checkpoint store
    pub fn into_store(self) -> CheckpointStore<B> {
        self.store
    }

    /// Run one sync.
    ///
    /// Per-block fetch failures are counted in the report. Only store and
    /// frontier failures end the run with an error.
    pub async fn run(&mut self) -> Result<SyncReport, SyncError> {
        let span = tracing::info_span!(
            "sync",
            endpoint = %self.source.endpoint(),
            store = %self.store.backend().describe(),
            batch_size = self.config.batch_size,
            concurrency_limit = self.config.concurrency_limit
        );
        let sync_metrics = SyncMetrics::start(self.source.endpoint());

        let result = self.run_waves().instrument(span).await;
        match &result {
            Ok(report) => sync_metrics.record_success(report.status.as_str(), report.committed),
            Err(e) => sync_metrics.record_failure(&e.to_string()),
        }
        result
    }

    async fn run_waves(&mut self) -> Result<SyncReport, SyncError> {
        let latest = self
            .source
            .latest_index()
            .await
            .map_err(|source| SyncError::Frontier {
                last_committed: self.store.map().max_index(),
                source,
            })?;
        let frontier = self.to_block.map_or(latest, |cap| latest.min(cap));

        let plan = planner::plan(self.store.map(), frontier);
        let backfill = self.config.backfill_gaps;
        let mut report = SyncReport::new(self.source.endpoint(), frontier, &plan, backfill);

        if !backfill && !plan.gaps.is_empty() {
            warn!(
                gaps = plan.gaps.len(),
                missing_blocks = plan.gap_count(),
                "Checkpoint store has gaps and backfill is disabled"
            );
        }

        let segments = plan.segments(backfill);
        if segments.is_empty() {
            info!(
                frontier,
                last_committed = ?self.store.map().max_index(),
                "Checkpoint store is up to date"
            );
            return Ok(report);
        }

        info!(
            frontier,
            start = plan.start,
            end = plan.end,
            gaps = report.planned_gaps.len(),
            planned = report.planned,
            "Starting block timestamp sync"
        );

        let permits = Arc::new(Semaphore::new(self.config.concurrency_limit));
        let mut progress = self.progress_tracker.create_state(report.planned);
        let mut waves = WavePlanner::new(
            segments,
            self.config.batch_size,
            self.config.concurrency_limit,
        )
        .peekable();

        while let Some(wave) = waves.next() {
            if self.shutdown_requested() {
                warn!(
                    last_committed = ?report.last_committed,
                    "Shutdown requested, stopping before next wave"
                );
                report.status = RunStatus::Interrupted;
                return Ok(report);
            }

            debug!(
                wave = report.waves + 1,
                first = ?wave.first_index(),
                last = ?wave.last_index(),
                batches = wave.batches().len(),
                "Dispatching wave"
            );

            let mut outcome = dispatch_wave(&self.source, &wave, &permits).await;
            outcome.records.sort_by_key(|record| record.number);
            outcome.failed.sort_unstable();

            let summary = match self.store.commit(&outcome.records) {
                Ok(summary) => summary,
                Err(source) => {
                    // The failing entry was rolled back, so the map matches the durable snapshot
                    return Err(SyncError::Commit {
                        last_committed: self.store.map().max_index(),
                        source,
                    });
                }
            };

            report.waves += 1;
            report.committed += summary.committed;
            report.failed += outcome.failed.len() as u64;
            if summary.last_committed.is_some() {
                report.last_committed = summary.last_committed;
            }
            metrics::record_wave(outcome.records.len() as u64);

            if !outcome.failed.is_empty() {
                warn!(
                    failed = ?outcome.failed,
                    "Some blocks failed in this wave and were left for the next run"
                );
            }

            progress.update(wave.index_count(), summary.committed, summary.last_committed);
            if progress.should_emit_update() {
                info!("{}", progress.format_progress());
                progress.mark_emitted();
            }

            if !self.cooldown().await && waves.peek().is_some() {
                warn!(
                    last_committed = ?report.last_committed,
                    "Shutdown requested during cooldown"
                );
                report.status = RunStatus::Interrupted;
                return Ok(report);
            }
        }

        report.status = RunStatus::Completed;
        info!(
            committed = report.committed,
            failed = report.failed,
            waves = report.waves,
            last_committed = ?report.last_committed,
            "Block timestamp sync completed"
        );
        Ok(report)
    }

    /// Pause after a wave. Returns `false` if interrupted by shutdown.
    async fn cooldown(&self) -> bool {
        let duration = self.config.wave_cooldown;
        if duration.is_zero() {
            return !self.shutdown_requested();
        }

        match &self.shutdown {
            Some(shutdown) => shutdown.sleep_unless_shutdown(duration).await,
            None => {
                tokio::time::sleep(duration).await;
                true
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}
