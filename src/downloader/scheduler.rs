//! Wave scheduling
//!
//! [`WavePlanner`] cuts the planned segments into waves of at most
//! `concurrency_limit` batches, each at most `batch_size` wide.
//! [`dispatch_wave`] runs one wave as a semaphore-gated task group and waits
//! for all of it before returning.

use super::batch::{fetch_batch, BatchResult};
use crate::source::BlockSource;
use crate::IndexRange;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

/// Batches launched together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    batches: Vec<IndexRange>,
}

impl Wave {
    /// Batches in ascending order
    pub fn batches(&self) -> &[IndexRange] {
        &self.batches
    }

    /// Lowest index in the wave
    pub fn first_index(&self) -> Option<u64> {
        self.batches.first().map(IndexRange::start)
    }

    /// Highest index in the wave
    pub fn last_index(&self) -> Option<u64> {
        self.batches.last().map(IndexRange::end)
    }

    /// Number of indices across all batches
    pub fn index_count(&self) -> u64 {
        self.batches.iter().map(IndexRange::len).sum()
    }
}

/// Iterator over the waves covering a list of ascending, disjoint segments.
///
/// A batch never crosses a segment boundary. A wave may hold batches from
/// several segments, so many small gaps share one wave.
#[derive(Debug, Clone)]
pub struct WavePlanner {
    segments: VecDeque<IndexRange>,
    batch_size: u64,
    concurrency_limit: usize,
}

impl WavePlanner {
    /// Plan waves over `segments`. Zero sizes are treated as 1.
    pub fn new(
        segments: impl IntoIterator<Item = IndexRange>,
        batch_size: u64,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            segments: segments.into_iter().collect(),
            batch_size: batch_size.max(1),
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    fn next_batch(&mut self) -> Option<IndexRange> {
        let segment = self.segments.pop_front()?;
        let end = segment
            .start()
            .saturating_add(self.batch_size - 1)
            .min(segment.end());

        if let Some(rest) = end.checked_add(1).and_then(|next| IndexRange::new(next, segment.end())) {
            self.segments.push_front(rest);
        }
        IndexRange::new(segment.start(), end)
    }
}

impl Iterator for WavePlanner {
    type Item = Wave;

    fn next(&mut self) -> Option<Wave> {
        let mut batches = Vec::with_capacity(self.concurrency_limit);
        while batches.len() < self.concurrency_limit {
            match self.next_batch() {
                Some(batch) => batches.push(batch),
                None => break,
            }
        }
        (!batches.is_empty()).then_some(Wave { batches })
    }
}

/// Run every batch of `wave` concurrently and wait for all of them.
///
/// Each batch task holds a permit of `permits` while it runs. A batch task
/// that panics is reported as a batch with every index failed.
pub async fn dispatch_wave(
    source: &Arc<dyn BlockSource>,
    wave: &Wave,
    permits: &Arc<Semaphore>,
) -> BatchResult {
    let mut tasks = JoinSet::new();
    for &batch in wave.batches() {
        let source = Arc::clone(source);
        let permits = Arc::clone(permits);
        tasks.spawn(async move {
            // The semaphore is never closed, so acquisition only waits
            let _permit = permits.acquire_owned().await.ok();
            (batch, fetch_batch(source.as_ref(), batch).await)
        });
    }

    let mut pending: BTreeSet<IndexRange> = wave.batches().iter().copied().collect();
    let mut merged = BatchResult::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((batch, result)) => {
                pending.remove(&batch);
                merged.merge(result);
            }
            Err(e) => {
                error!(error = %e, "Batch task did not complete");
            }
        }
    }

    for batch in pending {
        merged.merge(BatchResult::all_failed(batch));
    }
    merged
}
