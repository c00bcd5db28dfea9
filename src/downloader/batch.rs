//! Batch fetcher
//!
//! Fetches every index of a batch concurrently and keeps whatever succeeded.
//! A failing index is logged and reported, never propagated.

use crate::source::{BlockSource, SourceError};
use crate::{BlockTimestamp, IndexRange};
use futures::future::join_all;
use tracing::warn;

/// Outcome of fetching one batch (or several, once merged)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Fetched records, in no particular order
    pub records: Vec<BlockTimestamp>,
    /// Indices whose fetch failed
    pub failed: Vec<u64>,
}

impl BatchResult {
    /// Result of a batch where every index failed
    pub fn all_failed(range: IndexRange) -> Self {
        Self {
            records: Vec::new(),
            failed: range.indices().collect(),
        }
    }

    /// Append another result
    pub fn merge(&mut self, other: BatchResult) {
        self.records.extend(other.records);
        self.failed.extend(other.failed);
    }
}

/// Fetch all indices of `range` concurrently.
pub async fn fetch_batch(source: &dyn BlockSource, range: IndexRange) -> BatchResult {
    let outcomes = join_all(
        range
            .indices()
            .map(|index| async move { (index, fetch_one(source, index).await) }),
    )
    .await;

    let mut result = BatchResult::default();
    for (index, outcome) in outcomes {
        match outcome {
            Ok(record) => result.records.push(record),
            Err(e) => {
                warn!(block = index, error = %e, "Block fetch failed, skipping");
                crate::metrics::record_fetch_failure(e.kind());
                result.failed.push(index);
            }
        }
    }
    result
}

async fn fetch_one(source: &dyn BlockSource, index: u64) -> Result<BlockTimestamp, SourceError> {
    let seconds = source.fetch_timestamp(index).await?;
    BlockTimestamp::from_unix_seconds(index, seconds).ok_or_else(|| SourceError::MalformedRecord {
        index,
        reason: format!("timestamp {seconds} is out of range"),
    })
}
