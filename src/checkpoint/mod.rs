//! Durable checkpoint store for fetched block timestamps
//!
//! The store owns the in-memory [`CheckpointMap`] and a [`SnapshotBackend`]
//! that persists it. Every committed entry is flushed on its own, so a crash
//! after entry *k* leaves exactly the first *k* entries visible to the next
//! [`CheckpointStore::load`].

pub mod lock;
pub mod map;
pub mod memory;
pub mod state;

pub use lock::StoreLock;
pub use map::CheckpointMap;
pub use memory::MemoryBackend;
pub use state::JsonFileBackend;

use crate::BlockTimestamp;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Result type for checkpoint store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable key-value persistence for the checkpoint map.
///
/// Flush contract: once [`write_snapshot`](Self::write_snapshot) returns `Ok`,
/// any later [`read_snapshot`](Self::read_snapshot), in this process or the
/// next one, returns that snapshot.
pub trait SnapshotBackend: Send {
    /// Read the last durable snapshot. `Ok(None)` when nothing was ever written.
    fn read_snapshot(&mut self) -> StoreResult<Option<CheckpointMap>>;

    /// Durably replace the persisted snapshot with `map`
    fn write_snapshot(&mut self, map: &CheckpointMap) -> StoreResult<()>;

    /// Human-readable location used in logs
    fn describe(&self) -> String;
}

/// Outcome of a single [`CheckpointStore::commit`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Entries newly written
    pub committed: u64,
    /// Entries skipped because the index was already present
    pub skipped: u64,
    /// Highest index written by this call
    pub last_committed: Option<u64>,
}

/// Checkpoint map plus the backend that makes it durable
#[derive(Debug)]
pub struct CheckpointStore<B> {
    backend: B,
    map: CheckpointMap,
}

impl<B: SnapshotBackend> CheckpointStore<B> {
    /// Load the persisted map, or start empty when nothing is persisted
    pub fn load(mut backend: B) -> StoreResult<Self> {
        let map = match backend.read_snapshot()? {
            Some(map) => {
                info!(
                    store = %backend.describe(),
                    records = map.len(),
                    last_index = ?map.max_index(),
                    "Loaded checkpoint store"
                );
                map
            }
            None => {
                info!(store = %backend.describe(), "No checkpoint store found, starting from block 0");
                CheckpointMap::new()
            }
        };

        Ok(Self { backend, map })
    }

    /// Committed entries
    pub fn map(&self) -> &CheckpointMap {
        &self.map
    }

    /// Persistence backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Release the backend, dropping the in-memory map
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Commit entries in strictly ascending index order, one flush per entry.
    ///
    /// Indices already present are skipped so committed values never change.
    /// When a flush fails the failing entry is rolled back in memory, entries
    /// before it stay durable, and the error is returned.
    pub fn commit(&mut self, entries: &[BlockTimestamp]) -> StoreResult<CommitSummary> {
        if let Some(pair) = entries.windows(2).find(|w| w[1].number <= w[0].number) {
            return Err(StoreError::UnorderedCommit {
                previous: pair[0].number,
                next: pair[1].number,
            });
        }

        let mut summary = CommitSummary::default();
        for entry in entries {
            if !self.map.insert_new(entry.number, entry.timestamp.clone()) {
                warn!(block = entry.number, "Block already committed, keeping existing timestamp");
                summary.skipped += 1;
                continue;
            }

            let started = Instant::now();
            if let Err(e) = self.backend.write_snapshot(&self.map) {
                self.map.rollback(entry.number);
                error!(
                    block = entry.number,
                    store = %self.backend.describe(),
                    error = %e,
                    "Failed to flush checkpoint"
                );
                return Err(e);
            }
            crate::metrics::record_checkpoint_flush(started.elapsed());

            summary.committed += 1;
            summary.last_committed = Some(entry.number);
        }

        debug!(
            committed = summary.committed,
            skipped = summary.skipped,
            last_committed = ?summary.last_committed,
            total_records = self.map.len(),
            "Checkpoint commit finished"
        );

        Ok(summary)
    }
}

/// Errors related to the checkpoint store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Schema version mismatch
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Persisted state exists but cannot be decoded
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),

    /// Commit entries were not strictly ascending
    #[error("commit entries out of order: {previous} followed by {next}")]
    UnorderedCommit {
        /// Index preceding the violation
        previous: u64,
        /// Offending index
        next: u64,
    },
}
