//! In-memory snapshot backend
//!
//! Handles are cheap to clone and share one snapshot, so a caller can keep a
//! handle while the store owns another and inspect what was "durably" written.

use super::{CheckpointMap, SnapshotBackend, StoreError, StoreResult};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: Option<CheckpointMap>,
    writes: u64,
    fail_after: Option<u64>,
}

/// Snapshot backend kept in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Empty backend; `read_snapshot` returns `None` until the first write
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that already holds `map`
    pub fn with_snapshot(map: CheckpointMap) -> Self {
        let backend = Self::new();
        backend.lock().snapshot = Some(map);
        backend
    }

    /// Make every write after the first `writes` successful ones fail with an IO error
    pub fn fail_writes_after(self, writes: u64) -> Self {
        self.lock().fail_after = Some(writes);
        self
    }

    /// Last successfully written snapshot
    pub fn snapshot(&self) -> Option<CheckpointMap> {
        self.lock().snapshot.clone()
    }

    /// Number of successful writes
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotBackend for MemoryBackend {
    fn read_snapshot(&mut self) -> StoreResult<Option<CheckpointMap>> {
        Ok(self.lock().snapshot.clone())
    }

    fn write_snapshot(&mut self, map: &CheckpointMap) -> StoreResult<()> {
        let mut state = self.lock();
        if state.fail_after.is_some_and(|limit| state.writes >= limit) {
            return Err(StoreError::IoError(format!(
                "simulated write failure after {} writes",
                state.writes
            )));
        }
        state.snapshot = Some(map.clone());
        state.writes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
