//! Sync configuration and defaults

use std::time::Duration;

/// Indices fetched by one batch.
pub const DEFAULT_BATCH_SIZE: u64 = 10;

/// Batches launched per wave.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;

/// Pause after each committed wave, in milliseconds.
/// Keeps a public RPC endpoint from throttling a long backfill.
pub const DEFAULT_WAVE_COOLDOWN_MS: u64 = 1000;

/// Upper bound for `concurrency_limit`.
pub const MAX_CONCURRENCY_LIMIT: usize = 32;

/// Upper bound for `batch_size`.
pub const MAX_BATCH_SIZE: u64 = 1000;

/// Tuning knobs of the sync engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Indices per batch
    pub batch_size: u64,
    /// Batches per wave, and the size of the batch semaphore
    pub concurrency_limit: usize,
    /// Pause after each committed wave
    pub wave_cooldown: Duration,
    /// Re-fetch indices missing below the highest committed index
    pub backfill_gaps: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            wave_cooldown: Duration::from_millis(DEFAULT_WAVE_COOLDOWN_MS),
            backfill_gaps: true,
        }
    }
}

impl SyncConfig {
    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of concurrent batches per wave
    pub fn with_concurrency_limit(mut self, concurrency_limit: usize) -> Self {
        self.concurrency_limit = concurrency_limit;
        self
    }

    /// Set the pause after each wave
    pub fn with_wave_cooldown(mut self, wave_cooldown: Duration) -> Self {
        self.wave_cooldown = wave_cooldown;
        self
    }

    /// Enable or disable gap backfill
    pub fn with_backfill_gaps(mut self, backfill_gaps: bool) -> Self {
        self.backfill_gaps = backfill_gaps;
        self
    }

    /// Peak number of fetches in flight during one wave
    pub fn max_in_flight(&self) -> u64 {
        self.batch_size.saturating_mul(self.concurrency_limit as u64)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch size must be at least 1".to_string());
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(format!(
                "batch size {} exceeds maximum of {MAX_BATCH_SIZE}",
                self.batch_size
            ));
        }
        if self.concurrency_limit == 0 {
            return Err("concurrency limit must be at least 1".to_string());
        }
        if self.concurrency_limit > MAX_CONCURRENCY_LIMIT {
            return Err(format!(
                "concurrency limit {} exceeds maximum of {MAX_CONCURRENCY_LIMIT}",
                self.concurrency_limit
            ));
        }
        Ok(())
    }
}
