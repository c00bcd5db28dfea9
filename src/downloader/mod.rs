//! Sync orchestration
//!
//! Turns a checkpoint store and a block source into a resumable sync:
//!
//! 1. **Planning**: [`planner::plan`] resumes after the highest committed
//!    block and lists gaps left by earlier failures
//! 2. **Scheduling**: [`scheduler::WavePlanner`] cuts the plan into waves of
//!    at most `concurrency_limit` batches of `batch_size` blocks
//! 3. **Fetching**: [`scheduler::dispatch_wave`] runs each batch through
//!    [`batch::fetch_batch`] and waits for the whole wave
//! 4. **Committing**: [`SyncExecutor`] sorts the wave and commits it to the
//!    store one durable flush per block, then cools down
//!
//! # Quick Start
//!
//! ```no_run
//! use block_timestamp_downloader::checkpoint::MemoryBackend;
//! use block_timestamp_downloader::downloader::{SyncConfig, SyncExecutor};
//! use block_timestamp_downloader::source::{create_source, RpcConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = create_source(&RpcConfig::new("http://127.0.0.1:8545"))?;
//! let config = SyncConfig::default().with_batch_size(20);
//!
//! let mut executor = SyncExecutor::open(source, MemoryBackend::new(), config)?;
//! let report = executor.run().await?;
//! println!("{} blocks committed, {} failed", report.committed, report.failed);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Per-block source errors never fail a run. [`SyncError`] covers the fatal
//! classes: store load, store commit, frontier lookup and invalid config.

pub mod batch;
pub mod config;
pub mod executor;
pub mod planner;
pub mod progress;
pub mod rate_limit;
pub mod report;
pub mod scheduler;

pub use batch::BatchResult;
pub use config::SyncConfig;
pub use executor::SyncExecutor;
pub use planner::ResumePlan;
pub use rate_limit::{RateLimitError, RateLimiter};
pub use report::{RunStatus, SyncReport};

use crate::checkpoint::StoreError;
use crate::source::SourceError;

/// Fatal sync errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Persisted state exists but could not be loaded
    #[error("failed to load checkpoint store: {0}")]
    Load(#[source] StoreError),

    /// A checkpoint flush failed mid-run
    #[error(
        "failed to commit checkpoint (last committed block: {}): {source}",
        .last_committed.map_or_else(|| "none".to_string(), |index| index.to_string())
    )]
    Commit {
        /// Highest index durable in the store after the failure
        last_committed: Option<u64>,
        /// Underlying store error
        source: StoreError,
    },

    /// The latest block could not be determined
    #[error("failed to determine latest block: {source}")]
    Frontier {
        /// Highest index durable in the store when the run gave up
        last_committed: Option<u64>,
        /// Underlying source error
        source: SourceError,
    },

    /// Configuration rejected before starting
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Highest index safely in the store, for failures after loading it
    pub fn last_committed(&self) -> Option<u64> {
        match self {
            Self::Commit { last_committed, .. } | Self::Frontier { last_committed, .. } => {
                *last_committed
            }
            Self::Load(_) | Self::InvalidConfig(_) => None,
        }
    }
}
