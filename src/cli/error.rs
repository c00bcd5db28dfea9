//! CLI error types and conversions

use crate::checkpoint::StoreError;
use crate::downloader::SyncError;
use crate::source::SourceError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Sync error
    #[error("sync error: {0}")]
    SyncError(#[from] SyncError),

    /// Checkpoint store error
    #[error("checkpoint store error: {0}")]
    StoreError(#[from] StoreError),

    /// Block source error
    #[error("source error: {0}")]
    SourceError(#[from] SourceError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl CliError {
    /// Last block committed before the failure, when known
    pub fn last_committed(&self) -> Option<u64> {
        match self {
            Self::SyncError(e) => e.last_committed(),
            _ => None,
        }
    }
}
