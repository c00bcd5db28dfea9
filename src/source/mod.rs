//! Block sources
//!
//! A [`BlockSource`] answers two questions: what is the latest block, and
//! what is the timestamp of block *n*. The sync engine treats it as an
//! external collaborator that may fail on any call.

use async_trait::async_trait;
use std::sync::Arc;

pub mod config;
pub mod rpc;
pub mod shared_resources;

pub use config::RpcConfig;
pub use rpc::RpcBlockSource;

/// Block source errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The source could not be reached or answered with an error
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Fetching a single block failed (transport fault, timeout, RPC error)
    #[error("failed to fetch block {index}: {reason}")]
    RecordFetch {
        /// Block index
        index: u64,
        /// Failure description
        reason: String,
    },

    /// The source does not know the block
    #[error("block {0} not found at source")]
    MissingRecord(u64),

    /// The block payload could not be interpreted
    #[error("malformed block {index}: {reason}")]
    MalformedRecord {
        /// Block index
        index: u64,
        /// Failure description
        reason: String,
    },
}

impl SourceError {
    /// Short label used as a metrics dimension
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::RecordFetch { .. } => "fetch",
            Self::MissingRecord(_) => "missing",
            Self::MalformedRecord { .. } => "malformed",
        }
    }
}

/// Result type for source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Remote collaborator exposing blocks by index
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Highest block index currently available at the source
    async fn latest_index(&self) -> SourceResult<u64>;

    /// Raw timestamp of block `index`, in seconds since the Unix epoch
    async fn fetch_timestamp(&self, index: u64) -> SourceResult<i64>;

    /// Endpoint description used in logs and reports
    fn endpoint(&self) -> &str;
}

/// Create a block source for the configured endpoint
///
/// `http://` and `https://` endpoints are served by [`RpcBlockSource`].
pub fn create_source(config: &RpcConfig) -> SourceResult<Arc<dyn BlockSource>> {
    config.validate().map_err(SourceError::Unavailable)?;

    let endpoint = config.endpoint.to_ascii_lowercase();
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(Arc::new(RpcBlockSource::new(config.clone())))
    } else {
        Err(SourceError::Unavailable(format!(
            "unsupported endpoint scheme: {}",
            config.endpoint
        )))
    }
}
