//! # Block Timestamp Downloader Library
//!
//! Incrementally downloads block timestamps from an Ethereum-style JSON-RPC
//! endpoint and keeps them in a durable checkpoint store, so an interrupted
//! run picks up exactly where the previous one stopped.
//!
//! ## Features
//!
//! - **Resume Capability**: every fetched block is committed to the checkpoint
//!   store with its own durable flush; a crash loses at most one wave of work
//! - **Bounded Concurrency**: blocks are fetched in waves of concurrent batches,
//!   never more than `batch_size * concurrency_limit` requests in flight
//! - **Rate Limiting**: fixed cooldown between waves plus an optional
//!   request-per-second limiter on the RPC client
//! - **Partial Failure Tolerance**: a single block failing never fails its batch;
//!   missing blocks are backfilled on the next run
//!
//! ## Quick Start
//!
//! ```no_run
//! use block_timestamp_downloader::checkpoint::JsonFileBackend;
//! use block_timestamp_downloader::downloader::{SyncConfig, SyncExecutor};
//! use block_timestamp_downloader::source::{RpcBlockSource, RpcConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = RpcBlockSource::new(RpcConfig::new("https://mainnet.example.org"));
//! let backend = JsonFileBackend::new("/tmp/block_timestamps.json");
//!
//! let mut executor = SyncExecutor::open(Arc::new(source), backend, SyncConfig::default())?;
//! let report = executor.run().await?;
//! println!("committed {} blocks", report.committed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`source`] - Record sources (the JSON-RPC client and the [`source::BlockSource`] trait)
//! - [`checkpoint`] - Durable checkpoint map with per-record flushes
//! - [`downloader`] - Resume planning, wave scheduling and the sync executor
//! - [`metrics`] - Prometheus-compatible counters for long-running syncs
//! - [`cli`] - Command line surface

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Checkpoint store and persistence backends
pub mod checkpoint;

/// CLI command implementations
pub mod cli;

/// Sync orchestration
pub mod downloader;

/// Observability metrics
pub mod metrics;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Block sources
pub mod source;

/// Closed interval of block indices `[start, end]`.
///
/// Used for batches, planned ranges and gaps in the checkpoint map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexRange {
    start: u64,
    end: u64,
}

impl IndexRange {
    /// Create a range, returning `None` when `start > end`
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Range holding exactly one index
    pub fn single(index: u64) -> Self {
        Self {
            start: index,
            end: index,
        }
    }

    /// First index (inclusive)
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last index (inclusive)
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of indices covered
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    /// Whether `index` falls inside the range
    pub fn contains(&self, index: u64) -> bool {
        self.start <= index && index <= self.end
    }

    /// Iterate over every index in the range
    pub fn indices(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl std::fmt::Display for IndexRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// A fetched block reduced to its normalized timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTimestamp {
    /// Block number (index)
    pub number: u64,
    /// ISO-8601 UTC timestamp with millisecond precision
    pub timestamp: String,
}

impl BlockTimestamp {
    /// Build from a raw Unix timestamp in seconds.
    ///
    /// Returns `None` when the value is outside the range chrono can represent.
    pub fn from_unix_seconds(number: u64, unix_seconds: i64) -> Option<Self> {
        format_timestamp(unix_seconds).map(|timestamp| Self { number, timestamp })
    }
}

/// Normalize Unix seconds to `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn format_timestamp(unix_seconds: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(unix_seconds, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}
