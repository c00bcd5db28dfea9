//! Command line interface

pub mod error;
pub mod status;
pub mod sync;

pub use error::CliError;
pub use status::StatusArgs;
pub use sync::SyncArgs;

use crate::downloader::config::MAX_CONCURRENCY_LIMIT;
use clap::{Parser, Subcommand};
use std::str::FromStr;

/// Default checkpoint store location
pub const DEFAULT_STORE_PATH: &str = "/tmp/block_timestamps.json";

/// Exit code for a run stopped by Ctrl+C
pub const EXIT_INTERRUPTED: i32 = 130;

/// Parse and validate a concurrency limit
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY_LIMIT {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY_LIMIT}"
        ));
    }
    Ok(value)
}

/// Block timestamp downloader CLI
#[derive(Parser, Debug)]
#[command(name = "block-timestamp-downloader")]
#[command(about = "Download block timestamps from a JSON-RPC endpoint into a resumable checkpoint file", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every block after the last checkpointed one up to the latest block
    Sync(SyncArgs),

    /// Summarize the contents of a checkpoint file
    Status(StatusArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}
