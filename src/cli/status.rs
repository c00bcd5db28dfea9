//! `status` command

use super::{CliError, OutputFormat, DEFAULT_STORE_PATH};
use crate::checkpoint::{CheckpointMap, CheckpointStore, JsonFileBackend};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the `status` command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Checkpoint file to inspect
    #[arg(long, default_value = DEFAULT_STORE_PATH)]
    pub store: PathBuf,
}

/// Checkpoint file summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    /// Inspected file
    pub store: String,
    /// Committed blocks
    pub records: usize,
    /// Lowest committed block
    pub first_block: Option<u64>,
    /// Highest committed block
    pub last_block: Option<u64>,
    /// Timestamp of the highest committed block
    pub last_timestamp: Option<String>,
    /// Runs of missing blocks below `last_block`
    pub gaps: usize,
    /// Blocks missing below `last_block`
    pub missing_blocks: u64,
}

impl StoreStatus {
    /// Summarize `map` as loaded from `store`
    pub fn from_map(store: String, map: &CheckpointMap) -> Self {
        let last_block = map.max_index();
        Self {
            store,
            records: map.len(),
            first_block: map.first_index(),
            last_block,
            last_timestamp: last_block.and_then(|i| map.get(i)).map(str::to_string),
            gaps: map.gaps().len(),
            missing_blocks: map.missing_count(),
        }
    }
}

impl StatusArgs {
    /// Load the checkpoint file and print a summary
    pub async fn execute(&self, output_format: OutputFormat) -> Result<StoreStatus, CliError> {
        let store = CheckpointStore::load(JsonFileBackend::new(&self.store))?;
        let status = StoreStatus::from_map(self.store.display().to_string(), store.map());

        match output_format {
            OutputFormat::Json => println!("{}", serde_json::json!(status)),
            OutputFormat::Human => {
                println!("Store: {}", status.store);
                println!("Records: {}", status.records);
                match (status.first_block, status.last_block) {
                    (Some(first), Some(last)) => {
                        println!("Blocks: {first} - {last}");
                        if let Some(ts) = &status.last_timestamp {
                            println!("Latest timestamp: {ts}");
                        }
                    }
                    _ => println!("Blocks: none"),
                }
                println!(
                    "Gaps: {} ({} missing blocks)",
                    status.gaps, status.missing_blocks
                );
            }
        }

        Ok(status)
    }
}
