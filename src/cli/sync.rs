//! `sync` command

use super::{parse_concurrency, CliError, OutputFormat, DEFAULT_STORE_PATH};
use crate::checkpoint::{JsonFileBackend, StoreLock};
use crate::downloader::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY_LIMIT, DEFAULT_WAVE_COOLDOWN_MS, MAX_BATCH_SIZE,
};
use crate::downloader::{RunStatus, SyncConfig, SyncExecutor, SyncReport};
use crate::shutdown::SharedShutdown;
use crate::source::config::MAX_REQUESTS_PER_SECOND;
use crate::source::{create_source, RpcConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Arguments for the `sync` command
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// JSON-RPC endpoint URL
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: String,

    /// Checkpoint file holding the fetched timestamps
    #[arg(long, default_value = DEFAULT_STORE_PATH)]
    pub store: PathBuf,

    /// Blocks per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = clap::value_parser!(u64).range(1..=MAX_BATCH_SIZE))]
    pub batch_size: u64,

    /// Batches fetched concurrently per wave (max: 32)
    ///
    /// Peak in-flight requests is `batch_size * concurrency`.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY_LIMIT, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Pause after each wave, in milliseconds
    #[arg(long, default_value_t = DEFAULT_WAVE_COOLDOWN_MS)]
    pub cooldown_ms: u64,

    /// Stop at this block even if the endpoint knows later ones
    #[arg(long)]
    pub to_block: Option<u64>,

    /// Client-side cap on RPC requests per second
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_REQUESTS_PER_SECOND as i64))]
    pub max_requests_per_second: Option<u32>,

    /// Do not re-fetch blocks missing below the last checkpointed block
    #[arg(long, default_value_t = false)]
    pub no_backfill: bool,

    /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl SyncArgs {
    /// Sync configuration selected by the flags
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::default()
            .with_batch_size(self.batch_size)
            .with_concurrency_limit(self.concurrency)
            .with_wave_cooldown(Duration::from_millis(self.cooldown_ms))
            .with_backfill_gaps(!self.no_backfill)
    }

    /// RPC source configuration selected by the flags
    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig::new(&self.rpc_url).with_max_requests_per_second(self.max_requests_per_second)
    }

    /// Run the sync and print its report.
    ///
    /// Returns how the run ended so the caller can choose an exit code.
    pub async fn execute(
        &self,
        output_format: OutputFormat,
        shutdown: SharedShutdown,
    ) -> Result<RunStatus, CliError> {
        let result = self.run(shutdown).await;

        match output_format {
            OutputFormat::Json => output_json(&self.store, &result),
            OutputFormat::Human => output_human(&self.store, &result),
        }

        result.map(|report| report.status)
    }

    async fn run(&self, shutdown: SharedShutdown) -> Result<SyncReport, CliError> {
        let config = self.sync_config();
        config.validate().map_err(CliError::ConfigurationError)?;

        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        }

        let _lock = StoreLock::try_acquire(&self.store)?;
        let source = create_source(&self.rpc_config())?;

        info!(
            endpoint = %source.endpoint(),
            store = %self.store.display(),
            max_in_flight = config.max_in_flight(),
            "Opening checkpoint store"
        );

        let mut executor = SyncExecutor::open(source, JsonFileBackend::new(&self.store), config)?
            .with_shutdown(shutdown)
            .with_to_block(self.to_block);

        Ok(executor.run().await?)
    }
}

fn output_json(store: &Path, result: &Result<SyncReport, CliError>) {
    let output = match result {
        Ok(report) => serde_json::json!({
            "success": true,
            "store": store.display().to_string(),
            "report": report,
            "error": null,
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "store": store.display().to_string(),
            "last_committed": e.last_committed(),
            "error": e.to_string(),
        }),
    };

    println!("{output}");
}

fn output_human(store: &Path, result: &Result<SyncReport, CliError>) {
    match result {
        Ok(report) => {
            let headline = match report.status {
                RunStatus::Completed => "Sync completed successfully!",
                RunStatus::AlreadySynced => "Checkpoint store already up to date.",
                RunStatus::Interrupted => "Sync interrupted; progress saved.",
            };
            println!("\n{headline}");
            println!("Endpoint: {}", report.endpoint);
            println!("Store: {}", store.display());
            println!("Frontier: {}", report.frontier);
            if let Some(range) = report.planned_range {
                println!("Planned range: {range}");
            }
            if !report.planned_gaps.is_empty() {
                println!("Backfilled gaps: {}", report.planned_gaps.len());
            }
            println!("Blocks planned: {}", report.planned);
            println!("Blocks committed: {}", report.committed);
            println!("Blocks failed: {}", report.failed);
            println!("Waves: {}", report.waves);
            if let Some(last) = report.last_committed {
                println!("Last committed block: {last}");
            }
        }
        Err(e) => {
            eprintln!("\nSync failed: {e}");
            eprintln!("Store: {}", store.display());
            if let Some(last) = e.last_committed() {
                eprintln!("Last committed block: {last}");
            }
        }
    }
}
