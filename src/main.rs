//! Main entry point for the block-timestamp-downloader CLI

use block_timestamp_downloader::cli::{Cli, Commands, EXIT_INTERRUPTED};
use block_timestamp_downloader::downloader::RunStatus;
use block_timestamp_downloader::shutdown::{self, SharedShutdown, ShutdownCoordinator};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("block_timestamp_downloader=info"));

    // Logs go to stderr so `--output-format json` keeps stdout parseable
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Dispatch the parsed command
async fn run(cli: Cli, shutdown: SharedShutdown) -> anyhow::Result<RunStatus> {
    match cli.command {
        Commands::Sync(args) => Ok(args.execute(cli.output_format, shutdown).await?),
        Commands::Status(args) => {
            args.execute(cli.output_format).await?;
            Ok(RunStatus::Completed)
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    let signal_handle = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl+C received, stopping after the wave in flight");
            signal_handle.request_shutdown();
        }
    });

    match run(cli, shutdown).await {
        Ok(RunStatus::Interrupted) => std::process::exit(EXIT_INTERRUPTED),
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, "Command failed");
            std::process::exit(1);
        }
    }
}
