//! Binary-level tests

use crate::support::mock_rpc::{MockChain, MockRpcServer};
use crate::support::mock_source::expected_timestamp;
use assert_cmd::Command;
use block_timestamp_downloader::checkpoint::StoreLock;
use serde_json::Value;
use std::path::Path;
use std::process::Output;
use tempfile::TempDir;

const BIN: &str = "block-timestamp-downloader";

/// Run the binary off the async runtime so the mock node keeps serving
async fn run_bin(args: Vec<String>) -> Output {
    tokio::task::spawn_blocking(move || {
        Command::cargo_bin(BIN)
            .unwrap()
            .env_remove("RPC_URL")
            .env("RUST_LOG", "off")
            .args(&args)
            .output()
            .unwrap()
    })
    .await
    .unwrap()
}

fn sync_args(url: &str, store: &Path) -> Vec<String> {
    [
        "--output-format",
        "json",
        "sync",
        "--rpc-url",
        url,
        "--store",
        store.to_str().unwrap(),
        "--cooldown-ms",
        "0",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sync_then_resync() {
    let server = MockRpcServer::start(MockChain {
        latest: 23,
        ..Default::default()
    })
    .await;
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("block_timestamps.json");

    let output = run_bin(sync_args(server.url(), &store)).await;
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["success"], true);
    assert_eq!(json["report"]["committed"], 24);
    assert_eq!(json["report"]["status"], "completed");

    let document: Value = serde_json::from_str(&std::fs::read_to_string(&store).unwrap()).unwrap();
    assert_eq!(document["schema_version"], "1.0.0");
    assert_eq!(document["timestamps"]["23"], expected_timestamp(23));

    let output = run_bin(sync_args(server.url(), &store)).await;
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["report"]["committed"], 0);
    assert_eq!(json["report"]["status"], "already_synced");
    assert_eq!(server.block_requests(), 24);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rpc_url_from_environment() {
    let server = MockRpcServer::start(MockChain {
        latest: 3,
        ..Default::default()
    })
    .await;
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store.json");
    let url = server.url().to_string();
    let store_arg = store.to_str().unwrap().to_string();

    let output = tokio::task::spawn_blocking(move || {
        Command::cargo_bin(BIN)
            .unwrap()
            .env("RPC_URL", url)
            .env("RUST_LOG", "off")
            .args(["sync", "--store", &store_arg, "--cooldown-ms", "0"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Sync completed successfully!"));
    assert!(stdout.contains("Blocks committed: 4"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_endpoint_exits_with_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store.json");

    let output = run_bin(sync_args(&format!("http://127.0.0.1:{port}"), &store)).await;
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["success"], false);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("failed to determine latest block"));
    assert!(!store.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_corrupt_store_exits_with_failure() {
    let server = MockRpcServer::start(MockChain {
        latest: 5,
        ..Default::default()
    })
    .await;
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store.json");
    std::fs::write(&store, "{\"0\": ").unwrap();

    let output = run_bin(sync_args(server.url(), &store)).await;
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(std::fs::read_to_string(&store).unwrap(), "{\"0\": ");
    assert_eq!(server.block_requests(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_locked_store_exits_with_failure() {
    let server = MockRpcServer::start(MockChain {
        latest: 5,
        ..Default::default()
    })
    .await;
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("store.json");
    let _lock = StoreLock::try_acquire(&store).unwrap();

    let output = run_bin(sync_args(server.url(), &store)).await;
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert!(json["error"].as_str().unwrap().contains("lock"));
    assert_eq!(server.block_requests(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_reports_legacy_store() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("legacy.json");
    std::fs::write(
        &store,
        format!(
            "{{\"0\": \"{}\", \"1\": \"{}\", \"4\": \"{}\"}}",
            expected_timestamp(0),
            expected_timestamp(1),
            expected_timestamp(4)
        ),
    )
    .unwrap();

    let output = run_bin(vec![
        "--output-format".to_string(),
        "json".to_string(),
        "status".to_string(),
        "--store".to_string(),
        store.to_str().unwrap().to_string(),
    ])
    .await;

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["records"], 3);
    assert_eq!(json["last_block"], 4);
    assert_eq!(json["gaps"], 1);
    assert_eq!(json["missing_blocks"], 2);
}

#[test]
fn test_invalid_concurrency_rejected_by_parser() {
    Command::cargo_bin(BIN)
        .unwrap()
        .args(["sync", "--rpc-url", "http://127.0.0.1:8545", "--concurrency", "0"])
        .assert()
        .failure();
}

#[test]
fn test_missing_rpc_url_rejected() {
    Command::cargo_bin(BIN)
        .unwrap()
        .env_remove("RPC_URL")
        .arg("sync")
        .assert()
        .failure();
}
