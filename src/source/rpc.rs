//! Ethereum JSON-RPC block source
//!
//! Uses two methods: `eth_blockNumber` for the frontier and
//! `eth_getBlockByNumber(<hex>, false)` for a block header. Quantities are
//! `0x`-prefixed hex strings.

use super::shared_resources::shared_rpc_client;
use super::{BlockSource, RpcConfig, SourceError, SourceResult};
use crate::downloader::rate_limit::RateLimiter;
use crate::metrics::RpcRequestMetrics;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct RpcResponse<T> {
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// The part of a block header this crate reads
#[derive(Debug, Deserialize)]
struct BlockHeader {
    timestamp: String,
}

/// Block source backed by an HTTP JSON-RPC endpoint
pub struct RpcBlockSource {
    client: Arc<Client>,
    endpoint: String,
    rate_limiter: Option<RateLimiter>,
    next_id: AtomicU64,
}

impl RpcBlockSource {
    /// Source using the shared HTTP client
    pub fn new(config: RpcConfig) -> Self {
        Self::with_client(shared_rpc_client(), config)
    }

    /// Source using a caller-provided HTTP client
    pub fn with_client(client: Arc<Client>, config: RpcConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint,
            rate_limiter: config.max_requests_per_second.map(RateLimiter::per_second),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send one JSON-RPC call.
    ///
    /// Returns `Ok(None)` when the endpoint answers with a `null` result.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<Option<T>, String> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await.map_err(|e| e.to_string())?;
        }

        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let metrics = RpcRequestMetrics::start(method);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                metrics.record_network_error();
                format!("transport error: {e}")
            })?;

        let status = response.status();
        metrics.record_complete(status.as_u16());

        if status.as_u16() == 429 {
            return Err("rate limited by endpoint (HTTP 429)".to_string());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(method, status = %status, body = %body, "JSON-RPC endpoint returned HTTP error");
            return Err(format!("HTTP {status}"));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| format!("invalid JSON-RPC response: {e}"))?;

        if let Some(error) = body.error {
            return Err(format!("JSON-RPC error {}: {}", error.code, error.message));
        }

        debug!(
            correlation_id = %metrics.correlation_id(),
            method,
            has_result = body.result.is_some(),
            "JSON-RPC call returned"
        );
        Ok(body.result)
    }
}

#[async_trait]
impl BlockSource for RpcBlockSource {
    async fn latest_index(&self) -> SourceResult<u64> {
        let quantity: String = self
            .call("eth_blockNumber", json!([]))
            .await
            .map_err(SourceError::Unavailable)?
            .ok_or_else(|| SourceError::Unavailable("eth_blockNumber returned null".to_string()))?;

        parse_quantity(&quantity)
            .map_err(|e| SourceError::Unavailable(format!("invalid block number: {e}")))
    }

    async fn fetch_timestamp(&self, index: u64) -> SourceResult<i64> {
        let header: BlockHeader = self
            .call(
                "eth_getBlockByNumber",
                json!([format_quantity(index), false]),
            )
            .await
            .map_err(|reason| SourceError::RecordFetch { index, reason })?
            .ok_or(SourceError::MissingRecord(index))?;

        let seconds = parse_quantity(&header.timestamp)
            .map_err(|reason| SourceError::MalformedRecord { index, reason })?;

        i64::try_from(seconds).map_err(|_| SourceError::MalformedRecord {
            index,
            reason: format!("timestamp {seconds} out of range"),
        })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Encode an index as a JSON-RPC quantity (`0x` + lowercase hex, no padding)
pub fn format_quantity(value: u64) -> String {
    format!("{value:#x}")
}

/// Decode a JSON-RPC quantity such as `"0x5bad55"`
pub fn parse_quantity(quantity: &str) -> Result<u64, String> {
    let digits = quantity
        .strip_prefix("0x")
        .or_else(|| quantity.strip_prefix("0X"))
        .ok_or_else(|| format!("quantity {quantity:?} is missing the 0x prefix"))?;

    if digits.is_empty() {
        return Err(format!("quantity {quantity:?} has no digits"));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("quantity {quantity:?} is not a hex number"));
    }

    u64::from_str_radix(digits, 16).map_err(|e| format!("quantity {quantity:?}: {e}"))
}
