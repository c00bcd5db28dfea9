//! Process-wide HTTP client for RPC sources
//!
//! Every [`RpcBlockSource`](super::RpcBlockSource) built with `new` shares one
//! connection pool, so the batches of a wave reuse keep-alive connections.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Time allowed to establish a connection to the endpoint
pub const RPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Time allowed for a whole JSON-RPC call, bounding how long one block fetch can stall
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static SHARED_RPC_CLIENT: Lazy<Arc<Client>> = Lazy::new(|| {
    let client = Client::builder()
        .connect_timeout(RPC_CONNECT_TIMEOUT)
        .timeout(RPC_REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to an HTTP client without timeouts");
            Client::new()
        });
    Arc::new(client)
});

/// Shared HTTP client, built on first use
pub fn shared_rpc_client() -> Arc<Client> {
    Arc::clone(&SHARED_RPC_CLIENT)
}
