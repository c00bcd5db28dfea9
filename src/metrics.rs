//! Observability metrics for block timestamp syncs
//!
//! Counters and histograms are recorded through the `metrics` facade. Without
//! an installed recorder every call is a no-op, so library users and tests pay
//! nothing. The CLI installs the Prometheus exporter when `--metrics-addr` is
//! given.
//!
//! ## Metric names
//!
//! - `rpc_requests_total{method,status}` / `rpc_request_duration_seconds{method}`
//! - `blocks_fetched_total`, `block_fetch_failures_total{kind}`
//! - `blocks_committed_total`, `checkpoint_flush_duration_seconds`
//! - `waves_completed_total`
//! - `syncs_completed_total{status}`, `syncs_failed_total`

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize the metrics system with a Prometheus scrape endpoint.
///
/// Idempotent: later calls are ignored once an exporter is installed.
///
/// # Arguments
/// * `addr` - Socket address for the scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.lock().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "rpc_requests_total",
        Unit::Count,
        "Total number of JSON-RPC requests sent to the block source"
    );
    describe_histogram!(
        "rpc_request_duration_seconds",
        Unit::Seconds,
        "JSON-RPC request duration in seconds"
    );
    describe_counter!(
        "blocks_fetched_total",
        Unit::Count,
        "Blocks whose timestamp was fetched successfully"
    );
    describe_counter!(
        "block_fetch_failures_total",
        Unit::Count,
        "Blocks whose fetch failed and were left for a later run"
    );
    describe_counter!(
        "blocks_committed_total",
        Unit::Count,
        "Blocks durably written to the checkpoint store"
    );
    describe_histogram!(
        "checkpoint_flush_duration_seconds",
        Unit::Seconds,
        "Duration of a single checkpoint flush"
    );
    describe_counter!(
        "waves_completed_total",
        Unit::Count,
        "Waves dispatched, collected and committed"
    );
    describe_counter!(
        "syncs_completed_total",
        Unit::Count,
        "Sync runs that finished without a fatal error"
    );
    describe_counter!(
        "syncs_failed_total",
        Unit::Count,
        "Sync runs aborted by a fatal error"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Whether [`init_metrics`] installed an exporter
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.lock().await
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("rpc-{:08x}", id)
}

/// Timing and outcome of a single JSON-RPC request
pub struct RpcRequestMetrics {
    method: &'static str,
    start_time: Instant,
    correlation_id: String,
}

impl RpcRequestMetrics {
    /// Start recording a request for `method`
    pub fn start(method: &'static str) -> Self {
        let correlation_id = generate_correlation_id();
        debug!(correlation_id = %correlation_id, method, "Starting JSON-RPC request");

        Self {
            method,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    /// Record an HTTP response with `status_code`
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "rpc_requests_total",
            "method" => self.method,
            "status" => status_code.to_string(),
        )
        .increment(1);
        histogram!("rpc_request_duration_seconds", "method" => self.method)
            .record(duration.as_secs_f64());

        if status_code == 429 {
            warn!(
                correlation_id = %self.correlation_id,
                method = self.method,
                duration_ms = duration.as_millis(),
                "Rate limit error (429) from RPC endpoint"
            );
        }

        debug!(
            correlation_id = %self.correlation_id,
            method = self.method,
            status = status_code,
            duration_ms = duration.as_millis(),
            "JSON-RPC request completed"
        );
    }

    /// Record a transport failure (no HTTP status)
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "rpc_requests_total",
            "method" => self.method,
            "status" => "network_error",
        )
        .increment(1);
        histogram!("rpc_request_duration_seconds", "method" => self.method)
            .record(duration.as_secs_f64());

        warn!(
            correlation_id = %self.correlation_id,
            method = self.method,
            duration_ms = duration.as_millis(),
            "JSON-RPC transport error"
        );
    }

    /// Correlation ID of this request
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record one checkpoint flush
pub fn record_checkpoint_flush(duration: Duration) {
    counter!("blocks_committed_total").increment(1);
    histogram!("checkpoint_flush_duration_seconds").record(duration.as_secs_f64());
}

/// Record a completed wave and the blocks it fetched
pub fn record_wave(fetched: u64) {
    counter!("waves_completed_total").increment(1);
    counter!("blocks_fetched_total").increment(fetched);
}

/// Record a single block fetch failure by error kind
pub fn record_fetch_failure(kind: &'static str) {
    counter!("block_fetch_failures_total", "kind" => kind).increment(1);
}

/// Whole-run metrics
pub struct SyncMetrics {
    endpoint: String,
    start_time: Instant,
}

impl SyncMetrics {
    /// Start tracking a sync against `endpoint`
    pub fn start(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        info!(endpoint = %endpoint, "Sync run started");

        Self {
            endpoint,
            start_time: Instant::now(),
        }
    }

    /// Record a run that ended without a fatal error
    pub fn record_success(&self, status: &'static str, committed: u64) {
        let duration = self.start_time.elapsed();
        counter!("syncs_completed_total", "status" => status).increment(1);

        info!(
            endpoint = %self.endpoint,
            status,
            committed,
            duration_secs = duration.as_secs(),
            "Sync run finished"
        );
    }

    /// Record a run aborted by a fatal error
    pub fn record_failure(&self, error: &str) {
        let duration = self.start_time.elapsed();
        counter!("syncs_failed_total").increment(1);

        warn!(
            endpoint = %self.endpoint,
            error = %error,
            duration_secs = duration.as_secs(),
            "Sync run failed"
        );
    }
}
