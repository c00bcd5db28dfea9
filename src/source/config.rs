//! RPC source configuration

/// Upper bound for the optional request-rate limit
pub const MAX_REQUESTS_PER_SECOND: u32 = 10_000;

/// Configuration for the JSON-RPC block source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL (e.g., "https://mainnet.infura.io/v3/<key>")
    pub endpoint: String,
    /// Optional cap on requests per second, enforced client-side
    pub max_requests_per_second: Option<u32>,
}

impl RpcConfig {
    /// Configuration for `endpoint` without a request-rate cap
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_requests_per_second: None,
        }
    }

    /// Cap client-side requests per second
    pub fn with_max_requests_per_second(mut self, limit: Option<u32>) -> Self {
        self.max_requests_per_second = limit;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.trim().is_empty() {
            return Err("RPC endpoint cannot be empty".to_string());
        }

        if let Some(limit) = self.max_requests_per_second {
            if limit == 0 {
                return Err("max requests per second must be at least 1".to_string());
            }
            if limit > MAX_REQUESTS_PER_SECOND {
                return Err(format!(
                    "max requests per second {limit} exceeds maximum of {MAX_REQUESTS_PER_SECOND}"
                ));
            }
        }

        Ok(())
    }
}
