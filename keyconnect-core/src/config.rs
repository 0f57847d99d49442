use keyconnect_device::{DEFAULT_BRIDGE_URL, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime settings shared by the executor, transport and backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bridge_url: String,
    /// File path or http(s) URL of the signed transport configuration
    pub transport_config: Option<String>,
    pub poll_interval_ms: u64,
    pub pin_retry_delay_ms: u64,
    pub max_retries: Option<u32>,
    /// Overrides the per-coin Insight endpoint
    pub insight_url: Option<String>,
    /// Overrides the rippled endpoint
    pub rippled_url: Option<String>,
    /// Skip per-origin permission confirmation
    pub trusted: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_url: DEFAULT_BRIDGE_URL.to_string(),
            transport_config: None,
            poll_interval_ms: 500,
            pin_retry_delay_ms: 2500,
            max_retries: None,
            insight_url: None,
            rippled_url: None,
            trusted: false,
        }
    }
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            pin_retry_delay: Duration::from_millis(self.pin_retry_delay_ms),
            max_retries: self.max_retries,
        }
    }
}
