//! HTTP and pacing configuration

use crate::import::FetchConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upstream HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User agent string (progarchives rejects unknown agents)
    pub user_agent: String,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Connection timeout (seconds)
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Chrome".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl From<&HttpConfig> for FetchConfig {
    fn from(http: &HttpConfig) -> Self {
        Self {
            user_agent: http.user_agent.clone(),
            timeout: Duration::from_secs(http.timeout_secs),
            connect_timeout: Duration::from_secs(http.connect_timeout_secs),
            ..FetchConfig::default()
        }
    }
}

/// Pauses between items
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause after a published item (milliseconds)
    pub item_delay_ms: u64,
    /// Pause after a skipped item (milliseconds)
    pub failure_delay_ms: u64,
    /// Wait between attempts of retry-forever fetches (seconds)
    pub transient_backoff_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: 2000,
            failure_delay_ms: 2000,
            transient_backoff_secs: 300,
        }
    }
}

impl PacingConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_delay_ms)
    }

    pub fn transient_backoff(&self) -> Duration {
        Duration::from_secs(self.transient_backoff_secs)
    }
}
