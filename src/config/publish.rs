//! Signing key, relay and publish retry configuration

use crate::import::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and as whom events are published
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NostrConfig {
    /// Hex encoded secret key
    pub secret_key: Option<String>,
    /// Relay receiving the events
    pub relay_url: Option<String>,
    pub connect_timeout_secs: u64,
    /// How long to wait for the relay's `OK`
    pub ack_timeout_secs: u64,
}

impl Default for NostrConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            relay_url: None,
            connect_timeout_secs: 10,
            ack_timeout_secs: 15,
        }
    }
}

impl NostrConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }
}

/// Publish failure handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub retry: RetryPolicy,
    pub retry_delay_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::RetryOnce,
            retry_delay_ms: 2000,
        }
    }
}
