use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::consensus::WaitConfig;

const DEFAULT_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_RETRY_INTERVAL_MS: u64 = 2_000;

/// Configuration for a [`LedgerGateway`](crate::LedgerGateway).
///
/// Every field is optional in serialized form and falls back to the defaults
/// used by existing ledger deployments (20 s budget, 2 s between polls).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Total time to wait for a quorum reply, in milliseconds.
    pub timeout_ms: u64,

    /// Pause between two consensus polls, in milliseconds.
    pub retry_interval_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig::new(self.timeout(), self.retry_interval())
    }
}
