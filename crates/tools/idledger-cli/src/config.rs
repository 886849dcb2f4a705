use anyhow::{Context, Result};
use idledger_client::{GatewayConfig, LedgerSimConfig};
use serde::Deserialize;
use std::path::Path;

/// Configuration for the idledger CLI
///
/// Every section is optional; a missing file section keeps its defaults.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    /// Optional log level string (e.g., "info", "debug", "idledger_client=trace").
    /// `RUST_LOG` takes precedence when set.
    pub log_level: Option<String>,

    /// Consensus wait budget.
    pub gateway: GatewayConfig,

    /// Behaviour of the simulated validator pool.
    pub sim: LedgerSimConfig,
}

impl CliConfig {
    /// Load the configuration from a TOML file, or use defaults when no file
    /// was given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Apply wait budget values given on the command line over the loaded ones.
    pub fn with_overrides(
        mut self,
        timeout_ms: Option<u64>,
        retry_interval_ms: Option<u64>,
    ) -> Self {
        if let Some(timeout_ms) = timeout_ms {
            self.gateway.timeout_ms = timeout_ms;
        }
        if let Some(retry_interval_ms) = retry_interval_ms {
            self.gateway.retry_interval_ms = retry_interval_ms;
        }
        self
    }
}
