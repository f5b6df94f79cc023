//! Configuration management for the swap orchestrator
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::bridge::BridgeOperation;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub instance_id: String,
    /// How long a quote waits for confirm/cancel before timing out
    pub confirmation_timeout_ms: u64,
    /// Per-attempt timeout for a single bridge call
    pub activity_timeout_ms: u64,
    /// How long terminal swaps stay queryable
    pub retention_secs: u64,
    pub cleanup_interval_secs: u64,
    pub retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            instance_id: "orchestrator-1".to_string(),
            confirmation_timeout_ms: 30_000,
            activity_timeout_ms: 60_000,
            retention_secs: 86_400,
            cleanup_interval_secs: 300,
            retry: RetryConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::from_millis(self.activity_timeout_ms)
    }
}

/// Bounded retry policy applied to every bridge call
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_interval_ms: u64,
    pub backoff_coefficient: f64,
    pub max_interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            backoff_coefficient: 2.0,
            max_interval_ms: 30_000,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

/// Settings for the in-process simulated bridge
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Artificial latency per bridge call
    pub latency_ms: u64,
    pub gas_fee_bps: u32,
    pub protocol_fee_bps: u32,
    /// Flat fee in source-token smallest units
    pub network_fee_units: u64,
    /// Charged only when source and destination chains differ
    pub bridge_fee_bps: u32,
    /// Charged by wrap and unwrap on the moved amount
    pub operation_fee_bps: u32,
    /// USD price per whole token, keyed by base symbol
    pub usd_prices: HashMap<String, f64>,
    pub failures: Vec<FailureInjection>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let usd_prices = [
            ("ETH", 3000.0),
            ("BTC", 60000.0),
            ("USDC", 1.0),
            ("USDT", 1.0),
            ("DAI", 1.0),
            ("MATIC", 0.6),
        ]
        .into_iter()
        .map(|(s, p)| (s.to_string(), p))
        .collect();

        Self {
            latency_ms: 0,
            gas_fee_bps: 5,
            protocol_fee_bps: 10,
            network_fee_units: 1_000,
            bridge_fee_bps: 5,
            operation_fee_bps: 1,
            usd_prices,
            failures: Vec::new(),
        }
    }
}

/// Makes the simulated bridge fail an operation
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FailureInjection {
    pub operation: BridgeOperation,
    /// Fail only the first N calls; `None` fails every call
    #[serde(default)]
    pub times: Option<u32>,
    #[serde(default)]
    pub kind: FailureKind,
    #[serde(default = "default_failure_message")]
    pub message: String,
}

/// How an injected failure is reported
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[default]
    Unavailable,
    Timeout,
}

fn default_failure_message() -> String {
    "injected failure".to_string()
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("SWAP_ORCHESTRATOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let orchestrator = &self.orchestrator;
        if orchestrator.confirmation_timeout_ms == 0 {
            anyhow::bail!("orchestrator.confirmation_timeout_ms must be positive");
        }
        if orchestrator.activity_timeout_ms == 0 {
            anyhow::bail!("orchestrator.activity_timeout_ms must be positive");
        }

        let retry = &orchestrator.retry;
        if retry.max_attempts == 0 {
            anyhow::bail!("orchestrator.retry.max_attempts must be at least 1");
        }
        if retry.backoff_coefficient < 1.0 {
            anyhow::bail!(
                "orchestrator.retry.backoff_coefficient must be >= 1.0, got {}",
                retry.backoff_coefficient
            );
        }
        if retry.max_interval_ms < retry.initial_interval_ms {
            anyhow::bail!("orchestrator.retry.max_interval_ms is below initial_interval_ms");
        }

        if self.bridge.latency_ms >= orchestrator.activity_timeout_ms {
            tracing::warn!(
                "Bridge latency {}ms reaches the activity timeout - every call will time out",
                self.bridge.latency_ms
            );
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("SWAP_TEST_VAR", "test_value");
        let input = "host = \"${SWAP_TEST_VAR}.internal\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "host = \"test_value.internal\"");
    }

    #[test]
    fn test_load_from_file() {
        env::set_var("SWAP_TEST_API_PORT", "8181");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[orchestrator]
instance_id = "test"
confirmation_timeout_ms = 5000

[orchestrator.retry]
max_attempts = 3

[api]
host = "0.0.0.0"
port = ${{SWAP_TEST_API_PORT}}

[bridge]
latency_ms = 10
failures = [
    {{ operation = "transfer", times = 2 }},
    {{ operation = "swap", kind = "timeout", message = "relay stalled" }},
]
"#
        )
        .unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.orchestrator.instance_id, "test");
        assert_eq!(
            settings.orchestrator.confirmation_timeout(),
            Duration::from_secs(5)
        );
        assert_eq!(settings.orchestrator.retry.max_attempts, 3);
        // unspecified retry fields keep defaults
        assert_eq!(settings.orchestrator.retry.initial_interval_ms, 1_000);
        assert_eq!(settings.api.port, 8181);
        assert_eq!(
            settings.bridge.failures,
            vec![
                FailureInjection {
                    operation: BridgeOperation::Transfer,
                    times: Some(2),
                    kind: FailureKind::Unavailable,
                    message: "injected failure".to_string(),
                },
                FailureInjection {
                    operation: BridgeOperation::Swap,
                    times: None,
                    kind: FailureKind::Timeout,
                    message: "relay stalled".to_string(),
                },
            ]
        );
        assert_eq!(settings.bridge.usd_prices.get("ETH"), Some(&3000.0));
    }

    #[test]
    fn test_validation_rejects_bad_retry_policy() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.orchestrator.retry.max_attempts = 0;
        assert!(settings.validate().is_err());

        settings.orchestrator.retry.max_attempts = 3;
        settings.orchestrator.retry.backoff_coefficient = 0.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_default_confirmation_window_is_thirty_seconds() {
        let settings = Settings::default();
        assert_eq!(
            settings.orchestrator.confirmation_timeout(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_shipped_default_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.api.port, 8080);
        assert_eq!(settings.orchestrator.retry.max_attempts, 5);
        assert!(settings.bridge.failures.is_empty());
    }
}
