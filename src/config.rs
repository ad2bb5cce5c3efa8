//! Runtime configuration, loadable from a TOML file.

use crate::error::{PaymentError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub processor: ProcessorConfig,
}

/// Lifecycle engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline applied to every store, ledger, and channel call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Page size used when a merchant listing asks for zero items.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

/// Simulated payment processor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Probability in `[0, 1]` that a payment is approved.
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,

    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,

    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            engine: EngineConfig::default(),
            processor: ProcessorConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            default_page_size: default_page_size(),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            success_rate: default_success_rate(),
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_call_timeout_ms() -> u64 {
    30_000
}

const fn default_page_size() -> usize {
    10
}

const fn default_success_rate() -> f64 {
    0.9
}

const fn default_min_latency_ms() -> u64 {
    1_000
}

const fn default_max_latency_ms() -> u64 {
    4_000
}

impl EngineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| PaymentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let processor = &self.processor;
        if !(0.0..=1.0).contains(&processor.success_rate) {
            return Err(PaymentError::Config(format!(
                "processor.success_rate must be within [0, 1], got {}",
                processor.success_rate
            )));
        }
        if processor.min_latency_ms > processor.max_latency_ms {
            return Err(PaymentError::Config(
                "processor.min_latency_ms exceeds processor.max_latency_ms".to_string(),
            ));
        }
        if self.engine.call_timeout_ms == 0 {
            return Err(PaymentError::Config(
                "engine.call_timeout_ms must be positive".to_string(),
            ));
        }
        if self.engine.default_page_size == 0 {
            return Err(PaymentError::Config(
                "engine.default_page_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
