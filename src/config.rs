//! Configuration
//!
//! Layered configuration for the loader and the `infuse` binary. Sources, in
//! increasing precedence: built-in defaults, the global config file, an
//! explicit config file, and `INFUSE_` prefixed environment variables
//! (`INFUSE_LOADER__REFRESH_AFTER_MS=1000`).

use crate::error::LoadError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod explicit_file;
    pub mod global_file;
}

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfuseConfig {
    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine-wide defaults. Consumers and single requests can override the
/// timing options through `LoaderOptions` and `PathOptions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Mount name of the data tree in the store state
    #[serde(default = "default_root_node")]
    pub root_node: String,

    /// Mount name of the shadow (load metadata) tree in the store state
    #[serde(default = "default_shadow_node")]
    pub shadow_node: String,

    /// Milliseconds before a fetch is abandoned with TIMEOUT
    #[serde(default = "default_data_fetch_timeout_ms")]
    pub data_fetch_timeout_ms: u64,

    /// Milliseconds a started load is trusted to still be in flight
    #[serde(default = "default_retry_after_ms")]
    pub retry_after_ms: u64,

    /// Milliseconds loaded data stays fresh
    #[serde(default = "default_refresh_after_ms")]
    pub refresh_after_ms: u64,
}

fn default_root_node() -> String {
    "data".to_string()
}

fn default_shadow_node() -> String {
    "_data".to_string()
}

fn default_data_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_retry_after_ms() -> u64 {
    5_000
}

fn default_refresh_after_ms() -> u64 {
    60_000
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            root_node: default_root_node(),
            shadow_node: default_shadow_node(),
            data_fetch_timeout_ms: default_data_fetch_timeout_ms(),
            retry_after_ms: default_retry_after_ms(),
            refresh_after_ms: default_refresh_after_ms(),
        }
    }
}

impl LoaderConfig {
    pub fn data_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.data_fetch_timeout_ms)
    }

    pub fn retry_after(&self) -> Duration {
        Duration::from_millis(self.retry_after_ms)
    }

    pub fn refresh_after(&self) -> Duration {
        Duration::from_millis(self.refresh_after_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.root_node.trim().is_empty() {
            return Err("root_node cannot be empty".to_string());
        }
        if self.shadow_node.trim().is_empty() {
            return Err("shadow_node cannot be empty".to_string());
        }
        if self.root_node == self.shadow_node {
            return Err(format!(
                "root_node and shadow_node must differ (both are '{}')",
                self.root_node
            ));
        }
        if self.data_fetch_timeout_ms == 0 {
            return Err("data_fetch_timeout_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Loader(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Loader(msg) => write!(f, "Loader: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl InfuseConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.loader.validate() {
            errors.push(ValidationError::Loader(e));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "unknown format '{}'",
                self.logging.format
            )));
        }
        if !matches!(self.logging.output.as_str(), "stdout" | "stderr" | "file") {
            errors.push(ValidationError::Logging(format!(
                "unknown output '{}'",
                self.logging.output
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one configuration error
    pub fn ensure_valid(&self) -> Result<(), LoadError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            LoadError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }
}
