mod exchange;
mod logging;
mod store;

pub use exchange::*;
pub use logging::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        // A zero-capacity broadcast channel panics on construction.
        if self.exchange.announce_capacity == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "exchange.announce_capacity".into(),
                message: "announce_capacity must be greater than 0".into(),
            });
        }

        if self.exchange.fetch_timeout_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "exchange.fetch_timeout_ms".into(),
                message: "fetch_timeout_ms must be greater than 0".into(),
            });
        }

        // Offline lookups never wait, so a long timeout does nothing.
        if self.exchange.mode == FetchMode::Offline && self.exchange.fetch_timeout_ms > 60_000 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "exchange.fetch_timeout_ms".into(),
                message: "timeout has no effect in offline mode".into(),
            });
        }

        if self.store.path.as_os_str().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "store.path".into(),
                message: "path must not be empty".into(),
            });
        }

        if self.logging.filter.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "logging.filter".into(),
                message: "empty filter falls back to \"info\"".into(),
            });
        }

        errors
    }
}
