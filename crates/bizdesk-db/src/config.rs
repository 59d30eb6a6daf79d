//! Application configuration.
//!
//! Loaded from `BIZDESK_*` environment variables with fallback to defaults.
//!
//! | Variable                      | Default       |
//! |-------------------------------|---------------|
//! | `BIZDESK_DB_PATH`             | `bizdesk.db`  |
//! | `BIZDESK_MAX_CONNECTIONS`     | `5`           |
//! | `BIZDESK_LOW_STOCK_THRESHOLD` | `10`          |
//! | `BIZDESK_CURRENCY_SYMBOL`     | `$`           |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::pool::DbConfig;
use bizdesk_core::LOW_STOCK_THRESHOLD;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Stock rows below this are reported as low
    pub low_stock_threshold: i64,

    /// Shown in front of amounts in reports
    pub currency_symbol: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from("bizdesk.db"),
            max_connections: 5,
            low_stock_threshold: LOW_STOCK_THRESHOLD,
            currency_symbol: "$".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let config = AppConfig {
            db_path: lookup("BIZDESK_DB_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),

            max_connections: match lookup("BIZDESK_MAX_CONNECTIONS") {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("BIZDESK_MAX_CONNECTIONS".to_string()))?,
                None => defaults.max_connections,
            },

            low_stock_threshold: match lookup("BIZDESK_LOW_STOCK_THRESHOLD") {
                Some(v) => v.trim().parse().map_err(|_| {
                    ConfigError::InvalidValue("BIZDESK_LOW_STOCK_THRESHOLD".to_string())
                })?,
                None => defaults.low_stock_threshold,
            },

            currency_symbol: lookup("BIZDESK_CURRENCY_SYMBOL")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.currency_symbol),
        };

        if config.max_connections == 0 {
            return Err(ConfigError::OutOfRange {
                key: "BIZDESK_MAX_CONNECTIONS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if config.low_stock_threshold < 0 {
            return Err(ConfigError::OutOfRange {
                key: "BIZDESK_LOW_STOCK_THRESHOLD".to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        Ok(config)
    }

    /// Pool settings for this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.db_path.clone()).max_connections(self.max_connections)
    }

    /// Formats cents with the configured symbol, e.g. `€12.50`.
    pub fn format_money(&self, cents: i64) -> String {
        let sign = if cents < 0 { "-" } else { "" };
        let abs = cents.unsigned_abs();
        format!("{}{}{}.{:02}", sign, self.currency_symbol, abs / 100, abs % 100)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("{key} {reason}")]
    OutOfRange { key: String, reason: String },
}
