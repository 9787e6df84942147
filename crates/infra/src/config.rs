//! Engine configuration, read from the environment.

use std::time::Duration;

use thiserror::Error;

use bazaar_inventory::DEFAULT_LOW_STOCK_THRESHOLD;
use bazaar_orders::DEFAULT_PREFIX;

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: expected {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on waiting for any single row lock.
    pub lock_timeout: Duration,
    pub order_number_prefix: String,
    /// Threshold given to catalog variants registered without one.
    pub default_low_stock_threshold: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            order_number_prefix: DEFAULT_PREFIX.to_string(),
            default_low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

impl EngineConfig {
    /// `BAZAAR_LOCK_TIMEOUT_MS`, `BAZAAR_ORDER_PREFIX`, `BAZAAR_LOW_STOCK_THRESHOLD`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("BAZAAR_LOCK_TIMEOUT_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "BAZAAR_LOCK_TIMEOUT_MS",
                expected: "milliseconds as a positive integer",
                value: raw.clone(),
            })?;
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    key: "BAZAAR_LOCK_TIMEOUT_MS",
                    expected: "milliseconds as a positive integer",
                    value: raw,
                });
            }
            config.lock_timeout = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup("BAZAAR_ORDER_PREFIX") {
            let prefix = raw.trim();
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(ConfigError::Invalid {
                    key: "BAZAAR_ORDER_PREFIX",
                    expected: "non-empty ASCII letters, digits or '-'",
                    value: raw.clone(),
                });
            }
            config.order_number_prefix = prefix.to_string();
        }

        if let Some(raw) = lookup("BAZAAR_LOW_STOCK_THRESHOLD") {
            config.default_low_stock_threshold = raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|t| *t >= 0)
                .ok_or_else(|| ConfigError::Invalid {
                    key: "BAZAAR_LOW_STOCK_THRESHOLD",
                    expected: "a non-negative integer",
                    value: raw.clone(),
                })?;
        }

        Ok(config)
    }
}
