//! Runtime configuration read from the environment.

use std::path::PathBuf;

use thiserror::Error;

use stockroom_inventory::{DEFAULT_INVENTORY_PATH, DEFAULT_LOW_STOCK_THRESHOLD};
use stockroom_observability::{LogFormat, UnknownLogFormat};

pub const ENV_INVENTORY_FILE: &str = "STOCKROOM_FILE";
pub const ENV_LOW_STOCK_THRESHOLD: &str = "STOCKROOM_LOW_STOCK_THRESHOLD";
pub const ENV_LOG_FORMAT: &str = "STOCKROOM_LOG_FORMAT";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("STOCKROOM_LOW_STOCK_THRESHOLD must be a finite number, got {0:?}")]
    InvalidThreshold(String),

    #[error("STOCKROOM_LOG_FORMAT: {0}")]
    LogFormat(#[from] UnknownLogFormat),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// JSON file the stock table is saved to and loaded from.
    pub inventory_path: PathBuf,
    pub low_stock_threshold: f64,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inventory_path: PathBuf::from(DEFAULT_INVENTORY_PATH),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_INVENTORY_FILE).filter(|p| !p.trim().is_empty()) {
            config.inventory_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_LOW_STOCK_THRESHOLD) {
            config.low_stock_threshold = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|t| t.is_finite())
                .ok_or(ConfigError::InvalidThreshold(raw))?;
        }

        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            config.log_format = raw.parse()?;
        }

        Ok(config)
    }
}
