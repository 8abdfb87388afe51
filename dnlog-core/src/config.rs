//! Application configuration (TOML).
//!
//! Default location is `<config_dir>/dnlog/config.toml`. A missing default file
//! means defaults; a file that exists but does not parse is an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::market::{BinanceDeltaSource, DeltaSource, MarketError, MockDeltaSource};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Upper bound on `market.max_retries`.
pub const MAX_RETRIES: u32 = 10;

/// Where deltas come from when the operator does not type one in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Mock,
    Binance,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Mock => f.write_str("mock"),
            SourceKind::Binance => f.write_str("binance"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(SourceKind::Mock),
            "binance" => Ok(SourceKind::Binance),
            other => Err(ConfigError::Invalid(format!(
                "unknown delta source '{other}' (expected mock or binance)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub source: SourceKind,
    /// Spot price the mock source prices moneyness against.
    pub mock_spot: f64,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Mock,
            mock_spot: 67_000.0,
            base_url: "https://eapi.binance.com".into(),
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `positions.json` and `history.json`.
    pub data_dir: PathBuf,
    /// Underlying used in contract names and exchange symbols.
    pub underlying: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub market: MarketConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            underlying: "BTC".into(),
            log_filter: "warn".into(),
            market: MarketConfig::default(),
        }
    }
}

/// `<home>/.dnlog`, or `./.dnlog` when no home directory is known.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dnlog")
}

/// `<config_dir>/dnlog/config.toml`, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dnlog").join("config.toml"))
}

impl AppConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path must exist. Without one, the default path is used if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.underlying.trim().is_empty() {
            return Err(ConfigError::Invalid("underlying must not be empty".into()));
        }
        if !(self.market.mock_spot.is_finite() && self.market.mock_spot > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "market.mock_spot must be positive, got {}",
                self.market.mock_spot
            )));
        }
        if self.market.timeout_secs == 0 {
            return Err(ConfigError::Invalid("market.timeout_secs must be at least 1".into()));
        }
        if self.market.max_retries > MAX_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "market.max_retries must be at most {MAX_RETRIES}, got {}",
                self.market.max_retries
            )));
        }
        Ok(())
    }

    /// Build the configured delta source.
    pub fn delta_source(&self) -> Result<Box<dyn DeltaSource>, MarketError> {
        Ok(match self.market.source {
            SourceKind::Mock => Box::new(MockDeltaSource::new(self.market.mock_spot)),
            SourceKind::Binance => Box::new(BinanceDeltaSource::new(&self.market)?),
        })
    }
}
