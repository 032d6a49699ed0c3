//! # Application Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_DB_PATH=/var/lib/till/till.db                                 │
//! │     TILL_STORE_NAME="Corner Shop"                                      │
//! │     TILL_CURRENCY_SYMBOL=R$                                            │
//! │     TILL_DEFAULT_TAX_RATE=5.5                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/till/till.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.till.pos/till.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "till.db"
//! max_connections = 5
//!
//! [store]
//! name = "Corner Shop"
//! currency_symbol = "$"
//! currency_decimals = 2
//! default_tax_rate_bps = 0
//!
//! [reports]
//! top_products_limit = 20
//! top_stock_limit = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;
use till_core::validation::validate_rate_bps;
use till_core::TaxRate;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    #[error("Failed to save config: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file, created on first start.
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("till.db"),
            max_connections: 5,
        }
    }
}

/// Store identity and money display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub name: String,
    pub currency_symbol: String,
    pub currency_decimals: u8,
    /// Surcharge in basis points that `SalesProcessor::default_terms` starts from.
    pub default_tax_rate_bps: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: "Till".to_string(),
            currency_symbol: "$".to_string(),
            currency_decimals: 2,
            default_tax_rate_bps: 0,
        }
    }
}

impl StoreSettings {
    pub fn default_tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.default_tax_rate_bps)
    }

    /// Formats a cent amount with the store's symbol.
    ///
    /// ```rust
    /// use till_db::config::StoreSettings;
    ///
    /// let store = StoreSettings::default();
    /// assert_eq!(store.format_currency(-1234), "-$12.34");
    /// ```
    pub fn format_currency(&self, cents: i64) -> String {
        let divisor = 10_i64.pow(u32::from(self.currency_decimals));
        let whole = (cents / divisor).abs();
        let frac = (cents % divisor).abs();
        let sign = if cents < 0 { "-" } else { "" };

        if self.currency_decimals > 0 {
            format!(
                "{sign}{}{whole}.{frac:0width$}",
                self.currency_symbol,
                width = usize::from(self.currency_decimals)
            )
        } else {
            format!("{sign}{}{whole}", self.currency_symbol)
        }
    }
}

/// Default row counts for the ranking reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub top_products_limit: u32,
    pub top_stock_limit: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            top_products_limit: 20,
            top_stock_limit: 10,
        }
    }
}

// =============================================================================
// AppConfig
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub reports: ReportSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`till.toml`); a missing file is not an error
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Like [`AppConfig::load`], falling back to defaults on any error.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Writes the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.store.currency_decimals > 4 {
            return Err(ConfigError::Invalid(
                "store.currency_decimals must be at most 4".into(),
            ));
        }

        validate_rate_bps("store.default_tax_rate_bps", self.store.default_tax_rate_bps)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.reports.top_products_limit == 0 || self.reports.top_stock_limit == 0 {
            return Err(ConfigError::Invalid("report limits must be greater than 0".into()));
        }

        Ok(())
    }

    /// Pool settings for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TILL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(name) = std::env::var("TILL_STORE_NAME") {
            self.store.name = name;
        }

        if let Ok(symbol) = std::env::var("TILL_CURRENCY_SYMBOL") {
            self.store.currency_symbol = symbol;
        }

        // Percentage, e.g. "5.5"
        if let Ok(rate) = std::env::var("TILL_DEFAULT_TAX_RATE") {
            match rate.parse::<f64>() {
                Ok(pct) => self.store.default_tax_rate_bps = TaxRate::from_percentage(pct).bps(),
                Err(_) => warn!(rate = %rate, "Ignoring unparsable TILL_DEFAULT_TAX_RATE"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "till", "pos")
            .map(|dirs| dirs.config_dir().join("till.toml"))
    }
}
