//! Configuration module for agrolink
//!
//! This module handles application configuration including:
//! - Link settings (peripheral name, GATT service and characteristic)
//! - Scoring service endpoint
//! - Saved-log storage key and logging options
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.agrolink.agrolink-rs/`
//! - **macOS**: `~/Library/Application Support/dev.agrolink.agrolink-rs/`
//! - **Windows**: `%APPDATA%\dev.agrolink.agrolink-rs\`
//!
//! # Files
//!
//! - `config.toml` - [`AppConfig`]
//! - `<saved_log_key>.json` - saved log snapshot
//! - `logs/` - rolling log files (when file logging is enabled)
//!
//! # Example
//!
//! ```ignore
//! use agrolink_rs::config::{resolve_data_dir, AppConfig};
//!
//! let data_dir = resolve_data_dir(None)?;
//! let config = AppConfig::load_or_default(AppConfig::path_in(&data_dir));
//! println!("looking for {}", config.link.device_name);
//! ```

use crate::error::{AgrolinkError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.agrolink.agrolink-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Peripheral advertised name the firmware uses
pub const DEFAULT_DEVICE_NAME: &str = "MyESP32";

/// GATT service carrying sensor frames
pub const DEFAULT_SERVICE_UUID: &str = "4fafc201-1fb5-459e-8fcc-c5c9c331914b";

/// Notify characteristic carrying sensor frames
pub const DEFAULT_CHARACTERISTIC_UUID: &str = "beb5483e-36e1-4688-b7f5-ea07361b26a8";

/// Default scoring service host
pub const DEFAULT_SCORING_URL: &str = "https://netprincesingh.pythonanywhere.com";

/// Prediction endpoint path
pub const DEFAULT_PREDICT_PATH: &str = "/api/predict/";

/// Storage key of the saved log snapshot
pub const DEFAULT_SAVED_LOG_KEY: &str = "messages";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure a data directory exists, creating it if needed
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| {
            AgrolinkError::Config(format!(
                "Failed to create data directory {}: {}",
                dir.display(),
                e
            ))
        })?;
    }
    Ok(())
}

/// Resolve the data directory, preferring an explicit override
pub fn resolve_data_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    match override_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => app_data_dir().ok_or_else(|| {
            AgrolinkError::Config("Could not determine app data directory".to_string())
        }),
    }
}

// ==================== App Config ====================

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Path of `config.toml` inside a data directory
    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Load configuration from a TOML file
    ///
    /// A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AgrolinkError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| AgrolinkError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration as pretty TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| AgrolinkError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| AgrolinkError::Config(format!("Failed to write config: {}", e)))
    }
}

/// Wireless link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Advertised name of the peripheral to connect to
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// GATT service UUID
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,

    /// Notify characteristic UUID
    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: String,

    /// Idle sleep of the link event loop in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_service_uuid() -> String {
    DEFAULT_SERVICE_UUID.to_string()
}

fn default_characteristic_uuid() -> String {
    DEFAULT_CHARACTERISTIC_UUID.to_string()
}

fn default_tick_interval_ms() -> u64 {
    10
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            service_uuid: default_service_uuid(),
            characteristic_uuid: default_characteristic_uuid(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Remote scoring service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_scoring_url")]
    pub base_url: String,

    #[serde(default = "default_predict_path")]
    pub predict_path: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scoring_url() -> String {
    DEFAULT_SCORING_URL.to_string()
}

fn default_predict_path() -> String {
    DEFAULT_PREDICT_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_url: default_scoring_url(),
            predict_path: default_predict_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ScoringConfig {
    /// Full prediction endpoint URL
    pub fn predict_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.predict_path.trim_start_matches('/')
        )
    }
}

/// Saved-log storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_saved_log_key")]
    pub saved_log_key: String,
}

fn default_saved_log_key() -> String {
    DEFAULT_SAVED_LOG_KEY.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            saved_log_key: default_saved_log_key(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write a daily rolling log file under `<data_dir>/logs`
    #[serde(default)]
    pub file: bool,
}

fn default_log_level() -> String {
    "info,agrolink_rs=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: false,
        }
    }
}

// ==================== Tests ====================
