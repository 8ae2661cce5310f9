//! Configuration module for the C-Measure client
//!
//! This module handles client configuration:
//! - Location of the backend bridge and request timeouts
//! - Startup health-check policy
//! - Simulation mode (in-memory instrument instead of HTTP)
//! - Polling cadence and chart geometry (see [`settings`])
//!
//! # App Data Location
//!
//! The configuration file is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.cmeasure.panel/client.toml`
//! - **macOS**: `~/Library/Application Support/dev.cmeasure.panel/client.toml`
//! - **Windows**: `%APPDATA%\dev.cmeasure.panel\client.toml`
//!
//! # Environment Overrides
//!
//! - `CMEASURE_URL` - full backend URL
//! - `CMEASURE_PORT` - backend port on `127.0.0.1`
//! - `CMEASURE_SIMULATE` - `1`/`true`/`yes` to use the simulated instrument
//!
//! # Example
//!
//! ```ignore
//! use cmeasure_rs::config::ClientConfig;
//!
//! let config = ClientConfig::load_or_default().with_env_overrides();
//! println!("Backend at {}", config.backend_url);
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{PanelError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.cmeasure.panel";

/// Config filename
pub const CONFIG_FILE: &str = "client.toml";

/// Default backend address
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8123/";

/// Default timeout for a single backend request in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Default number of health probes before giving up
pub const DEFAULT_HEALTH_RETRIES: u32 = 40;

/// Default delay between health probes in milliseconds
pub const DEFAULT_HEALTH_RETRY_DELAY_MS: u64 = 300;

/// Default number of cells exposed by the simulated instrument
pub const DEFAULT_SIMULATED_CELLS: usize = 8;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        PanelError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            PanelError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the config file
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Client Config ====================

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend bridge
    pub backend_url: String,
    /// Timeout for a single request
    pub request_timeout_ms: u64,
    /// Health probes attempted at startup
    pub health_retries: u32,
    /// Delay between health probes
    pub health_retry_delay_ms: u64,
    /// Use the in-memory instrument instead of HTTP
    pub simulate: bool,
    /// Cell count of the in-memory instrument
    pub simulated_cells: usize,
    /// Directory for rolling log files; stdout only when unset
    pub log_dir: Option<PathBuf>,
    pub polling: PollIntervals,
    pub chart: ChartLayout,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            health_retries: DEFAULT_HEALTH_RETRIES,
            health_retry_delay_ms: DEFAULT_HEALTH_RETRY_DELAY_MS,
            simulate: false,
            simulated_cells: DEFAULT_SIMULATED_CELLS,
            log_dir: None,
            polling: PollIntervals::default(),
            chart: ChartLayout::default(),
        }
    }
}

impl ClientConfig {
    /// Load config from the default location
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            PanelError::Config("Could not determine config path".to_string())
        })?;
        Self::load_from(&path)
    }

    /// Load config from a specific file, defaults if it doesn't exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PanelError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;

        toml::from_str(&content)
            .map_err(|e| PanelError::Config(format!("Failed to parse config {:?}: {}", path, e)))
    }

    /// Load config, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load client config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(dir.join(CONFIG_FILE))
    }

    /// Save config to a specific file, creating parent directories
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PanelError::Config(format!("Failed to create {:?}: {}", parent, e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PanelError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| PanelError::Config(format!("Failed to write config {:?}: {}", path, e)))
    }

    /// Apply `CMEASURE_*` environment variables
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("CMEASURE_PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.backend_url = format!("http://127.0.0.1:{}/", port),
                Err(_) => tracing::warn!("Ignoring invalid CMEASURE_PORT: {:?}", port),
            }
        }
        if let Some(url) = lookup("CMEASURE_URL").filter(|u| !u.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        if let Some(flag) = lookup("CMEASURE_SIMULATE") {
            self.simulate = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        self
    }

    /// Request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Delay between startup health probes
    pub fn health_retry_delay(&self) -> Duration {
        Duration::from_millis(self.health_retry_delay_ms)
    }
}
