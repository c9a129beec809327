//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, offline mode, the last used login email, and whether
//! credentials are sealed at rest.
//!
//! Configuration is stored at `~/.config/travelmate/config.json`. The
//! `TRAVELMATE_API_URL` and `TRAVELMATE_OFFLINE` environment variables
//! override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Application name used for config/data directory paths
const APP_NAME: &str = "travelmate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Subdirectory of the data directory holding locally saved plans
const PLANS_DIR: &str = "plans";

/// Subdirectory of the data directory holding log files
const LOGS_DIR: &str = "logs";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

pub const API_URL_ENV: &str = "TRAVELMATE_API_URL";
pub const OFFLINE_ENV: &str = "TRAVELMATE_OFFLINE";

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub offline_mode: bool,
    #[serde(default)]
    pub last_email: Option<String>,
    #[serde(default = "default_true")]
    pub encrypt_credentials: bool,
    #[serde(default)]
    pub log_to_file: bool,
    /// Overrides the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            offline_mode: false,
            last_email: None,
            encrypt_credentials: true,
            log_to_file: false,
            data_dir: None,
        }
    }
}

/// Accepts the usual spellings of a boolean flag.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load the config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment-style overrides looked up through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            debug!(url = %url, "API base URL overridden from environment");
            self.api_base_url = url.trim().to_string();
        }
        if let Some(offline) = var(OFFLINE_ENV).as_deref().and_then(parse_flag) {
            debug!(offline, "Offline mode overridden from environment");
            self.offline_mode = offline;
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Edit the saved config file without persisting environment overrides.
    pub fn update_saved(edit: impl FnOnce(&mut Config)) -> Result<()> {
        let path = Self::config_path()?;
        let mut saved = Self::load_from(&path)?;
        edit(&mut saved);
        saved.save_to(&path)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the credential store, local plans, and logs.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn plans_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(PLANS_DIR))
    }

    pub fn logs_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(LOGS_DIR))
    }
}
