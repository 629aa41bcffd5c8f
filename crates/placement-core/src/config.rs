//! Application configuration management.
//!
//! Configuration is stored at `~/.config/placement-agent/config.json`; every
//! field is optional and falls back to a built-in default. A handful of
//! environment variables override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "placement-agent";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend started by the run scripts listens here
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// How long to wait for the assistant widget before offering the simple chat
const DEFAULT_WIDGET_TIMEOUT_SECS: u64 = 3;

const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 30;

pub const ENV_API_URL: &str = "PLACEMENT_API_URL";
pub const ENV_WIDGET_URL: &str = "PLACEMENT_WIDGET_URL";
pub const ENV_USERNAME: &str = "PLACEMENT_USERNAME";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_username: Option<String>,
    pub widget_url: Option<String>,
    pub widget_timeout_secs: Option<u64>,
    pub health_interval_secs: Option<u64>,
}

/// Pick the environment value when set and non-empty, else the file value
fn env_or(env_value: Option<String>, file_value: Option<&str>) -> Option<String> {
    env_value
        .filter(|v| !v.trim().is_empty())
        .or_else(|| file_value.map(str::to_string))
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the session storage file and logs
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn api_base_url(&self) -> String {
        env_or(std::env::var(ENV_API_URL).ok(), self.api_base_url.as_deref())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn widget_url(&self) -> Option<String> {
        env_or(std::env::var(ENV_WIDGET_URL).ok(), self.widget_url.as_deref())
    }

    /// Username to prefill in the login form
    pub fn initial_username(&self) -> Option<String> {
        env_or(std::env::var(ENV_USERNAME).ok(), self.last_username.as_deref())
    }

    pub fn widget_timeout(&self) -> Duration {
        Duration::from_secs(self.widget_timeout_secs.unwrap_or(DEFAULT_WIDGET_TIMEOUT_SECS))
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(
            self.health_interval_secs
                .unwrap_or(DEFAULT_HEALTH_INTERVAL_SECS)
                .max(1),
        )
    }
}
