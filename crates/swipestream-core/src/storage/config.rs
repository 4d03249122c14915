//! TOML-based application configuration.
//!
//! Stores the lookahead pool size, the canonical private collection name,
//! and remote API settings. Configuration is stored at
//! `~/.config/swipestream/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::buffer::DEFAULT_POOL_SIZE;
use crate::error::ConfigError;

/// Remote API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Lookahead pool size of the selection buffer.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Name of the canonical private collection kept items are added to.
    #[serde(default = "default_private_collection")]
    pub private_collection: String,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            private_collection: default_private_collection(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when no file exists.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Persist configuration to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, raw).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/swipestream"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_private_collection() -> String {
    "private".to_string()
}

fn default_base_url() -> String {
    "https://api.swipestream.app/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = toml::from_str("pool_size = 2").unwrap();
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.private_collection, "private");
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&raw).unwrap();
        assert_eq!(back.pool_size, config.pool_size);
        assert_eq!(back.api.base_url, config.api.base_url);
    }
}
