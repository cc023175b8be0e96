//! Configuration file support for eventdeck
//!
//! Config is loaded from `~/.eventdeck/config.toml` (or `$EVENTDECK_HOME/config.toml`).
//! Environment variables override config file settings.

use crate::storage::eventdeck_dir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global config instance (loaded once on first access)
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::load)
}

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// REST backend configuration
    pub api: ApiConfig,

    /// Live update channel configuration
    pub live: LiveConfig,

    /// AI assistant configuration
    pub assistant: AssistantConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the REST backend, including the `/api` prefix
    /// (default: "http://localhost:5000/api", env: EVENTDECK_API_BASE)
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Fallback polling interval in seconds when the push channel
    /// cannot connect (default: 15)
    pub poll_interval_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// OpenRouter API key (env: OPENROUTER_API_KEY). Assistant is
    /// unavailable when unset.
    pub api_key: Option<String>,
    /// Chat completion model used for event extraction
    pub model: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "alibaba/tongyi-deepresearch-30b-a3b:free".to_string(),
        }
    }
}

impl Config {
    /// Load config from disk, then apply environment overrides
    pub fn load() -> Self {
        let mut config = Self::load_file().unwrap_or_default();

        if let Ok(base) = std::env::var("EVENTDECK_API_BASE") {
            if !base.trim().is_empty() {
                config.api.base_url = base;
            }
        }
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.trim().is_empty() {
                config.assistant.api_key = Some(key);
            }
        }

        config
    }

    fn load_file() -> Option<Self> {
        let path = config_path()?;
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                crate::logging::warn(&format!("Invalid config.toml, using defaults: {}", e));
                None
            }
        }
    }
}

/// Path to the config file
pub fn config_path() -> Option<PathBuf> {
    eventdeck_dir().ok().map(|d| d.join("config.toml"))
}
