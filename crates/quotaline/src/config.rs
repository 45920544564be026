use crate::error::{QuotalineError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "quotaline";

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/api/oauth/usage";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub cache: CacheConfig,
    pub api: ApiConfig,
}

/// Which status line fields are shown, and how wide the usage bars are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_app_name: bool,
    pub show_model: bool,
    pub show_tokens: bool,
    pub show_5h_usage: bool,
    pub show_5h_resets: bool,
    pub show_week_usage: bool,
    pub show_week_resets: bool,
    pub bar_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_app_name: true,
            show_model: true,
            show_tokens: true,
            show_5h_usage: true,
            show_5h_resets: true,
            show_week_usage: true,
            show_week_resets: true,
            bar_width: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Below this age the cached snapshot is always used.
    pub min_refetch_secs: u64,
    /// At or above this age the cached snapshot is always refetched.
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_refetch_secs: 30,
            max_age_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Returns the quotaline home directory.
///
/// Resolution order: `QUOTALINE_HOME`, then `$XDG_CONFIG_HOME/quotaline`,
/// then `~/.config/quotaline`.
pub fn quotaline_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("QUOTALINE_HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join(APP_NAME));
        }
    }
    let home = dirs::home_dir()
        .ok_or_else(|| QuotalineError::Config("Could not find home directory".to_string()))?;
    Ok(home.join(".config").join(APP_NAME))
}

/// Claude Code's data directory (`~/.claude`).
pub fn claude_home() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| QuotalineError::Config("Could not find home directory".to_string()))?;
    Ok(home.join(".claude"))
}

pub fn cache_path() -> Result<PathBuf> {
    Ok(quotaline_home()?.join("cache.json"))
}

/// Where older releases kept the usage cache.
pub fn legacy_cache_path() -> Result<PathBuf> {
    Ok(claude_home()?.join(".usage_cache.json"))
}

/// Claude Code appends to this file on every prompt; its mtime is the activity signal.
pub fn history_path() -> Result<PathBuf> {
    Ok(claude_home()?.join("history.jsonl"))
}

pub fn credentials_path() -> Result<PathBuf> {
    Ok(claude_home()?.join(".credentials.json"))
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(quotaline_home()?.join("config.toml"))
    }
}
