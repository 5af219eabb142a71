//! Configuration management with XDG paths
//!
//! ~/.config/folio/config.json - endpoint, theme, preferences
//! ~/.local/state/folio/       - chats.json, folio.log

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const APP_NAME: &str = "folio";

/// Environment override for the service base URL
pub const ENDPOINT_ENV: &str = "FOLIO_ENDPOINT";

/// Get config directory (~/.config/folio/)
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}

/// Get state directory (~/.local/state/folio/)
pub fn state_dir() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .context("Could not determine state directory")?;
    Ok(base.join(APP_NAME))
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Persisted chat collection
pub fn chats_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("chats.json"))
}

/// Log file used while the TUI owns the terminal
pub fn log_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("folio.log"))
}

/// Ensure all directories exist
pub fn ensure_dirs() -> Result<()> {
    fs::create_dir_all(config_dir()?)?;
    fs::create_dir_all(state_dir()?)?;
    Ok(())
}

/// Color scheme preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => anyhow::bail!("Unknown theme: {}. Valid themes: light, dark", other),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the recommendation service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Replicate each chat to the save endpoint
    #[serde(default = "default_true")]
    pub sync_enabled: bool,

    #[serde(default)]
    pub theme: Theme,

    /// How long the thinking indicator stays up for small talk
    #[serde(default = "default_casual_delay")]
    pub casual_delay_ms: u64,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String { "http://127.0.0.1:5000".to_string() }
fn default_true() -> bool { true }
fn default_casual_delay() -> u64 { 1500 }
fn default_timeout() -> u64 { 60 }

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            sync_enabled: default_true(),
            theme: Theme::default(),
            casual_delay_ms: default_casual_delay(),
            request_timeout_secs: default_timeout(),
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults
    pub fn load() -> Result<Self> {
        ensure_dirs()?;
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        ensure_dirs()?;
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Endpoint with the environment override applied
    pub fn effective_endpoint(&self) -> String {
        match std::env::var(ENDPOINT_ENV) {
            Ok(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ => self.endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn casual_delay(&self) -> Duration {
        Duration::from_millis(self.casual_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
