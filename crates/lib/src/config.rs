//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.hush/config.json`) and environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Where the chat backend lives and how long to wait for it.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Chat defaults (mode, history persistence).
    #[serde(default)]
    pub chat: ChatConfig,

    /// Session export settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Backend URL and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL (default "http://localhost:5000"). Overridden by HUSH_BACKEND_URL env.
    #[serde(default)]
    pub url: Option<String>,

    /// Timeout for calls that wait on inference (send message, analyze request). Default 30.
    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,

    /// Timeout for metadata calls (sessions, modes, health, ...). Default 10.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_chat_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            chat_timeout_secs: default_chat_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Mode used before any session is selected (default "general").
    #[serde(default)]
    pub default_mode: Option<String>,

    /// Whether sends ask the backend to persist the exchange. Default true.
    #[serde(default = "default_save_history")]
    pub save_history: bool,
}

fn default_save_history() -> bool {
    true
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_mode: None,
            save_history: default_save_history(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    /// Directory for exported sessions. Relative paths are resolved against the config file's
    /// parent. Default: `exports` next to the config file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Resolve the backend URL: env HUSH_BACKEND_URL overrides config.
pub fn resolve_backend_url(config: &Config) -> Option<String> {
    std::env::var("HUSH_BACKEND_URL")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .backend
                .url
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Mode to use when no session is active.
pub fn resolve_default_mode(config: &Config) -> String {
    config
        .chat
        .default_mode
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| crate::modes::DEFAULT_MODE_ID.to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("HUSH_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".hush").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the default path (or HUSH_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving the config directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Default export directory: `exports` subdirectory of the config file's parent.
pub fn exports_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("exports")
}

/// Resolve the export directory: `config.export.directory` if set (relative paths resolved
/// against the config file's parent), otherwise the default `exports` subdirectory.
pub fn resolve_export_dir(config: &Config, config_path: &Path) -> PathBuf {
    let config_parent = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match &config.export.directory {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                config_parent.join(d)
            }
        }
        _ => exports_dir(config_path),
    }
}
