//! Initialize the configuration directory: create ~/.hush, a default config, and the exports dir.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{self, Config};

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with the default settings if missing.
/// - Creates the export directory (default `exports` subdirectory).
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        let default_config = serde_json::to_string_pretty(&Config::default())
            .context("serializing default config")?;
        std::fs::write(config_path, default_config)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let (config, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let exports = config::resolve_export_dir(&config, config_path);
    if !exports.exists() {
        std::fs::create_dir_all(&exports)
            .with_context(|| format!("creating export directory {}", exports.display()))?;
        log::info!("created export directory at {}", exports.display());
    } else {
        log::debug!("export directory already exists at {}, skipping", exports.display());
    }

    Ok(config_dir.to_path_buf())
}
