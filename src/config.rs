use anyhow::{Context, Result};
use gf_core::Config;
use std::path::{Path, PathBuf};

/// Locations searched, in order, when no `--config` is given.
const DEFAULT_PATHS: &[&str] = &["./gifforge.toml", "~/.config/gifforge/config.toml"];

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config = Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in config.validate() {
        tracing::warn!("{warning}");
    }
    Ok(config)
}

/// Load config from an explicit path, the default locations, or defaults.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_PATHS {
        let path = PathBuf::from(shellexpand::tilde(path_str).as_ref());
        if path.exists() {
            tracing::debug!("Using config {}", path.display());
            return load_config(&path);
        }
    }

    Ok(Config::default())
}
