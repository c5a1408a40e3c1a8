//! Directory path management for depot
//!
//! Configuration lives under the platform config dir, the default local
//! store under the platform data dir.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "DEPOT_CONFIG";

/// Get the base depot config directory (~/.config/depot/)
pub fn get_depot_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Failed to get config directory")?
        .join("depot"))
}

/// Get the default config file path (~/.config/depot/config.toml)
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_depot_dir()?.join("config.toml"))
}

/// Get the default local store (~/.local/share/depot/repository/)
///
/// Used when the config does not set `local_store`.
pub fn get_default_local_store() -> Result<PathBuf> {
    Ok(dirs::data_dir()
        .context("Failed to get data directory")?
        .join("depot")
        .join("repository"))
}
