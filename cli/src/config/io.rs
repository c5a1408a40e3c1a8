//! Configuration file I/O operations
//!
//! Reading, writing and updating the depot configuration file. Every load and
//! save is validated.

use super::paths::{CONFIG_ENV, get_config_path};
use super::schema::{DepotConfig, RepositoryConfig};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Pick the config file: an explicit path wins, then `DEPOT_CONFIG`, then the default location
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => get_config_path(),
    }
}

/// Load configuration from `path`
///
/// Returns a default (empty) config if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<DepotConfig> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(DepotConfig::default());
    }

    let content =
        fs::read_to_string(path).context(format!("Failed to read config: {}", path.display()))?;

    let config: DepotConfig =
        toml::from_str(&content).context(format!("Failed to parse config: {}", path.display()))?;

    if let Err(errors) = config.validate() {
        anyhow::bail!(
            "Config validation failed in {}:\n  {}",
            path.display(),
            errors.join("\n  ")
        );
    }

    Ok(config)
}

/// Save configuration to `path`, creating parent directories as needed
pub fn save_config(config: &DepotConfig, path: &Path) -> Result<()> {
    if let Err(errors) = config.validate() {
        anyhow::bail!("cannot save invalid config:\n  {}", errors.join("\n  "));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(format!(
            "Failed to create config directory: {}",
            parent.display()
        ))?;
    }

    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(path, content).context(format!("Failed to write config: {}", path.display()))?;

    Ok(())
}

/// Load, modify, validate and save in one step
pub fn update_config<F>(path: &Path, f: F) -> Result<()>
where
    F: FnOnce(&mut DepotConfig) -> Result<()>,
{
    let mut config = load_config(path)?;
    f(&mut config)?;
    save_config(&config, path)?;
    Ok(())
}

/// Append a repository; fails if the id is taken
pub fn add_repository(path: &Path, repository: RepositoryConfig) -> Result<()> {
    update_config(path, |config| {
        if config.repositories.iter().any(|r| r.id == repository.id) {
            anyhow::bail!("repository '{}' already exists", repository.id);
        }
        config.repositories.push(repository);
        Ok(())
    })
}

/// Remove a repository by id
pub fn remove_repository(path: &Path, id: &str) -> Result<()> {
    update_config(path, |config| {
        let before = config.repositories.len();
        config.repositories.retain(|r| r.id != id);
        if config.repositories.len() == before {
            anyhow::bail!("repository '{}' not found", id);
        }
        Ok(())
    })
}
