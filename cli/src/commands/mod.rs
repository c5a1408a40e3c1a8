//! Command implementations
//!
//! Each command takes a [`Workspace`]: the loaded config plus the session and
//! repository system built from it.

pub mod components;
pub mod info;
pub mod install;
pub mod repos;
pub mod resolve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use depot_core::{Artifact, RepositorySystem, Session};

use crate::config::{self, DepotConfig};
use crate::system::{self, ConnectorStack};

pub struct Workspace {
    pub config_path: PathBuf,
    pub config: DepotConfig,
    pub session: Session,
    pub stack: ConnectorStack,
    pub system: RepositorySystem,
}

impl Workspace {
    /// Load the config at `config_path` (or the default location) and wire a session for it
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config::resolve_config_path(config_path)?;
        let config = config::load_config(&config_path).context("Failed to load config")?;
        Self::from_config(config_path, config)
    }

    pub fn from_config(config_path: PathBuf, config: DepotConfig) -> Result<Self> {
        let session = system::new_session(&config)?;
        let stack = ConnectorStack::new();
        let system = system::new_system(&stack);
        Ok(Self {
            config_path,
            config,
            session,
            stack,
            system,
        })
    }

    /// Parse coordinates, expanding packaging type ids such as `test-jar`
    pub fn parse_artifact(&self, coords: &str) -> Result<Artifact> {
        let artifact: Artifact = coords.parse()?;
        let types = self
            .session
            .artifact_types
            .as_ref()
            .context("session has no artifact type registry")?;
        Ok(types.apply(artifact))
    }
}
