//! `depot info`: paths and configuration statistics

use anyhow::Result;

use super::Workspace;
use crate::{config, logging};

pub fn handle_info(workspace: &Workspace) -> Result<()> {
    let cfg = &workspace.config;
    let local_store = match &cfg.local_store {
        Some(path) => path.clone(),
        None => config::get_default_local_store()?,
    };

    println!("depot {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Config file:   {}", workspace.config_path.display());
    println!("Local store:   {}", local_store.display());
    println!("Log directory: {}", logging::get_log_dir()?.display());
    if cfg.offline {
        println!("Mode:          offline");
    }

    println!();
    println!("Statistics:");
    println!("  Repositories: {}", cfg.repositories.len());
    println!("  Mirrors:      {}", cfg.mirrors.len());
    println!("  Proxies:      {}", cfg.proxies.len());
    println!("  Servers:      {}", cfg.servers.len());
    println!("  Properties:   {}", cfg.properties.len());
    Ok(())
}
