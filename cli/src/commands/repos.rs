//! `depot repos`: the effective repository list

use std::path::Path;

use anyhow::{Context, Result};
use depot_core::RemoteRepository;
use serde::Serialize;

use super::Workspace;
use crate::config::{self, PolicyConfig, RepositoryConfig};
use crate::system;

#[derive(Debug, Serialize)]
pub struct RepositoryView {
    pub id: String,
    pub url: String,
    pub layout: String,
    pub releases: bool,
    pub snapshots: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mirror_of: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub authenticated: bool,
    pub repository_manager: bool,
}

impl From<&RemoteRepository> for RepositoryView {
    fn from(repository: &RemoteRepository) -> Self {
        Self {
            id: repository.id().to_string(),
            url: repository.url().to_string(),
            layout: repository.content_type().to_string(),
            releases: repository.release_policy().is_enabled(),
            snapshots: repository.snapshot_policy().is_enabled(),
            mirror_of: repository
                .mirrored_repositories()
                .iter()
                .map(|r| r.id().to_string())
                .collect(),
            proxy: repository.proxy().map(ToString::to_string),
            authenticated: repository.authentication().is_some(),
            repository_manager: repository.is_repository_manager(),
        }
    }
}

/// Repositories as requests will see them, or as configured with `raw`
pub fn effective_repositories(workspace: &Workspace, raw: bool) -> Result<Vec<RemoteRepository>> {
    let configured = system::repositories(&workspace.config);
    if raw {
        return Ok(configured);
    }
    workspace
        .system
        .new_resolution_repositories(&workspace.session, &configured)
        .context("Failed to apply mirrors, proxies and credentials")
}

pub fn handle_list(workspace: &Workspace, raw: bool, json: bool) -> Result<()> {
    let repositories = effective_repositories(workspace, raw)?;
    let views: Vec<RepositoryView> = repositories.iter().map(RepositoryView::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if views.is_empty() {
        println!("No repositories configured.");
        println!("\nTo add one, use:");
        println!("  depot repos add central https://repo.example.org/maven2");
        return Ok(());
    }

    for view in &views {
        let mut flags = Vec::new();
        if !view.releases {
            flags.push("releases disabled");
        }
        if !view.snapshots {
            flags.push("snapshots disabled");
        }
        if view.authenticated {
            flags.push("authenticated");
        }
        if view.repository_manager {
            flags.push("repository manager");
        }
        print!("{} ({}, {})", view.id, view.url, view.layout);
        if !flags.is_empty() {
            print!(" [{}]", flags.join(", "));
        }
        println!();
        if !view.mirror_of.is_empty() {
            println!("  mirror of: {}", view.mirror_of.join(", "));
        }
        if let Some(proxy) = &view.proxy {
            println!("  proxy: {proxy}");
        }
    }
    Ok(())
}

pub fn handle_add(config_path: &Path, id: &str, url: &str, layout: &str, no_snapshots: bool) -> Result<()> {
    let repository = RepositoryConfig {
        id: id.to_string(),
        url: url.to_string(),
        layout: layout.to_string(),
        releases: PolicyConfig::default(),
        snapshots: PolicyConfig {
            enabled: !no_snapshots,
            ..PolicyConfig::default()
        },
    };
    config::add_repository(config_path, repository)?;
    println!("Added repository: {id} → {url}");
    Ok(())
}

pub fn handle_remove(config_path: &Path, id: &str) -> Result<()> {
    config::remove_repository(config_path, id)?;
    println!("Removed repository: {id}");
    Ok(())
}
