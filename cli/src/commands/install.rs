//! `depot install`: copy a file into the local store

use std::path::Path;

use anyhow::{Context, Result};
use depot_core::{InstallRequest, RequestTrace};

use super::Workspace;

pub fn handle_install(workspace: &Workspace, coords: &str, file: &Path) -> Result<()> {
    let file = file
        .canonicalize()
        .with_context(|| format!("Failed to locate {}", file.display()))?;
    let artifact = workspace.parse_artifact(coords)?.with_file(&file);

    let request = InstallRequest::new()
        .add_artifact(artifact)
        .with_trace(RequestTrace::new("depot install"));
    let result = workspace
        .system
        .install(&workspace.session, request)
        .context("Failed to install artifact")?;

    let store = workspace
        .session
        .local_store
        .as_ref()
        .context("session has no local store")?;
    for artifact in &result.artifacts {
        let target = store.base_dir().join(store.path_for_artifact(artifact));
        tracing::info!(%artifact, target = %target.display(), "installed");
        println!("Installed {artifact} to {}", target.display());
    }
    Ok(())
}
