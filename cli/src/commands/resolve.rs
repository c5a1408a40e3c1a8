//! `depot resolve`: collect and resolve a dependency tree

use std::sync::Arc;

use anyhow::{Context, Result};
use depot_core::graph::{SCOPE_COMPILE, ScopeFilter};
use depot_core::{CollectRequest, Dependency, DependencyRequest, DependencyResult, Error, RequestTrace};
use serde::Serialize;

use super::Workspace;
use super::repos::effective_repositories;

#[derive(Debug, Serialize)]
struct ResolvedView {
    coords: String,
    file: String,
    repository: String,
}

#[derive(Debug, Serialize)]
struct FailureView {
    coords: String,
    errors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ResolveReport {
    tree: Vec<String>,
    resolved: Vec<ResolvedView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<FailureView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cycles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    collect_errors: Vec<String>,
}

impl From<&DependencyResult> for ResolveReport {
    fn from(result: &DependencyResult) -> Self {
        let tree = result
            .graph
            .as_ref()
            .map(|graph| graph.render().lines().map(str::to_string).collect())
            .unwrap_or_default();
        let resolved = result
            .artifact_results
            .iter()
            .filter(|r| r.is_resolved())
            .filter_map(|r| {
                let artifact = r.artifact()?;
                Some(ResolvedView {
                    coords: artifact.to_string(),
                    file: artifact.file()?.display().to_string(),
                    repository: r.repository().unwrap_or("local").to_string(),
                })
            })
            .collect();
        let failed = result
            .unresolved()
            .map(|r| FailureView {
                coords: r.request().artifact().to_string(),
                errors: r.errors().iter().map(ToString::to_string).collect(),
            })
            .collect();
        Self {
            tree,
            resolved,
            failed,
            cycles: result.cycles.iter().map(ToString::to_string).collect(),
            collect_errors: result.collect_errors.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ResolveReport {
    fn print(&self) {
        for line in &self.tree {
            println!("{line}");
        }
        if !self.resolved.is_empty() {
            println!();
            println!("Resolved:");
            for artifact in &self.resolved {
                println!("  {} < {} ({})", artifact.coords, artifact.repository, artifact.file);
            }
        }
        if !self.failed.is_empty() {
            println!();
            println!("Failed:");
            for failure in &self.failed {
                println!("  {}", failure.coords);
                for error in &failure.errors {
                    println!("    {error}");
                }
            }
        }
        if !self.cycles.is_empty() {
            println!();
            println!("Cycles:");
            for cycle in &self.cycles {
                println!("  {cycle}");
            }
        }
        if !self.collect_errors.is_empty() {
            println!();
            println!("Collection errors:");
            for error in &self.collect_errors {
                println!("  {error}");
            }
        }
    }
}

/// Resolve `coords`; one coordinate becomes the root, several hang off a virtual root
pub fn handle_resolve(workspace: &Workspace, coords: &[String], scopes: &[String], json: bool) -> Result<()> {
    let mut artifacts = coords
        .iter()
        .map(|c| workspace.parse_artifact(c))
        .collect::<Result<Vec<_>>>()?;
    let repositories = effective_repositories(workspace, false)?;

    let collect = match artifacts.len() {
        0 => anyhow::bail!("at least one artifact coordinate is required"),
        1 => CollectRequest::new().with_root(Dependency::new(artifacts.remove(0), SCOPE_COMPILE)),
        _ => artifacts.into_iter().fold(
            CollectRequest::new().with_root_artifact(
                "depot:resolve:pom:0"
                    .parse()
                    .context("invalid virtual root coordinates")?,
            ),
            |request, artifact| request.add_dependency(Dependency::new(artifact, SCOPE_COMPILE)),
        ),
    }
    .with_repositories(repositories)
    .with_request_context("project");

    let mut request = DependencyRequest::from_collect_request(collect).with_trace(RequestTrace::new("depot resolve"));
    if !scopes.is_empty() {
        request = request.with_filter(Arc::new(ScopeFilter::including(scopes.iter().cloned())));
    }

    let (result, failure) = match workspace.system.resolve_dependencies(&workspace.session, request) {
        Ok(result) => (result, None),
        Err(Error::DependencyResolution(err)) => {
            let message = err.to_string();
            (err.into_result(), Some(message))
        }
        Err(err) => return Err(err).context("Failed to resolve dependencies"),
    };

    let report = ResolveReport::from(&result);
    tracing::info!(
        resolved = report.resolved.len(),
        failed = report.failed.len(),
        "resolution finished"
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }

    match failure {
        Some(message) => anyhow::bail!(message),
        None => Ok(()),
    }
}
