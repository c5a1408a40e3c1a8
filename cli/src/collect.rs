//! Dependency collection from `deps.toml` descriptors
//!
//! Every artifact may publish a descriptor next to itself, e.g.
//! `org/example/lib/1.0/lib-1.0.deps.toml`:
//!
//! ```toml
//! [[dependencies]]
//! coords = "org.example:util:2.1"
//!
//! [[dependencies]]
//! coords = "org.junit:junit:4.13"
//! scope = "test"
//! ```
//!
//! Versions are exact; no ranges and no conflict mediation.

use std::collections::HashMap;

use anyhow::{Context, anyhow};
use depot_core::aggregator::RemoteRepositoryManager;
use depot_core::connector::ConnectorProvider;
use depot_core::error::{BoxError, CollectionError, TransferError};
use depot_core::graph::{DependencyCycle, SCOPE_COMPILE, SCOPE_PROVIDED, SCOPE_TEST};
use depot_core::resolution::ArtifactResolver;
use depot_core::resolver::ConnectorArtifactResolver;
use depot_core::{
    Artifact, ArtifactRequest, CollectRequest, CollectResult, Dependency, DependencyCollector, DependencyGraph,
    DependencyNode, NodeId, RemoteRepository, RequestTrace, ValidSession,
};
use serde::Deserialize;

pub const DESCRIPTOR_EXTENSION: &str = "deps.toml";

#[derive(Debug, Default, Deserialize)]
struct Descriptor {
    #[serde(default)]
    dependencies: Vec<DescriptorEntry>,
}

#[derive(Debug, Deserialize)]
struct DescriptorEntry {
    coords: String,
    #[serde(default = "default_scope")]
    scope: String,
    #[serde(default)]
    optional: bool,
}

fn default_scope() -> String {
    SCOPE_COMPILE.to_string()
}

/// Collects a dependency tree by reading each artifact's descriptor
#[derive(Debug, Clone)]
pub struct DescriptorCollector {
    resolver: ConnectorArtifactResolver,
}

/// State of one collection run
struct Expansion<'s> {
    session: ValidSession<'s>,
    repositories: Vec<RemoteRepository>,
    request_context: String,
    trace: RequestTrace,
    graph: DependencyGraph,
    /// Descriptor contents by artifact; `None` once reading failed
    descriptors: HashMap<String, Option<Vec<Dependency>>>,
    result: CollectResult,
}

impl DescriptorCollector {
    pub fn new(connectors: ConnectorProvider) -> Self {
        Self {
            resolver: ConnectorArtifactResolver::new(connectors, RemoteRepositoryManager::default()),
        }
    }

    /// Dependencies declared by `artifact`, or an empty list if it publishes no descriptor
    fn read_descriptor(
        &self,
        session: &ValidSession<'_>,
        artifact: &Artifact,
        repositories: &[RemoteRepository],
        trace: &RequestTrace,
    ) -> Result<Vec<Dependency>, BoxError> {
        let descriptor = Artifact::new(
            artifact.group_id(),
            artifact.artifact_id(),
            DESCRIPTOR_EXTENSION,
            artifact.version(),
        );
        let request = ArtifactRequest::new(descriptor, repositories.to_vec())
            .with_trace(trace.child(format!("descriptor {artifact}")));

        let results = match self.resolver.resolve_artifacts(session, vec![request]) {
            Ok(results) => results,
            Err(mut err) => {
                let results = err.take_results();
                let absent = results
                    .iter()
                    .flat_map(|r| r.errors())
                    .all(|e| e.downcast_ref::<TransferError>().is_some_and(is_absent));
                if absent {
                    tracing::debug!(%artifact, "no descriptor published");
                    return Ok(Vec::new());
                }
                let cause = results
                    .iter()
                    .flat_map(|r| r.errors())
                    .find(|e| !e.downcast_ref::<TransferError>().is_some_and(is_absent))
                    .map(ToString::to_string)
                    .unwrap_or_else(|| err.to_string());
                return Err(anyhow!("failed to fetch descriptor of {artifact}: {cause}").into());
            }
        };

        let Some(path) = results.first().and_then(|r| r.artifact()).and_then(|a| a.file()) else {
            return Ok(Vec::new());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read descriptor of {artifact} at {}", path.display()))?;
        parse_descriptor(&content).with_context(|| format!("invalid descriptor of {artifact}")).map_err(Into::into)
    }
}

fn is_absent(error: &TransferError) -> bool {
    matches!(error, TransferError::NotFound { .. } | TransferError::Unavailable { .. })
}

fn parse_descriptor(content: &str) -> anyhow::Result<Vec<Dependency>> {
    let descriptor: Descriptor = toml::from_str(content)?;
    descriptor
        .dependencies
        .into_iter()
        .map(|entry| -> anyhow::Result<Dependency> {
            let artifact: Artifact = entry.coords.parse()?;
            Ok(Dependency::new(artifact, entry.scope).with_optional(entry.optional))
        })
        .collect()
}

/// Dependencies that do not propagate past their direct dependent
fn is_transitive(dependency: &Dependency) -> bool {
    !dependency.is_optional() && dependency.scope() != SCOPE_TEST && dependency.scope() != SCOPE_PROVIDED
}

impl Expansion<'_> {
    fn node(&self, dependency: Dependency) -> DependencyNode {
        DependencyNode::from_dependency(dependency)
            .with_repositories(self.repositories.clone())
            .with_request_context(self.request_context.clone())
    }

    /// Memoized descriptor read; failures are recorded once as sub-errors
    fn descriptor(&mut self, collector: &DescriptorCollector, artifact: &Artifact) -> Vec<Dependency> {
        let key = artifact.to_string();
        if let Some(cached) = self.descriptors.get(&key) {
            return cached.clone().unwrap_or_default();
        }
        match collector.read_descriptor(&self.session, artifact, &self.repositories, &self.trace) {
            Ok(dependencies) => {
                self.descriptors.insert(key, Some(dependencies.clone()));
                dependencies
            }
            Err(err) => {
                tracing::warn!(%artifact, error = %err, "skipping dependencies of artifact");
                self.descriptors.insert(key, None);
                self.result.add_error(err);
                Vec::new()
            }
        }
    }

    /// Depth-first: add each dependency under `parent`, then its own descriptor's
    fn expand(
        &mut self,
        collector: &DescriptorCollector,
        parent: NodeId,
        path: &mut Vec<Dependency>,
        dependencies: Vec<Dependency>,
    ) {
        for dependency in dependencies {
            let key = dependency.artifact().versionless_key();
            if let Some(start) = path.iter().position(|d| d.artifact().versionless_key() == key) {
                let mut cycle = path[start..].to_vec();
                cycle.push(dependency);
                let cycle = DependencyCycle::new(path[..start].to_vec(), cycle);
                tracing::debug!(%cycle, "dependency cycle");
                self.result.add_cycle(cycle);
                continue;
            }

            let child = self.graph.add_child(parent, self.node(dependency.clone()));
            let transitive: Vec<Dependency> = self
                .descriptor(collector, dependency.artifact())
                .into_iter()
                .filter(is_transitive)
                .collect();
            path.push(dependency);
            self.expand(collector, child, path, transitive);
            path.pop();
        }
    }
}

impl DependencyCollector for DescriptorCollector {
    fn collect_dependencies(
        &self,
        session: &ValidSession<'_>,
        request: CollectRequest,
    ) -> Result<CollectResult, CollectionError> {
        let trace = RequestTrace::new_child(request.trace.as_ref(), format!("collect {request}"));
        let CollectRequest {
            root,
            root_artifact,
            dependencies,
            repositories,
            request_context,
            ..
        } = request;

        let (root_node, root_dependency) = match (root, root_artifact) {
            (Some(root), _) => (DependencyNode::from_dependency(root.clone()), root),
            (None, Some(artifact)) => (
                DependencyNode::from_artifact(artifact.clone()),
                Dependency::new(artifact, SCOPE_COMPILE),
            ),
            (None, None) => {
                return Err(CollectionError::new(
                    "collect request has neither a root dependency nor a root artifact",
                    CollectResult::default(),
                ));
            }
        };
        let reads_descriptor = root_node.dependency().is_some();
        let root_node = root_node
            .with_repositories(repositories.clone())
            .with_request_context(request_context.clone());

        let mut expansion = Expansion {
            session: *session,
            repositories,
            request_context,
            trace,
            graph: DependencyGraph::new(root_node),
            descriptors: HashMap::new(),
            result: CollectResult::default(),
        };

        let mut direct = if reads_descriptor {
            expansion.descriptor(self, root_dependency.artifact())
        } else {
            Vec::new()
        };
        direct.extend(dependencies);

        let root_id = expansion.graph.root();
        let mut path = vec![root_dependency];
        expansion.expand(self, root_id, &mut path, direct);

        tracing::info!(
            nodes = expansion.graph.len(),
            cycles = expansion.result.cycles.len(),
            errors = expansion.result.errors.len(),
            "collected dependencies"
        );
        let Expansion { graph, mut result, .. } = expansion;
        result.graph = Some(graph);
        result.into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::{Session, SimpleLocalStore};
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn publish(repo: &Path, relative: &str, content: &str) {
        let path = repo.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn collect(remote: &Path, local: &Path, request: CollectRequest) -> Result<CollectResult, CollectionError> {
        let session = Session::new(Arc::new(SimpleLocalStore::new(local)));
        let collector = DescriptorCollector::new(ConnectorProvider::with_defaults());
        let repository = RemoteRepository::builder("files", "default", format!("file://{}", remote.display())).build();
        collector.collect_dependencies(&session.validate().unwrap(), request.with_repositories(vec![repository]))
    }

    fn root(coords: &str) -> CollectRequest {
        CollectRequest::new().with_root(Dependency::new(coords.parse().unwrap(), SCOPE_COMPILE))
    }

    #[test]
    fn test_parse_descriptor_defaults() {
        let dependencies = parse_descriptor(
            "[[dependencies]]\ncoords = \"g:a:1\"\n\n[[dependencies]]\ncoords = \"g:b:2\"\nscope = \"test\"\noptional = true\n",
        )
        .unwrap();
        assert_eq!(dependencies[0].scope(), "compile");
        assert!(!dependencies[0].is_optional());
        assert_eq!(dependencies[1].scope(), "test");
        assert!(dependencies[1].is_optional());
        assert!(parse_descriptor("[[dependencies]]\ncoords = \"nonsense\"\n").is_err());
    }

    #[test]
    fn test_expands_descriptors_depth_first() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        publish(
            remote.path(),
            "g/app/1/app-1.deps.toml",
            "[[dependencies]]\ncoords = \"g:lib:1\"\n\n[[dependencies]]\ncoords = \"g:junit:4\"\nscope = \"test\"\n",
        );
        publish(
            remote.path(),
            "g/lib/1/lib-1.deps.toml",
            "[[dependencies]]\ncoords = \"g:util:2\"\n\n[[dependencies]]\ncoords = \"g:servlet:3\"\nscope = \"provided\"\n",
        );

        let result = collect(remote.path(), local.path(), root("g:app:1")).unwrap();
        let rendered = result.graph.unwrap().render();
        assert_eq!(
            rendered,
            "g:app:jar:1 (compile)\n   g:lib:jar:1 (compile)\n      g:util:jar:2 (compile)\n   g:junit:jar:4 (test)\n"
        );
    }

    #[test]
    fn test_cycle_is_recorded_not_followed() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        publish(remote.path(), "g/a/1/a-1.deps.toml", "[[dependencies]]\ncoords = \"g:b:1\"\n");
        publish(remote.path(), "g/b/1/b-1.deps.toml", "[[dependencies]]\ncoords = \"g:a:2\"\n");

        let result = collect(remote.path(), local.path(), root("g:a:1")).unwrap();
        assert_eq!(result.graph.unwrap().len(), 2);
        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.cycles[0].to_string(), "g:a:jar -> g:b:jar -> g:a:jar");
    }

    #[test]
    fn test_malformed_descriptor_is_a_sub_error() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        publish(
            remote.path(),
            "g/app/1/app-1.deps.toml",
            "[[dependencies]]\ncoords = \"g:lib:1\"\n\n[[dependencies]]\ncoords = \"g:other:1\"\n",
        );
        publish(remote.path(), "g/lib/1/lib-1.deps.toml", "dependencies = 3");

        let mut err = collect(remote.path(), local.path(), root("g:app:1")).unwrap_err();
        assert!(err.to_string().contains("invalid descriptor of g:lib:jar:1"));
        let partial = err.take_result();
        assert_eq!(partial.errors.len(), 1);
        assert_eq!(partial.graph.unwrap().len(), 3);
    }

    #[test]
    fn test_root_artifact_uses_request_dependencies_only() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        publish(remote.path(), "g/app/1/app-1.deps.toml", "[[dependencies]]\ncoords = \"g:ignored:1\"\n");

        let request = CollectRequest::new()
            .with_root_artifact("g:app:1".parse().unwrap())
            .add_dependency(Dependency::new("g:lib:1".parse().unwrap(), SCOPE_COMPILE));
        let result = collect(remote.path(), local.path(), request).unwrap();
        assert_eq!(result.graph.unwrap().render(), "g:app:jar:1\n   g:lib:jar:1 (compile)\n");
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        let err = collect(remote.path(), local.path(), CollectRequest::new()).unwrap_err();
        assert!(err.to_string().contains("neither a root dependency nor a root artifact"));
    }
}
