//! Artifact, metadata and dependency resolution requests and results

use std::fmt;
use std::sync::Arc;

use crate::artifact::{Artifact, Metadata};
use crate::collection::CollectRequest;
use crate::error::{ArtifactResolutionError, BoxError};
use crate::graph::{DependencyCycle, DependencyFilter, DependencyGraph, NodeId};
use crate::repository::RemoteRepository;
use crate::session::ValidSession;
use crate::trace::RequestTrace;

#[derive(Debug, Clone)]
pub struct ArtifactRequest {
    artifact: Artifact,
    repositories: Vec<RemoteRepository>,
    node: Option<NodeId>,
    request_context: String,
    trace: Option<RequestTrace>,
}

impl ArtifactRequest {
    pub fn new(artifact: Artifact, repositories: Vec<RemoteRepository>) -> Self {
        Self {
            artifact,
            repositories,
            node: None,
            request_context: String::new(),
            trace: None,
        }
    }

    /// Graph node the request originates from; resolved artifacts are written back to it
    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_request_context(mut self, context: impl Into<String>) -> Self {
        self.request_context = context.into();
        self
    }

    pub fn with_trace(mut self, trace: RequestTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn repositories(&self) -> &[RemoteRepository] {
        &self.repositories
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn request_context(&self) -> &str {
        &self.request_context
    }

    pub fn trace(&self) -> Option<&RequestTrace> {
        self.trace.as_ref()
    }
}

#[derive(Debug)]
pub struct ArtifactResult {
    request: ArtifactRequest,
    artifact: Option<Artifact>,
    repository: Option<String>,
    errors: Vec<BoxError>,
}

impl ArtifactResult {
    pub fn new(request: ArtifactRequest) -> Self {
        Self {
            request,
            artifact: None,
            repository: None,
            errors: Vec::new(),
        }
    }

    pub fn request(&self) -> &ArtifactRequest {
        &self.request
    }

    /// The resolved artifact, with its file attached
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// Repository the artifact came from; `None` for the local store
    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    pub fn errors(&self) -> &[BoxError] {
        &self.errors
    }

    pub fn set_resolved(&mut self, artifact: Artifact, repository: Option<String>) {
        self.artifact = Some(artifact);
        self.repository = repository;
    }

    pub fn add_error(&mut self, error: impl Into<BoxError>) {
        self.errors.push(error.into());
    }

    pub fn is_resolved(&self) -> bool {
        self.artifact.as_ref().is_some_and(|a| a.file().is_some())
    }

    pub fn is_missing(&self) -> bool {
        !self.is_resolved() && self.errors.is_empty()
    }
}

impl fmt::Display for ArtifactResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.artifact {
            Some(artifact) if self.is_resolved() => {
                write!(f, "{artifact} < {}", self.repository.as_deref().unwrap_or("local"))
            }
            _ => write!(f, "{} (unresolved)", self.request.artifact),
        }
    }
}

/// Resolve a batch of artifacts
///
/// Implementations return every result; if any request could not be
/// satisfied the batch fails with an [`ArtifactResolutionError`] that still
/// carries all results.
pub trait ArtifactResolver: Send + Sync {
    fn resolve_artifacts(
        &self,
        session: &ValidSession<'_>,
        requests: Vec<ArtifactRequest>,
    ) -> Result<Vec<ArtifactResult>, ArtifactResolutionError>;
}

#[derive(Debug, Clone)]
pub struct MetadataRequest {
    metadata: Metadata,
    repository: Option<RemoteRepository>,
    trace: Option<RequestTrace>,
}

impl MetadataRequest {
    /// `repository` of `None` means the local store
    pub fn new(metadata: Metadata, repository: Option<RemoteRepository>) -> Self {
        Self {
            metadata,
            repository,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: RequestTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn repository(&self) -> Option<&RemoteRepository> {
        self.repository.as_ref()
    }

    pub fn trace(&self) -> Option<&RequestTrace> {
        self.trace.as_ref()
    }
}

#[derive(Debug)]
pub struct MetadataResult {
    request: MetadataRequest,
    metadata: Option<Metadata>,
    error: Option<BoxError>,
}

impl MetadataResult {
    pub fn new(request: MetadataRequest) -> Self {
        Self {
            request,
            metadata: None,
            error: None,
        }
    }

    pub fn request(&self) -> &MetadataRequest {
        &self.request
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn error(&self) -> Option<&BoxError> {
        self.error.as_ref()
    }

    pub fn set_resolved(&mut self, metadata: Metadata) {
        self.metadata = Some(metadata);
    }

    pub fn set_error(&mut self, error: impl Into<BoxError>) {
        self.error = Some(error.into());
    }

    pub fn is_resolved(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.file().is_some())
    }
}

/// Resolve metadata; failures are reported per result, never for the whole batch
pub trait MetadataResolver: Send + Sync {
    fn resolve_metadata(&self, session: &ValidSession<'_>, requests: Vec<MetadataRequest>) -> Vec<MetadataResult>;
}

/// Collect (or take as given) a dependency graph and resolve its artifacts
#[derive(Clone, Default)]
pub struct DependencyRequest {
    pub graph: Option<DependencyGraph>,
    pub collect_request: Option<CollectRequest>,
    pub filter: Option<Arc<dyn DependencyFilter>>,
    pub trace: Option<RequestTrace>,
}

impl DependencyRequest {
    /// Resolve the artifacts of an already collected graph
    pub fn from_graph(graph: DependencyGraph) -> Self {
        Self {
            graph: Some(graph),
            ..Self::default()
        }
    }

    pub fn from_collect_request(request: CollectRequest) -> Self {
        Self {
            collect_request: Some(request),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn DependencyFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_trace(mut self, trace: RequestTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Short description used as trace data
    pub fn describe(&self) -> String {
        match (&self.graph, &self.collect_request) {
            (Some(graph), _) => format!("resolve dependencies of {}", graph.node(graph.root())),
            (None, Some(request)) => format!("resolve dependencies of {request}"),
            (None, None) => "resolve dependencies".to_string(),
        }
    }
}

impl fmt::Debug for DependencyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRequest")
            .field("graph", &self.graph.as_ref().map(DependencyGraph::len))
            .field("collect_request", &self.collect_request)
            .field("filtered", &self.filter.is_some())
            .field("trace", &self.trace)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct DependencyResult {
    pub graph: Option<DependencyGraph>,
    pub cycles: Vec<DependencyCycle>,
    pub collect_errors: Vec<BoxError>,
    pub artifact_results: Vec<ArtifactResult>,
}

impl DependencyResult {
    /// Resolved artifacts in request order
    pub fn artifacts(&self) -> Vec<&Artifact> {
        self.artifact_results
            .iter()
            .filter(|r| r.is_resolved())
            .filter_map(ArtifactResult::artifact)
            .collect()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &ArtifactResult> {
        self.artifact_results.iter().filter(|r| !r.is_resolved())
    }
}
