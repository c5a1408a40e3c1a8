//! Dependency collection contract
//!
//! A collector expands a root dependency into a [`DependencyGraph`]. It may fail
//! part way, in which case the [`CollectionError`] still carries whatever graph,
//! cycles and sub-errors were produced.

use std::fmt;

use crate::artifact::Artifact;
use crate::error::{BoxError, CollectionError};
use crate::graph::{Dependency, DependencyCycle, DependencyGraph};
use crate::repository::RemoteRepository;
use crate::session::ValidSession;
use crate::trace::RequestTrace;

#[derive(Debug, Clone, Default)]
pub struct CollectRequest {
    pub root: Option<Dependency>,
    pub root_artifact: Option<Artifact>,
    pub dependencies: Vec<Dependency>,
    pub repositories: Vec<RemoteRepository>,
    pub request_context: String,
    pub trace: Option<RequestTrace>,
}

impl CollectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: Dependency) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_root_artifact(mut self, artifact: Artifact) -> Self {
        self.root_artifact = Some(artifact);
        self
    }

    pub fn add_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_repositories(mut self, repositories: Vec<RemoteRepository>) -> Self {
        self.repositories = repositories;
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
}

impl fmt::Display for CollectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.root, &self.root_artifact) {
            (Some(root), _) => write!(f, "{}", root.artifact())?,
            (None, Some(artifact)) => write!(f, "{artifact}")?,
            (None, None) => f.write_str("(no root)")?,
        }
        let repositories: Vec<&str> = self.repositories.iter().map(RemoteRepository::id).collect();
        write!(
            f,
            " < {} direct dependencies, repositories [{}]",
            self.dependencies.len(),
            repositories.join(", ")
        )
    }
}

#[derive(Debug, Default)]
pub struct CollectResult {
    pub graph: Option<DependencyGraph>,
    pub cycles: Vec<DependencyCycle>,
    pub errors: Vec<BoxError>,
}

impl CollectResult {
    pub fn new(graph: DependencyGraph) -> Self {
        Self {
            graph: Some(graph),
            ..Self::default()
        }
    }

    pub fn add_cycle(&mut self, cycle: DependencyCycle) {
        self.cycles.push(cycle);
    }

    pub fn add_error(&mut self, error: impl Into<BoxError>) {
        self.errors.push(error.into());
    }

    /// Ok if no sub-errors were recorded, otherwise a [`CollectionError`] wrapping this result
    pub fn into_outcome(self) -> Result<CollectResult, CollectionError> {
        if self.errors.is_empty() {
            return Ok(self);
        }
        let message = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(CollectionError::new(message, self))
    }
}

/// Builds the dependency graph for a request
pub trait DependencyCollector: Send + Sync {
    fn collect_dependencies(
        &self,
        session: &ValidSession<'_>,
        request: CollectRequest,
    ) -> Result<CollectResult, CollectionError>;
}
