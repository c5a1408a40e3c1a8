//! Repository lifecycle events and their listeners

use std::fmt;
use std::path::Path;

use crate::artifact::{Artifact, Metadata};
use crate::repository::RemoteRepository;
use crate::trace::RequestTrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ArtifactResolving,
    ArtifactResolved,
    ArtifactDownloading,
    ArtifactDownloaded,
    ArtifactInstalling,
    ArtifactInstalled,
    MetadataResolving,
    MetadataResolved,
    MetadataDownloading,
    MetadataDownloaded,
    MetadataInstalling,
    MetadataInstalled,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ArtifactResolving => "artifact-resolving",
            EventKind::ArtifactResolved => "artifact-resolved",
            EventKind::ArtifactDownloading => "artifact-downloading",
            EventKind::ArtifactDownloaded => "artifact-downloaded",
            EventKind::ArtifactInstalling => "artifact-installing",
            EventKind::ArtifactInstalled => "artifact-installed",
            EventKind::MetadataResolving => "metadata-resolving",
            EventKind::MetadataResolved => "metadata-resolved",
            EventKind::MetadataDownloading => "metadata-downloading",
            EventKind::MetadataDownloaded => "metadata-downloaded",
            EventKind::MetadataInstalling => "metadata-installing",
            EventKind::MetadataInstalled => "metadata-installed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lifecycle notification; everything is borrowed for the duration of the call
#[derive(Clone, Copy)]
pub struct RepositoryEvent<'a> {
    pub kind: EventKind,
    pub trace: Option<&'a RequestTrace>,
    pub artifact: Option<&'a Artifact>,
    pub metadata: Option<&'a Metadata>,
    pub file: Option<&'a Path>,
    pub repository: Option<&'a RemoteRepository>,
    pub error: Option<&'a (dyn std::error::Error + Send + Sync + 'static)>,
}

impl<'a> RepositoryEvent<'a> {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            trace: None,
            artifact: None,
            metadata: None,
            file: None,
            repository: None,
            error: None,
        }
    }

    pub fn artifact(kind: EventKind, artifact: &'a Artifact) -> Self {
        Self {
            artifact: Some(artifact),
            ..Self::new(kind)
        }
    }

    pub fn metadata(kind: EventKind, metadata: &'a Metadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::new(kind)
        }
    }

    pub fn with_trace(mut self, trace: Option<&'a RequestTrace>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_file(mut self, file: &'a Path) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_repository(mut self, repository: Option<&'a RemoteRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_error(mut self, error: Option<&'a (dyn std::error::Error + Send + Sync + 'static)>) -> Self {
        self.error = error;
        self
    }
}

impl fmt::Debug for RepositoryEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryEvent")
            .field("kind", &self.kind)
            .field("artifact", &self.artifact.map(ToString::to_string))
            .field("metadata", &self.metadata.map(ToString::to_string))
            .field("file", &self.file)
            .field("repository", &self.repository.map(RemoteRepository::id))
            .field("error", &self.error.map(ToString::to_string))
            .finish()
    }
}

/// Receives repository events synchronously, in emission order
pub trait RepositoryListener: Send + Sync {
    fn on_event(&self, event: &RepositoryEvent<'_>);
}

impl<F> RepositoryListener for F
where
    F: Fn(&RepositoryEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &RepositoryEvent<'_>) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl RepositoryListener for NoopListener {
    fn on_event(&self, _event: &RepositoryEvent<'_>) {}
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl RepositoryListener for TracingListener {
    fn on_event(&self, event: &RepositoryEvent<'_>) {
        let subject = match (event.artifact, event.metadata) {
            (Some(artifact), _) => artifact.to_string(),
            (None, Some(metadata)) => metadata.to_string(),
            (None, None) => String::new(),
        };
        let repository = event.repository.map(RemoteRepository::id).unwrap_or("local");
        match event.error {
            Some(error) => tracing::warn!(
                kind = %event.kind,
                %subject,
                repository,
                error = %error,
                "repository operation failed"
            ),
            None => tracing::debug!(kind = %event.kind, %subject, repository, "repository event"),
        }
    }
}
