use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::{Artifact, Metadata};
use crate::collection::CollectResult;
use crate::resolution::{ArtifactResult, DependencyResult};

/// Error type carried inside partial results (collector sub-errors, per-artifact failures)
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error for [`crate::RepositorySystem`] operations
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    InvalidSession(#[from] InvalidSession),

    #[error("dependency node or collect request missing")]
    InvalidRequest,

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    ArtifactResolution(#[from] ArtifactResolutionError),

    #[error(transparent)]
    DependencyResolution(#[from] DependencyResolutionError),

    #[error(transparent)]
    Installation(#[from] InstallationError),

    #[error(transparent)]
    NoComponent(#[from] NoComponentAvailable),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A required session field was not set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid repository system session: {field} is not set")]
pub struct InvalidSession {
    pub field: &'static str,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "invalid artifact coordinates '{0}', expected <groupId>:<artifactId>[:<extension>[:<classifier>]]:<version>"
)]
pub struct InvalidCoordinates(pub String);

/// Dependency collection failed; the partial graph, cycles and sub-errors are retained
#[derive(Error, Debug)]
#[error("failed to collect dependencies: {message}")]
pub struct CollectionError {
    message: String,
    result: Box<CollectResult>,
}

impl CollectionError {
    pub fn new(message: impl Into<String>, result: CollectResult) -> Self {
        Self {
            message: message.into(),
            result: Box::new(result),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn result(&self) -> &CollectResult {
        &self.result
    }

    /// Take the partial result, leaving an empty one behind
    pub fn take_result(&mut self) -> CollectResult {
        std::mem::take(&mut *self.result)
    }
}

/// At least one artifact of a batch could not be resolved
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ArtifactResolutionError {
    message: String,
    results: Vec<ArtifactResult>,
}

impl ArtifactResolutionError {
    pub fn new(results: Vec<ArtifactResult>) -> Self {
        let failed: Vec<String> = results
            .iter()
            .filter(|r| !r.is_resolved())
            .map(|r| r.request().artifact().to_string())
            .collect();
        let message = match failed.as_slice() {
            [single] => format!("could not resolve artifact {single}"),
            _ => format!(
                "could not resolve {} of {} artifacts: {}",
                failed.len(),
                results.len(),
                failed.join(", ")
            ),
        };
        Self { message, results }
    }

    pub fn results(&self) -> &[ArtifactResult] {
        &self.results
    }

    pub fn take_results(&mut self) -> Vec<ArtifactResult> {
        std::mem::take(&mut self.results)
    }
}

/// Primary cause of a [`DependencyResolutionError`]
#[derive(Error, Debug)]
pub enum ResolutionCause {
    #[error(transparent)]
    Collection(CollectionError),

    #[error(transparent)]
    ArtifactResolution(ArtifactResolutionError),
}

/// Collection or artifact resolution failed; the partial result stays inspectable
#[derive(Error, Debug)]
#[error("failed to resolve dependencies: {cause}")]
pub struct DependencyResolutionError {
    #[source]
    cause: ResolutionCause,
    result: Box<DependencyResult>,
}

impl DependencyResolutionError {
    pub fn new(cause: ResolutionCause, result: DependencyResult) -> Self {
        Self {
            cause,
            result: Box::new(result),
        }
    }

    pub fn cause(&self) -> &ResolutionCause {
        &self.cause
    }

    pub fn result(&self) -> &DependencyResult {
        &self.result
    }

    pub fn into_result(self) -> DependencyResult {
        *self.result
    }
}

/// The item an install step was working on
#[derive(Debug, Clone, PartialEq)]
pub enum InstallSubject {
    Artifact(Artifact),
    Metadata(Metadata),
}

impl fmt::Display for InstallSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallSubject::Artifact(artifact) => write!(f, "artifact {artifact}"),
            InstallSubject::Metadata(metadata) => write!(f, "metadata {metadata}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum InstallFailure {
    #[error("no file attached")]
    MissingFile,

    #[error("source file {} does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("destination {} is a directory", .0.display())]
    TargetIsDirectory(PathBuf),

    #[error("source and destination are the same file {}", .0.display())]
    SameFile(PathBuf),

    #[error("failed to copy {} to {}", .from.display(), .to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Installing one artifact or metadata item failed; the rest of the request was not attempted
#[derive(Error, Debug)]
#[error("failed to install {subject}: {failure}")]
pub struct InstallationError {
    pub subject: InstallSubject,
    #[source]
    pub failure: InstallFailure,
}

/// No enabled component accepted a request for a capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoComponentAvailable {
    pub capability: &'static str,
    pub repository: Option<String>,
    pub candidates: String,
    pub reasons: Vec<String>,
}

impl NoComponentAvailable {
    pub fn new(capability: &'static str, candidates: String) -> Self {
        Self {
            capability,
            repository: None,
            candidates,
            reasons: Vec::new(),
        }
    }

    pub fn for_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_reasons(mut self, reasons: Vec<String>) -> Self {
        self.reasons = reasons;
        self
    }
}

impl fmt::Display for NoComponentAvailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no {} available", self.capability)?;
        if let Some(repository) = &self.repository {
            write!(f, " for repository {repository}")?;
        }
        if self.candidates.is_empty() {
            write!(f, ", no candidates registered")?;
        } else {
            write!(f, ", candidates: {}", self.candidates)?;
        }
        if !self.reasons.is_empty() {
            write!(f, " ({})", self.reasons.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for NoComponentAvailable {}

/// A factory refused to serve a repository
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct Declined {
    pub reason: String,
}

impl Declined {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failure to move a resource between a repository and the local store
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("{resource} was not found in {repository}")]
    NotFound { resource: String, repository: String },

    #[error("cannot access {repository} in offline mode")]
    Offline { repository: String },

    #[error("{resource} is not available from any enabled repository")]
    Unavailable { resource: String },

    #[error(transparent)]
    NoConnector(#[from] NoComponentAvailable),

    #[error("failed to transfer {resource}")]
    Io {
        resource: String,
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransferError::NotFound { .. })
    }
}
