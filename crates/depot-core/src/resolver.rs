//! Artifact and metadata resolution through repository connectors

use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregator::RemoteRepositoryManager;
use crate::artifact::{Artifact, Metadata, Nature};
use crate::connector::ConnectorProvider;
use crate::error::{ArtifactResolutionError, BoxError, TransferError};
use crate::events::{EventKind, RepositoryEvent};
use crate::repository::RemoteRepository;
use crate::resolution::{
    ArtifactRequest, ArtifactResolver, ArtifactResult, MetadataRequest, MetadataResolver, MetadataResult,
};
use crate::session::ValidSession;
use crate::trace::RequestTrace;

type EventError<'a> = &'a (dyn std::error::Error + Send + Sync + 'static);

/// Resolves artifacts from the local store, falling back to the request's repositories in order
#[derive(Debug, Clone)]
pub struct ConnectorArtifactResolver {
    connectors: ConnectorProvider,
    repository_manager: RemoteRepositoryManager,
}

impl ConnectorArtifactResolver {
    pub fn new(connectors: ConnectorProvider, repository_manager: RemoteRepositoryManager) -> Self {
        Self {
            connectors,
            repository_manager,
        }
    }

    pub fn connectors(&self) -> &ConnectorProvider {
        &self.connectors
    }

    fn resolve(&self, session: &ValidSession<'_>, request: ArtifactRequest) -> ArtifactResult {
        let trace = RequestTrace::new_child(request.trace(), format!("resolve {}", request.artifact()));
        let artifact = request.artifact().clone();
        session.emit(RepositoryEvent::artifact(EventKind::ArtifactResolving, &artifact).with_trace(Some(&trace)));

        let store = session.local_store();
        let mut errors: Vec<BoxError> = Vec::new();
        let mut resolved: Option<(Artifact, Option<String>)> = None;

        if let Some(path) = store.find_artifact(&artifact) {
            tracing::debug!(%artifact, path = %path.display(), "found in local store");
            resolved = Some((artifact.clone().with_file(path), None));
        } else {
            let snapshot = artifact.is_snapshot();
            for repository in request.repositories() {
                let policy = self
                    .repository_manager
                    .get_policy(session, repository, !snapshot, snapshot);
                if !policy.is_enabled() {
                    tracing::debug!(%artifact, repository = repository.id(), "repository disabled for this version");
                    continue;
                }
                match self.download(session, &artifact, repository, &trace) {
                    Ok(file) => {
                        let downloaded = artifact.clone().with_file(file);
                        store.register_artifact(&downloaded, Some(repository.id()));
                        resolved = Some((downloaded, Some(repository.id().to_string())));
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%artifact, repository = repository.id(), error = %e, "download failed");
                        errors.push(e.into());
                    }
                }
            }
            if resolved.is_none() && errors.is_empty() {
                errors.push(
                    TransferError::Unavailable {
                        resource: artifact.to_string(),
                    }
                    .into(),
                );
            }
        }

        let mut result = ArtifactResult::new(request);
        if let Some((artifact, repository)) = resolved {
            result.set_resolved(artifact, repository);
        }
        for error in errors {
            result.add_error(error);
        }

        let repository = result
            .repository()
            .and_then(|id| result.request().repositories().iter().find(|r| r.id() == id));
        let subject = result.artifact().unwrap_or(result.request().artifact());
        let mut event = RepositoryEvent::artifact(EventKind::ArtifactResolved, subject)
            .with_trace(Some(&trace))
            .with_repository(repository)
            .with_error(result.errors().first().map(|e| &**e as EventError<'_>));
        if let Some(file) = subject.file() {
            event = event.with_file(file);
        }
        session.emit(event);
        result
    }

    fn download(
        &self,
        session: &ValidSession<'_>,
        artifact: &Artifact,
        repository: &RemoteRepository,
        trace: &RequestTrace,
    ) -> Result<PathBuf, TransferError> {
        check_offline(session, repository)?;
        let connector = self.connectors.new_connector(session, repository)?;
        let store = session.local_store();
        let target = store.base_dir().join(store.path_for_artifact(artifact));

        session.emit(
            RepositoryEvent::artifact(EventKind::ArtifactDownloading, artifact)
                .with_trace(Some(trace))
                .with_repository(Some(repository))
                .with_file(&target),
        );
        let outcome = fetch_into(&target, &artifact.to_string(), |part| {
            connector.get_artifact(artifact, part)
        });
        session.emit(
            RepositoryEvent::artifact(EventKind::ArtifactDownloaded, artifact)
                .with_trace(Some(trace))
                .with_repository(Some(repository))
                .with_file(&target)
                .with_error(outcome.as_ref().err().map(|e| e as EventError<'_>)),
        );
        outcome.map(|()| target)
    }
}

impl ArtifactResolver for ConnectorArtifactResolver {
    fn resolve_artifacts(
        &self,
        session: &ValidSession<'_>,
        requests: Vec<ArtifactRequest>,
    ) -> Result<Vec<ArtifactResult>, ArtifactResolutionError> {
        let results: Vec<ArtifactResult> = requests
            .into_iter()
            .map(|request| self.resolve(session, request))
            .collect();
        if results.iter().all(ArtifactResult::is_resolved) {
            Ok(results)
        } else {
            Err(ArtifactResolutionError::new(results))
        }
    }
}

/// Resolves metadata from the local store or, per request, from one remote repository
///
/// Remote metadata is cached per repository and refreshed according to the
/// repository's update policy.
#[derive(Debug, Clone)]
pub struct ConnectorMetadataResolver {
    connectors: ConnectorProvider,
    repository_manager: RemoteRepositoryManager,
}

impl ConnectorMetadataResolver {
    pub fn new(connectors: ConnectorProvider, repository_manager: RemoteRepositoryManager) -> Self {
        Self {
            connectors,
            repository_manager,
        }
    }

    fn resolve(&self, session: &ValidSession<'_>, request: MetadataRequest) -> MetadataResult {
        let trace = RequestTrace::new_child(request.trace(), format!("resolve {}", request.metadata()));
        let metadata = request.metadata().clone();
        session.emit(RepositoryEvent::metadata(EventKind::MetadataResolving, &metadata).with_trace(Some(&trace)));

        let outcome = match request.repository() {
            None => Ok(session.local_store().find_metadata(&metadata)),
            Some(repository) => self.fetch(session, &metadata, repository, &trace),
        };

        let mut result = MetadataResult::new(request);
        match outcome {
            Ok(Some(file)) => result.set_resolved(metadata.with_file(file)),
            Ok(None) => {}
            Err(e) => result.set_error(e),
        }

        let subject = result.metadata().unwrap_or(result.request().metadata());
        session.emit(
            RepositoryEvent::metadata(EventKind::MetadataResolved, subject)
                .with_trace(Some(&trace))
                .with_repository(result.request().repository())
                .with_error(result.error().map(|e| &**e as EventError<'_>)),
        );
        result
    }

    /// The cached copy if still fresh, otherwise a new download; `None` if nothing is available
    fn fetch(
        &self,
        session: &ValidSession<'_>,
        metadata: &Metadata,
        repository: &RemoteRepository,
        trace: &RequestTrace,
    ) -> Result<Option<PathBuf>, TransferError> {
        let store = session.local_store();
        let target = store
            .base_dir()
            .join(store.path_for_remote_metadata(metadata, repository.id()));
        let cached = target.is_file().then(|| target.clone());

        let (releases, snapshots) = match metadata.nature() {
            Nature::Release => (true, false),
            Nature::Snapshot => (false, true),
            Nature::ReleaseOrSnapshot => (true, true),
        };
        let policy = self
            .repository_manager
            .get_policy(session, repository, releases, snapshots);
        if !policy.is_enabled() {
            return Ok(cached);
        }

        let last_checked = fs::metadata(&target).and_then(|m| m.modified()).ok();
        let analyzer = self.repository_manager.update_policy_analyzer();
        if !analyzer.is_update_required(session, last_checked, policy.update_policy()) {
            tracing::debug!(%metadata, repository = repository.id(), "cached metadata is up to date");
            return Ok(cached);
        }

        let downloaded = check_offline(session, repository)
            .and_then(|()| self.download(session, metadata, repository, &target, trace));
        match downloaded {
            Ok(()) => {
                store.register_metadata(&metadata.clone().with_file(&target));
                Ok(Some(target))
            }
            Err(e) if cached.is_some() => {
                tracing::warn!(%metadata, repository = repository.id(), error = %e, "using stale cached metadata");
                Ok(cached)
            }
            Err(e) => Err(e),
        }
    }

    fn download(
        &self,
        session: &ValidSession<'_>,
        metadata: &Metadata,
        repository: &RemoteRepository,
        target: &Path,
        trace: &RequestTrace,
    ) -> Result<(), TransferError> {
        let connector = self.connectors.new_connector(session, repository)?;
        session.emit(
            RepositoryEvent::metadata(EventKind::MetadataDownloading, metadata)
                .with_trace(Some(trace))
                .with_repository(Some(repository))
                .with_file(target),
        );
        let outcome = fetch_into(target, &metadata.to_string(), |part| {
            connector.get_metadata(metadata, part)
        });
        session.emit(
            RepositoryEvent::metadata(EventKind::MetadataDownloaded, metadata)
                .with_trace(Some(trace))
                .with_repository(Some(repository))
                .with_file(target)
                .with_error(outcome.as_ref().err().map(|e| e as EventError<'_>)),
        );
        outcome
    }
}

impl MetadataResolver for ConnectorMetadataResolver {
    fn resolve_metadata(&self, session: &ValidSession<'_>, requests: Vec<MetadataRequest>) -> Vec<MetadataResult> {
        requests
            .into_iter()
            .map(|request| self.resolve(session, request))
            .collect()
    }
}

/// Offline sessions may still read `file:` repositories
fn check_offline(session: &ValidSession<'_>, repository: &RemoteRepository) -> Result<(), TransferError> {
    if session.is_offline() && repository.protocol() != "file" {
        return Err(TransferError::Offline {
            repository: repository.id().to_string(),
        });
    }
    Ok(())
}

/// Run `get` against a sibling `.part` file and move it into place once complete
fn fetch_into(
    target: &Path,
    resource: &str,
    get: impl FnOnce(&Path) -> Result<(), TransferError>,
) -> Result<(), TransferError> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let part = target.with_file_name(format!(".{name}.{}.part", std::process::id()));

    let outcome = get(&part).and_then(|()| {
        fs::rename(&part, target).map_err(|source| TransferError::Io {
            resource: resource.to_string(),
            source,
        })
    });
    if outcome.is_err() {
        let _ = fs::remove_file(&part);
    }
    outcome
}
