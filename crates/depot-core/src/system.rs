//! The repository system facade
//!
//! [`RepositorySystem`] validates the session, takes the local-store sync
//! context and then delegates to its collaborators: a dependency collector,
//! artifact and metadata resolvers, the installer and the repository manager.
//! Its main job is [`RepositorySystem::resolve_dependencies`], which combines
//! collection and artifact resolution while keeping whatever partial results
//! either step produced.

use std::sync::Arc;

use crate::aggregator::RemoteRepositoryManager;
use crate::collection::{CollectRequest, CollectResult, DependencyCollector};
use crate::connector::ConnectorProvider;
use crate::error::{DependencyResolutionError, Error, ResolutionCause, Result};
use crate::graph::{DependencyFilter, DependencyGraph};
use crate::installer::{InstallRequest, InstallResult, Installer};
use crate::repository::RemoteRepository;
use crate::resolution::{
    ArtifactRequest, ArtifactResolver, ArtifactResult, DependencyRequest, DependencyResult, MetadataRequest,
    MetadataResolver, MetadataResult,
};
use crate::resolver::{ConnectorArtifactResolver, ConnectorMetadataResolver};
use crate::session::Session;
use crate::sync::{LocalSyncContextFactory, SyncContext, SyncContextFactory};
use crate::trace::RequestTrace;

#[derive(Clone)]
pub struct RepositorySystem {
    collector: Arc<dyn DependencyCollector>,
    artifact_resolver: Arc<dyn ArtifactResolver>,
    metadata_resolver: Arc<dyn MetadataResolver>,
    installer: Arc<Installer>,
    repository_manager: RemoteRepositoryManager,
    sync_contexts: Arc<dyn SyncContextFactory>,
}

impl std::fmt::Debug for RepositorySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositorySystem")
            .field("repository_manager", &self.repository_manager)
            .finish_non_exhaustive()
    }
}

impl RepositorySystem {
    /// System around `collector` using the built-in connector stack
    pub fn new(collector: Arc<dyn DependencyCollector>) -> Self {
        Self::with_connectors(collector, ConnectorProvider::with_defaults())
    }

    /// System around `collector` whose resolvers reach repositories through `connectors`
    pub fn with_connectors(collector: Arc<dyn DependencyCollector>, connectors: ConnectorProvider) -> Self {
        let repository_manager = RemoteRepositoryManager::default();
        Self {
            collector,
            artifact_resolver: Arc::new(ConnectorArtifactResolver::new(
                connectors.clone(),
                repository_manager.clone(),
            )),
            metadata_resolver: Arc::new(ConnectorMetadataResolver::new(connectors, repository_manager.clone())),
            installer: Arc::new(Installer::default()),
            repository_manager,
            sync_contexts: Arc::new(LocalSyncContextFactory::new()),
        }
    }

    pub fn with_artifact_resolver(mut self, resolver: Arc<dyn ArtifactResolver>) -> Self {
        self.artifact_resolver = resolver;
        self
    }

    pub fn with_metadata_resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.metadata_resolver = resolver;
        self
    }

    pub fn with_installer(mut self, installer: Installer) -> Self {
        self.installer = Arc::new(installer);
        self
    }

    pub fn with_repository_manager(mut self, manager: RemoteRepositoryManager) -> Self {
        self.repository_manager = manager;
        self
    }

    pub fn with_sync_context_factory(mut self, factory: Arc<dyn SyncContextFactory>) -> Self {
        self.sync_contexts = factory;
        self
    }

    pub fn repository_manager(&self) -> &RemoteRepositoryManager {
        &self.repository_manager
    }

    /// Collect the dependency graph of `request` (unless it already carries
    /// one) and resolve the artifacts of every accepted node
    ///
    /// Resolved artifacts are written back onto their nodes. When collection
    /// or resolution fails the error still carries the partial
    /// [`DependencyResult`]; a collection failure takes precedence.
    pub fn resolve_dependencies(&self, session: &Session, request: DependencyRequest) -> Result<DependencyResult> {
        let session = session.validate()?;
        let trace = RequestTrace::new_child(request.trace.as_ref(), request.describe());
        let DependencyRequest {
            graph,
            collect_request,
            filter,
            ..
        } = request;

        let _sync = self.sync_contexts.new_context(session.local_store().base_dir(), true);

        let mut result = DependencyResult::default();
        let mut collection_error = None;
        let graph = match (graph, collect_request) {
            (Some(graph), _) => Some(graph),
            (None, Some(collect_request)) => {
                let collect_request = collect_request.with_trace(trace.child("collect"));
                let collected = match self.collector.collect_dependencies(&session, collect_request) {
                    Ok(collected) => collected,
                    Err(mut e) => {
                        tracing::warn!(error = %e, "dependency collection failed, resolving partial graph");
                        let partial = e.take_result();
                        collection_error = Some(e);
                        partial
                    }
                };
                let CollectResult { graph, cycles, errors } = collected;
                result.cycles = cycles;
                result.collect_errors = errors;
                graph
            }
            (None, None) => return Err(Error::InvalidRequest),
        };

        let mut resolution_error = None;
        if let Some(mut graph) = graph {
            let requests = artifact_requests(&graph, filter.as_deref(), &trace);
            tracing::debug!(nodes = graph.len(), requests = requests.len(), "resolving dependency artifacts");

            let artifact_results = match self.artifact_resolver.resolve_artifacts(&session, requests) {
                Ok(results) => results,
                Err(mut e) => {
                    tracing::warn!(error = %e, "artifact resolution failed");
                    let partial = e.take_results();
                    resolution_error = Some(e);
                    partial
                }
            };
            for artifact_result in artifact_results.iter().filter(|r| r.is_resolved()) {
                if let (Some(node), Some(artifact)) = (artifact_result.request().node(), artifact_result.artifact()) {
                    graph.set_resolved(node, artifact.clone());
                }
            }
            result.graph = Some(graph);
            result.artifact_results = artifact_results;
        }

        let cause = match (collection_error, resolution_error) {
            (Some(e), _) => ResolutionCause::Collection(e),
            (None, Some(e)) => ResolutionCause::ArtifactResolution(e),
            (None, None) => return Ok(result),
        };
        Err(DependencyResolutionError::new(cause, result).into())
    }

    pub fn collect_dependencies(&self, session: &Session, request: CollectRequest) -> Result<CollectResult> {
        let session = session.validate()?;
        Ok(self.collector.collect_dependencies(&session, request)?)
    }

    pub fn resolve_artifact(&self, session: &Session, request: ArtifactRequest) -> Result<ArtifactResult> {
        self.resolve_artifacts(session, vec![request])?
            .into_iter()
            .next()
            .ok_or(Error::InvalidRequest)
    }

    pub fn resolve_artifacts(&self, session: &Session, requests: Vec<ArtifactRequest>) -> Result<Vec<ArtifactResult>> {
        let session = session.validate()?;
        let _sync = self.sync_contexts.new_context(session.local_store().base_dir(), true);
        Ok(self.artifact_resolver.resolve_artifacts(&session, requests)?)
    }

    pub fn resolve_metadata(&self, session: &Session, requests: Vec<MetadataRequest>) -> Result<Vec<MetadataResult>> {
        let session = session.validate()?;
        let _sync = self.sync_contexts.new_context(session.local_store().base_dir(), true);
        Ok(self.metadata_resolver.resolve_metadata(&session, requests))
    }

    /// Install under an exclusive lock on the local store
    pub fn install(&self, session: &Session, request: InstallRequest) -> Result<InstallResult> {
        let session = session.validate()?;
        let _sync = self.sync_contexts.new_context(session.local_store().base_dir(), false);
        Ok(self.installer.install(&session, request)?)
    }

    /// `repositories` with mirrors, proxies and credentials of the session applied
    pub fn new_resolution_repositories(
        &self,
        session: &Session,
        repositories: &[RemoteRepository],
    ) -> Result<Vec<RemoteRepository>> {
        let session = session.validate()?;
        Ok(self
            .repository_manager
            .aggregate_repositories(&session, &[], repositories, true))
    }

    /// `repository` with the credentials and proxy the session selects for it
    pub fn new_deployment_repository(&self, session: &Session, repository: &RemoteRepository) -> Result<RemoteRepository> {
        let session = session.validate()?;
        Ok(repository
            .to_builder()
            .authentication(session.authentication_selector().authentication(repository))
            .proxy(session.proxy_selector().proxy(repository))
            .build())
    }

    pub fn new_sync_context(&self, session: &Session, shared: bool) -> Result<SyncContext> {
        let session = session.validate()?;
        Ok(self
            .sync_contexts
            .new_context(session.local_store().base_dir(), shared))
    }
}

/// One request per dependency node the filter accepts, in preorder
fn artifact_requests(
    graph: &DependencyGraph,
    filter: Option<&dyn DependencyFilter>,
    trace: &RequestTrace,
) -> Vec<ArtifactRequest> {
    let mut requests = Vec::new();
    graph.walk(|id, parents| {
        let node = graph.node(id);
        let Some(dependency) = node.dependency() else {
            return;
        };
        if filter.is_some_and(|filter| !filter.accept(graph, id, parents)) {
            return;
        }
        requests.push(
            ArtifactRequest::new(dependency.artifact().clone(), node.repositories().to_vec())
                .with_node(id)
                .with_request_context(node.request_context())
                .with_trace(trace.clone()),
        );
    });
    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::error::{ArtifactResolutionError, CollectionError};
    use crate::graph::{Dependency, DependencyNode, SCOPE_COMPILE, SCOPE_TEST, ScopeFilter};
    use crate::local::SimpleLocalStore;
    use crate::repository::Authentication;
    use crate::selector::DefaultAuthenticationSelector;
    use crate::session::ValidSession;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dep(coords: &str, scope: &str) -> Dependency {
        Dependency::new(coords.parse().unwrap(), scope)
    }

    fn sample_graph() -> DependencyGraph {
        let mut graph = DependencyGraph::new(DependencyNode::from_dependency(dep("g:app:1", SCOPE_COMPILE)));
        let lib = graph.add_child(graph.root(), DependencyNode::from_dependency(dep("g:lib:1", SCOPE_COMPILE)));
        graph.add_child(lib, DependencyNode::from_dependency(dep("g:util:1", SCOPE_COMPILE)));
        graph.add_child(graph.root(), DependencyNode::from_dependency(dep("g:junit:4", SCOPE_TEST)));
        graph
    }

    /// Collector returning a fixed graph, optionally failing with it as partial result
    struct FixedCollector {
        fail: bool,
        calls: AtomicUsize,
    }

    impl FixedCollector {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl DependencyCollector for FixedCollector {
        fn collect_dependencies(
            &self,
            _session: &ValidSession<'_>,
            request: CollectRequest,
        ) -> std::result::Result<CollectResult, CollectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.trace.as_ref().map(RequestTrace::data), Some("collect"));
            let mut result = CollectResult::new(sample_graph());
            if self.fail {
                result.add_error("descriptor for g:lib:1 is malformed");
            }
            result.into_outcome()
        }
    }

    /// Resolver that resolves everything except the listed artifact ids
    struct StubResolver {
        missing: Vec<&'static str>,
        requested: Mutex<Vec<String>>,
    }

    impl StubResolver {
        fn new(missing: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                missing,
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    impl ArtifactResolver for StubResolver {
        fn resolve_artifacts(
            &self,
            _session: &ValidSession<'_>,
            requests: Vec<ArtifactRequest>,
        ) -> std::result::Result<Vec<ArtifactResult>, ArtifactResolutionError> {
            let mut failed = false;
            let results: Vec<ArtifactResult> = requests
                .into_iter()
                .map(|request| {
                    self.requested.lock().unwrap().push(request.artifact().artifact_id().to_string());
                    let artifact = request.artifact().clone();
                    let mut result = ArtifactResult::new(request);
                    if self.missing.contains(&artifact.artifact_id()) {
                        failed = true;
                        result.add_error("not found");
                    } else {
                        let file = format!("/repo/{}.jar", artifact.artifact_id());
                        result.set_resolved(artifact.with_file(file), Some("stub".into()));
                    }
                    result
                })
                .collect();
            if failed {
                Err(ArtifactResolutionError::new(results))
            } else {
                Ok(results)
            }
        }
    }

    fn session() -> Session {
        Session::new(Arc::new(SimpleLocalStore::new("/tmp/depot-system")))
    }

    fn system(collector: Arc<FixedCollector>, resolver: Arc<StubResolver>) -> RepositorySystem {
        RepositorySystem::new(collector).with_artifact_resolver(resolver)
    }

    fn dependency_error(err: Error) -> DependencyResolutionError {
        match err {
            Error::DependencyResolution(err) => err,
            other => panic!("unexpected error {other}"),
        }
    }

    fn collect_request() -> DependencyRequest {
        DependencyRequest::from_collect_request(CollectRequest::new().with_root(dep("g:app:1", SCOPE_COMPILE)))
    }

    #[test]
    fn test_supplied_graph_skips_collection() {
        let collector = FixedCollector::new(false);
        let system = system(collector.clone(), StubResolver::new(vec![]));

        let result = system
            .resolve_dependencies(&session(), DependencyRequest::from_graph(sample_graph()))
            .unwrap();
        assert_eq!(collector.calls.load(Ordering::SeqCst), 0);

        let graph = result.graph.as_ref().unwrap();
        assert_eq!(graph.len(), 4);
        let root = graph.node(graph.root()).resolved().unwrap();
        assert_eq!(root.file(), Some(std::path::Path::new("/repo/app.jar")));
        assert_eq!(result.artifacts().len(), 4);
    }

    #[test]
    fn test_resolved_artifacts_are_written_back_to_their_nodes() {
        let system = system(FixedCollector::new(false), StubResolver::new(vec!["util"]));

        let err = system.resolve_dependencies(&session(), collect_request()).unwrap_err();
        let err = dependency_error(err);
        assert!(matches!(err.cause(), ResolutionCause::ArtifactResolution(_)));

        let result = err.into_result();
        let graph = result.graph.as_ref().unwrap();
        let mut unresolved = Vec::new();
        graph.walk(|id, _| {
            let node = graph.node(id);
            if node.resolved().is_none() {
                unresolved.push(node.dependency().unwrap().artifact().artifact_id().to_string());
            }
        });
        assert_eq!(unresolved, vec!["util".to_string()]);
        assert_eq!(result.unresolved().count(), 1);
    }

    #[test]
    fn test_collection_failure_takes_precedence() {
        let system = system(FixedCollector::new(true), StubResolver::new(vec!["junit"]));

        let err = system.resolve_dependencies(&session(), collect_request()).unwrap_err();
        let err = dependency_error(err);
        assert!(matches!(err.cause(), ResolutionCause::Collection(_)));
        assert_eq!(err.result().collect_errors.len(), 1);
        assert_eq!(err.result().artifact_results.len(), 4);
    }

    #[test]
    fn test_collection_failure_with_successful_resolution() {
        let system = system(FixedCollector::new(true), StubResolver::new(vec![]));

        let err = system.resolve_dependencies(&session(), collect_request()).unwrap_err();
        let err = dependency_error(err);
        assert!(matches!(err.cause(), ResolutionCause::Collection(_)));
        assert!(err.to_string().contains("descriptor for g:lib:1 is malformed"));
        assert_eq!(err.result().artifacts().len(), 4);
    }

    #[test]
    fn test_filter_excludes_nodes_but_keeps_them_in_the_graph() {
        let resolver = StubResolver::new(vec![]);
        let system = system(FixedCollector::new(false), resolver.clone());

        let request = collect_request().with_filter(Arc::new(ScopeFilter::excluding([SCOPE_TEST])));
        let result = system.resolve_dependencies(&session(), request).unwrap();

        assert_eq!(*resolver.requested.lock().unwrap(), vec!["app", "lib", "util"]);
        assert_eq!(result.graph.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_request_without_graph_or_collect_request() {
        let system = system(FixedCollector::new(false), StubResolver::new(vec![]));
        let err = system
            .resolve_dependencies(&session(), DependencyRequest::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest));
    }

    #[test]
    fn test_invalid_session_is_rejected_before_any_work() {
        let collector = FixedCollector::new(false);
        let system = system(collector.clone(), StubResolver::new(vec![]));
        let mut session = session();
        session.mirror_selector = None;

        let err = system.resolve_dependencies(&session, collect_request()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid repository system session: mirror selector is not set"
        );
        assert_eq!(collector.calls.load(Ordering::SeqCst), 0);

        let err = system
            .new_resolution_repositories(&session, &[])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSession(_)));
    }

    #[test]
    fn test_deployment_repository_takes_session_credentials() {
        let system = system(FixedCollector::new(false), StubResolver::new(vec![]));
        let mut selector = DefaultAuthenticationSelector::new();
        selector.add("releases", Authentication::new("deployer", "s3cret"));
        let session = session().with_authentication_selector(Arc::new(selector));
        let target = RemoteRepository::builder("releases", "default", "https://repo.example.org/releases").build();

        let deployment = system.new_deployment_repository(&session, &target).unwrap();
        assert_eq!(deployment.authentication().map(Authentication::username), Some("deployer"));
        assert!(deployment.proxy().is_none());
    }

    #[test]
    fn test_resolve_artifact_returns_single_result() {
        let system = system(FixedCollector::new(false), StubResolver::new(vec![]));
        let artifact: Artifact = "g:lib:1".parse().unwrap();
        let result = system
            .resolve_artifact(&session(), ArtifactRequest::new(artifact, vec![]))
            .unwrap();
        assert_eq!(result.repository(), Some("stub"));
    }
}
