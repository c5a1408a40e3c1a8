//! Wiring a [`Session`] and [`RepositorySystem`] from a [`DepotConfig`]

use std::sync::Arc;

use anyhow::Result;
use depot_core::connector::{
    BasicConnectorFactory, ConnectorProvider, DefaultLayoutFactory, FileTransporterFactory, LayoutProvider,
    TransporterProvider,
};
use depot_core::events::TracingListener;
use depot_core::repository::{Authentication, Proxy};
use depot_core::selector::{DefaultAuthenticationSelector, DefaultMirrorSelector, DefaultProxySelector};
use depot_core::{RemoteRepository, RepositoryPolicy, RepositorySystem, Session, SimpleLocalStore};

use crate::collect::DescriptorCollector;
use crate::config::{DepotConfig, PolicyConfig, get_default_local_store};

/// The pluggable factories, kept apart so they can be listed
#[derive(Debug, Clone)]
pub struct ConnectorStack {
    pub transporters: TransporterProvider,
    pub layouts: LayoutProvider,
    pub connectors: ConnectorProvider,
}

impl ConnectorStack {
    pub fn new() -> Self {
        let transporters = TransporterProvider::transporters(vec![Arc::new(FileTransporterFactory)]);
        let layouts = LayoutProvider::layouts(vec![Arc::new(DefaultLayoutFactory)]);
        let connectors = ConnectorProvider::connectors(vec![Arc::new(BasicConnectorFactory::new(
            transporters.clone(),
            layouts.clone(),
        ))]);
        Self {
            transporters,
            layouts,
            connectors,
        }
    }
}

impl Default for ConnectorStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a session from `config`
///
/// Mirrors, proxies and servers become the session's selectors; repository
/// events are forwarded to `tracing`.
pub fn new_session(config: &DepotConfig) -> Result<Session> {
    let local_store = match &config.local_store {
        Some(path) => path.clone(),
        None => get_default_local_store()?,
    };
    tracing::debug!("Local store at {}", local_store.display());

    let mut mirrors = DefaultMirrorSelector::new();
    for mirror in &config.mirrors {
        mirrors.add(
            &mirror.id,
            &mirror.url,
            &mirror.layout,
            mirror.repository_manager,
            &mirror.mirror_of,
            &mirror.mirror_of_layouts,
        );
    }

    let mut proxies = DefaultProxySelector::new();
    for proxy in &config.proxies {
        let authentication = proxy
            .username
            .as_ref()
            .map(|username| Authentication::new(username, proxy.password.clone().unwrap_or_default()));
        proxies.add(
            Proxy::new(&proxy.protocol, &proxy.host, proxy.port).with_authentication(authentication),
            &proxy.non_proxy_hosts,
        );
    }

    let mut credentials = DefaultAuthenticationSelector::new();
    for server in &config.servers {
        credentials.add(&server.id, Authentication::new(&server.username, &server.password));
    }

    Ok(Session::new(Arc::new(SimpleLocalStore::new(local_store)))
        .with_config(config.properties.clone())
        .with_user_properties(config.user_properties.clone().into_iter().collect())
        .with_mirror_selector(Arc::new(mirrors))
        .with_proxy_selector(Arc::new(proxies))
        .with_authentication_selector(Arc::new(credentials))
        .with_listener(Arc::new(TracingListener))
        .with_checksum_policy(config.checksum_policy.clone())
        .with_update_policy(config.update_policy.clone())
        .with_offline(config.offline))
}

/// The configured repositories, before mirrors, proxies and credentials are applied
pub fn repositories(config: &DepotConfig) -> Vec<RemoteRepository> {
    config
        .repositories
        .iter()
        .map(|repository| {
            RemoteRepository::builder(&repository.id, &repository.layout, &repository.url)
                .release_policy(policy(&repository.releases))
                .snapshot_policy(policy(&repository.snapshots))
                .build()
        })
        .collect()
}

fn policy(config: &PolicyConfig) -> RepositoryPolicy {
    RepositoryPolicy::new(config.enabled, &config.update_policy, &config.checksum_policy)
}

/// Repository system over `stack`, collecting through dependency descriptors
pub fn new_system(stack: &ConnectorStack) -> RepositorySystem {
    let collector = DescriptorCollector::new(stack.connectors.clone());
    RepositorySystem::with_connectors(Arc::new(collector), stack.connectors.clone())
}
