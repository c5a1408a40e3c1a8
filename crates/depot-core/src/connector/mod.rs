//! Pluggable repository access
//!
//! A repository is reached through a [`RepositoryConnector`], which the
//! [`BasicConnectorFactory`] composes from a [`RepositoryLayout`] (where things
//! live) and a [`Transporter`] (how bytes move). Each capability has a set of
//! factories; a [`ComponentProvider`] ranks them with
//! [`PrioritizedComponents`] on every request and asks the enabled ones in
//! order until one accepts the repository.

mod basic;
mod file;

use std::path::Path;
use std::sync::Arc;

use crate::artifact::{Artifact, Metadata};
use crate::config::ConfigProperties;
use crate::error::{Declined, NoComponentAvailable, TransferError};
use crate::layout::RepositoryLayout;
use crate::priority::{ComponentType, PrioritizedComponents};
use crate::repository::RemoteRepository;
use crate::session::ValidSession;

pub use basic::{BasicConnector, BasicConnectorFactory, DefaultLayoutFactory};
pub use file::{FileTransporter, FileTransporterFactory};

/// Identity and default rank of a pluggable factory
pub trait Pluggable: Send + Sync {
    fn component_type(&self) -> ComponentType;

    /// Default priority; may be overridden through `depot.priority.<Type>`
    fn priority(&self) -> f32 {
        0.0
    }
}

/// Moves resources addressed by repository-relative location
pub trait Transporter: Send + Sync {
    /// Fetch `resource` into the file `target`
    fn get(&self, resource: &str, target: &Path) -> Result<(), TransferError>;

    /// Check that `resource` exists without fetching it
    fn peek(&self, resource: &str) -> Result<(), TransferError>;
}

pub trait TransporterFactory: Pluggable {
    fn new_transporter(
        &self,
        session: &ValidSession<'_>,
        repository: &RemoteRepository,
    ) -> Result<Box<dyn Transporter>, Declined>;
}

pub trait RepositoryLayoutFactory: Pluggable {
    fn new_layout(
        &self,
        session: &ValidSession<'_>,
        repository: &RemoteRepository,
    ) -> Result<Box<dyn RepositoryLayout>, Declined>;
}

/// Access to one remote repository
pub trait RepositoryConnector: Send + Sync {
    fn repository(&self) -> &RemoteRepository;

    fn get_artifact(&self, artifact: &Artifact, target: &Path) -> Result<(), TransferError>;

    fn get_metadata(&self, metadata: &Metadata, target: &Path) -> Result<(), TransferError>;
}

pub trait RepositoryConnectorFactory: Pluggable {
    fn new_connector(
        &self,
        session: &ValidSession<'_>,
        repository: &RemoteRepository,
    ) -> Result<Box<dyn RepositoryConnector>, Declined>;
}

/// The registered factories for one capability
pub struct ComponentProvider<F: ?Sized> {
    capability: &'static str,
    factories: Vec<Arc<F>>,
}

pub type TransporterProvider = ComponentProvider<dyn TransporterFactory>;
pub type LayoutProvider = ComponentProvider<dyn RepositoryLayoutFactory>;
pub type ConnectorProvider = ComponentProvider<dyn RepositoryConnectorFactory>;

impl<F: ?Sized> Clone for ComponentProvider<F> {
    fn clone(&self) -> Self {
        Self {
            capability: self.capability,
            factories: self.factories.clone(),
        }
    }
}

impl<F: ?Sized + Pluggable> std::fmt::Debug for ComponentProvider<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<&str> = self
            .factories
            .iter()
            .map(|factory| factory.component_type().simple_name())
            .collect();
        f.debug_struct("ComponentProvider")
            .field("capability", &self.capability)
            .field("factories", &types)
            .finish()
    }
}

impl<F: ?Sized + Pluggable> ComponentProvider<F> {
    pub fn new(capability: &'static str, factories: Vec<Arc<F>>) -> Self {
        Self {
            capability,
            factories,
        }
    }

    pub fn add(&mut self, factory: Arc<F>) -> &mut Self {
        self.factories.push(factory);
        self
    }

    pub fn capability(&self) -> &'static str {
        self.capability
    }

    pub fn factories(&self) -> &[Arc<F>] {
        &self.factories
    }

    /// Factories ordered by effective priority under `config`
    pub fn ranked<'a>(&'a self, config: &'a ConfigProperties) -> PrioritizedComponents<'a, &'a F> {
        let mut ranked = PrioritizedComponents::new(config);
        for factory in &self.factories {
            ranked.add(factory.as_ref(), factory.component_type(), factory.priority());
        }
        ranked
    }

    /// First product of the enabled factories, in rank order, that accepts `repository`
    fn select<T>(
        &self,
        session: &ValidSession<'_>,
        repository: &RemoteRepository,
        mut create: impl FnMut(&F) -> Result<T, Declined>,
    ) -> Result<T, NoComponentAvailable> {
        let ranked = self.ranked(session.config());
        let mut reasons = Vec::new();
        for candidate in ranked.enabled() {
            match create(*candidate.component()) {
                Ok(product) => {
                    tracing::debug!(
                        capability = self.capability,
                        repository = repository.id(),
                        component = candidate.component_type().simple_name(),
                        priority = candidate.priority(),
                        "selected component"
                    );
                    return Ok(product);
                }
                Err(declined) => {
                    reasons.push(format!("{}: {declined}", candidate.component_type()));
                }
            }
        }
        Err(NoComponentAvailable::new(self.capability, ranked.list())
            .for_repository(repository.id())
            .with_reasons(reasons))
    }
}

impl TransporterProvider {
    pub fn transporters(factories: Vec<Arc<dyn TransporterFactory>>) -> Self {
        Self::new("transporter", factories)
    }

    pub fn new_transporter(
        &self,
        session: &ValidSession<'_>,
        repository: &RemoteRepository,
    ) -> Result<Box<dyn Transporter>, NoComponentAvailable> {
        self.select(session, repository, |f| f.new_transporter(session, repository))
    }
}

impl LayoutProvider {
    pub fn layouts(factories: Vec<Arc<dyn RepositoryLayoutFactory>>) -> Self {
        Self::new("repository layout", factories)
    }

    pub fn new_layout(
        &self,
        session: &ValidSession<'_>,
        repository: &RemoteRepository,
    ) -> Result<Box<dyn RepositoryLayout>, NoComponentAvailable> {
        self.select(session, repository, |f| f.new_layout(session, repository))
    }
}

impl ConnectorProvider {
    pub fn connectors(factories: Vec<Arc<dyn RepositoryConnectorFactory>>) -> Self {
        Self::new("repository connector", factories)
    }

    /// The built-in stack: a basic connector over the default layout and file transport
    pub fn with_defaults() -> Self {
        let transporters = TransporterProvider::transporters(vec![Arc::new(FileTransporterFactory)]);
        let layouts = LayoutProvider::layouts(vec![Arc::new(DefaultLayoutFactory)]);
        Self::connectors(vec![Arc::new(BasicConnectorFactory::new(transporters, layouts))])
    }

    pub fn new_connector(
        &self,
        session: &ValidSession<'_>,
        repository: &RemoteRepository,
    ) -> Result<Box<dyn RepositoryConnector>, NoComponentAvailable> {
        self.select(session, repository, |f| f.new_connector(session, repository))
    }
}
