use std::path::Path;

use super::{
    LayoutProvider, Pluggable, RepositoryConnector, RepositoryConnectorFactory, RepositoryLayoutFactory,
    Transporter, TransporterProvider,
};
use crate::artifact::{Artifact, Metadata};
use crate::error::{Declined, TransferError};
use crate::layout::{DEFAULT_CONTENT_TYPE, DefaultLayout, RepositoryLayout};
use crate::priority::ComponentType;
use crate::repository::RemoteRepository;
use crate::session::ValidSession;

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLayoutFactory;

impl Pluggable for DefaultLayoutFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::new("depot_core::connector::DefaultLayoutFactory")
    }
}

impl RepositoryLayoutFactory for DefaultLayoutFactory {
    fn new_layout(
        &self,
        _session: &ValidSession<'_>,
        repository: &RemoteRepository,
    ) -> Result<Box<dyn RepositoryLayout>, Declined> {
        if repository.content_type() != DEFAULT_CONTENT_TYPE {
            return Err(Declined::new(format!(
                "unsupported content type '{}'",
                repository.content_type()
            )));
        }
        Ok(Box::new(DefaultLayout))
    }
}

/// Connector built from the best available layout and transporter for a repository
#[derive(Debug, Clone)]
pub struct BasicConnectorFactory {
    transporters: TransporterProvider,
    layouts: LayoutProvider,
}

impl BasicConnectorFactory {
    pub fn new(transporters: TransporterProvider, layouts: LayoutProvider) -> Self {
        Self {
            transporters,
            layouts,
        }
    }

    pub fn transporters(&self) -> &TransporterProvider {
        &self.transporters
    }

    pub fn layouts(&self) -> &LayoutProvider {
        &self.layouts
    }
}

impl Pluggable for BasicConnectorFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::new("depot_core::connector::BasicConnectorFactory")
    }
}

impl RepositoryConnectorFactory for BasicConnectorFactory {
    fn new_connector(
        &self,
        session: &ValidSession<'_>,
        repository: &RemoteRepository,
    ) -> Result<Box<dyn RepositoryConnector>, Declined> {
        let layout = self
            .layouts
            .new_layout(session, repository)
            .map_err(|e| Declined::new(e.to_string()))?;
        let transporter = self
            .transporters
            .new_transporter(session, repository)
            .map_err(|e| Declined::new(e.to_string()))?;
        Ok(Box::new(BasicConnector {
            repository: repository.clone(),
            layout,
            transporter,
        }))
    }
}

pub struct BasicConnector {
    repository: RemoteRepository,
    layout: Box<dyn RepositoryLayout>,
    transporter: Box<dyn Transporter>,
}

impl std::fmt::Debug for BasicConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicConnector")
            .field("repository", &self.repository.id())
            .finish_non_exhaustive()
    }
}

impl RepositoryConnector for BasicConnector {
    fn repository(&self) -> &RemoteRepository {
        &self.repository
    }

    fn get_artifact(&self, artifact: &Artifact, target: &Path) -> Result<(), TransferError> {
        let location = self.layout.artifact_location(artifact);
        self.transporter.get(&location, target)
    }

    fn get_metadata(&self, metadata: &Metadata, target: &Path) -> Result<(), TransferError> {
        let location = self.layout.metadata_location(metadata);
        self.transporter.get(&location, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::ConnectorProvider;
    use crate::local::SimpleLocalStore;
    use crate::session::Session;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_default_stack_fetches_from_file_repository() {
        let remote = TempDir::new().unwrap();
        fs::create_dir_all(remote.path().join("org/example/lib/1.0")).unwrap();
        fs::write(remote.path().join("org/example/lib/1.0/lib-1.0.jar"), b"jar").unwrap();

        let session = Session::new(Arc::new(SimpleLocalStore::new(remote.path().join("local"))));
        let url = format!("file://{}", remote.path().display());
        let repository = RemoteRepository::builder("files", "default", url).build();
        let connector = ConnectorProvider::with_defaults()
            .new_connector(&session.validate().unwrap(), &repository)
            .unwrap();

        let target = remote.path().join("out/lib.jar");
        connector
            .get_artifact(&"org.example:lib:1.0".parse().unwrap(), &target)
            .unwrap();
        assert_eq!(fs::read(target).unwrap(), b"jar");
        assert_eq!(connector.repository().id(), "files");
    }

    #[test]
    fn test_unsupported_repository_is_reported() {
        let session = Session::new(Arc::new(SimpleLocalStore::new("/tmp")));
        let repository = RemoteRepository::builder("p2", "p2", "https://updates").build();
        let err = ConnectorProvider::with_defaults()
            .new_connector(&session.validate().unwrap(), &repository)
            .err()
            .unwrap();

        let message = err.to_string();
        assert!(message.starts_with("no repository connector available for repository p2"));
        assert!(message.contains("unsupported content type 'p2'"));
    }
}
