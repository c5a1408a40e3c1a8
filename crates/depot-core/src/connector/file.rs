use std::fs;
use std::path::{Path, PathBuf};

use super::{Pluggable, Transporter, TransporterFactory};
use crate::error::{Declined, TransferError};
use crate::priority::ComponentType;
use crate::repository::RemoteRepository;
use crate::session::ValidSession;

/// Serves `file:` repositories from a local directory tree
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransporterFactory;

impl Pluggable for FileTransporterFactory {
    fn component_type(&self) -> ComponentType {
        ComponentType::new("depot_core::connector::FileTransporterFactory")
    }

    fn priority(&self) -> f32 {
        1.0
    }
}

impl TransporterFactory for FileTransporterFactory {
    fn new_transporter(
        &self,
        _session: &ValidSession<'_>,
        repository: &RemoteRepository,
    ) -> Result<Box<dyn Transporter>, Declined> {
        if repository.protocol() != "file" {
            return Err(Declined::new(format!(
                "unsupported protocol '{}'",
                repository.protocol()
            )));
        }
        Ok(Box::new(FileTransporter::new(repository)))
    }
}

#[derive(Debug, Clone)]
pub struct FileTransporter {
    repository_id: String,
    base_dir: PathBuf,
}

impl FileTransporter {
    pub fn new(repository: &RemoteRepository) -> Self {
        Self {
            repository_id: repository.id().to_string(),
            base_dir: base_dir(repository.url()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn source(&self, resource: &str) -> PathBuf {
        self.base_dir.join(resource.trim_start_matches('/'))
    }

    fn not_found(&self, resource: &str) -> TransferError {
        TransferError::NotFound {
            resource: resource.to_string(),
            repository: self.repository_id.clone(),
        }
    }
}

impl Transporter for FileTransporter {
    fn get(&self, resource: &str, target: &Path) -> Result<(), TransferError> {
        let source = self.source(resource);
        if !source.is_file() {
            return Err(self.not_found(resource));
        }
        let io_error = |source| TransferError::Io {
            resource: resource.to_string(),
            source,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::copy(&source, target).map_err(io_error)?;
        tracing::trace!(resource, repository = %self.repository_id, "fetched");
        Ok(())
    }

    fn peek(&self, resource: &str) -> Result<(), TransferError> {
        if self.source(resource).is_file() {
            Ok(())
        } else {
            Err(self.not_found(resource))
        }
    }
}

/// Directory addressed by a `file:` URL
fn base_dir(url: &str) -> PathBuf {
    let path = url.strip_prefix("file:").unwrap_or(url);
    let path = match path.strip_prefix("//") {
        Some(rest) if rest.starts_with('/') => rest,
        Some(rest) => rest.split_once('/').map_or("", |(_host, p)| p),
        None => path,
    };
    let path = if path.is_empty() { "." } else { path };
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::SimpleLocalStore;
    use crate::session::Session;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_base_dir_from_url() {
        assert_eq!(base_dir("file:///var/repo"), PathBuf::from("/var/repo"));
        assert_eq!(base_dir("file:relative/repo"), PathBuf::from("relative/repo"));
        assert_eq!(base_dir("file://localhost/var/repo"), PathBuf::from("var/repo"));
    }

    #[test]
    fn test_declines_remote_protocols() {
        let session = Session::new(Arc::new(SimpleLocalStore::new("/tmp")));
        let https = RemoteRepository::builder("central", "default", "https://repo").build();
        let err = FileTransporterFactory
            .new_transporter(&session.validate().unwrap(), &https)
            .err()
            .unwrap();
        assert_eq!(err.reason, "unsupported protocol 'https'");
    }

    #[test]
    fn test_get_and_peek() {
        let remote = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        fs::create_dir_all(remote.path().join("g/a/1")).unwrap();
        fs::write(remote.path().join("g/a/1/a-1.jar"), b"payload").unwrap();

        let url = format!("file://{}", remote.path().display());
        let repository = RemoteRepository::builder("files", "default", url).build();
        let transporter = FileTransporter::new(&repository);

        transporter.peek("g/a/1/a-1.jar").unwrap();
        let target = local.path().join("nested/a-1.jar");
        transporter.get("g/a/1/a-1.jar", &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"payload");

        let missing = transporter.get("g/a/2/a-2.jar", &target).unwrap_err();
        assert!(missing.is_not_found());
        assert!(transporter.peek("g/a/2/a-2.jar").is_err());
    }
}
