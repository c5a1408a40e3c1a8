//! Local artifact store

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::artifact::{Artifact, Metadata};
use crate::layout;

/// Path-addressable storage for installed and downloaded files
///
/// Paths returned by `path_for_*` are relative to [`LocalStore::base_dir`].
pub trait LocalStore: Send + Sync {
    fn base_dir(&self) -> &Path;

    fn path_for_artifact(&self, artifact: &Artifact) -> PathBuf;

    fn path_for_metadata(&self, metadata: &Metadata) -> PathBuf;

    /// Location of metadata fetched from a remote repository, kept apart per repository
    fn path_for_remote_metadata(&self, metadata: &Metadata, repository_id: &str) -> PathBuf;

    /// Record that an artifact is available, with the repository it came from (`None` = installed)
    fn register_artifact(&self, artifact: &Artifact, repository: Option<&str>);

    fn register_metadata(&self, metadata: &Metadata);

    /// Absolute path of an artifact already present in the store
    fn find_artifact(&self, artifact: &Artifact) -> Option<PathBuf> {
        let path = self.base_dir().join(self.path_for_artifact(artifact));
        path.is_file().then_some(path)
    }

    fn find_metadata(&self, metadata: &Metadata) -> Option<PathBuf> {
        let path = self.base_dir().join(self.path_for_metadata(metadata));
        path.is_file().then_some(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRegistration {
    pub artifact: Artifact,
    pub repository: Option<String>,
}

/// Local store using the default repository layout with an in-memory registration ledger
#[derive(Debug)]
pub struct SimpleLocalStore {
    base_dir: PathBuf,
    artifacts: Mutex<Vec<ArtifactRegistration>>,
    metadata: Mutex<Vec<Metadata>>,
}

impl SimpleLocalStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            artifacts: Mutex::new(Vec::new()),
            metadata: Mutex::new(Vec::new()),
        }
    }

    pub fn registered_artifacts(&self) -> Vec<ArtifactRegistration> {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn registered_metadata(&self) -> Vec<Metadata> {
        self.metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LocalStore for SimpleLocalStore {
    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for_artifact(&self, artifact: &Artifact) -> PathBuf {
        PathBuf::from(layout::artifact_path(artifact))
    }

    fn path_for_metadata(&self, metadata: &Metadata) -> PathBuf {
        PathBuf::from(layout::metadata_path(metadata, metadata.kind()))
    }

    fn path_for_remote_metadata(&self, metadata: &Metadata, repository_id: &str) -> PathBuf {
        let name = match metadata.kind().rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}-{repository_id}.{ext}"),
            None => format!("{}-{repository_id}", metadata.kind()),
        };
        PathBuf::from(layout::metadata_path(metadata, &name))
    }

    fn register_artifact(&self, artifact: &Artifact, repository: Option<&str>) {
        let mut artifacts = self.artifacts.lock().unwrap_or_else(PoisonError::into_inner);
        let registration = ArtifactRegistration {
            artifact: artifact.clone(),
            repository: repository.map(str::to_string),
        };
        if !artifacts.contains(&registration) {
            artifacts.push(registration);
        }
    }

    fn register_metadata(&self, metadata: &Metadata) {
        let mut registered = self.metadata.lock().unwrap_or_else(PoisonError::into_inner);
        if !registered.contains(metadata) {
            registered.push(metadata.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Nature;
    use tempfile::TempDir;

    #[test]
    fn test_paths_are_relative() {
        let store = SimpleLocalStore::new("/var/depot");
        let artifact: Artifact = "org.example:lib:1.0".parse().unwrap();
        assert_eq!(
            store.path_for_artifact(&artifact),
            PathBuf::from("org/example/lib/1.0/lib-1.0.jar")
        );

        let metadata = Metadata::new("org.example", "lib", "", "maven-metadata.xml", Nature::Release);
        assert_eq!(
            store.path_for_remote_metadata(&metadata, "central"),
            PathBuf::from("org/example/lib/maven-metadata-central.xml")
        );
    }

    #[test]
    fn test_find_artifact() {
        let dir = TempDir::new().unwrap();
        let store = SimpleLocalStore::new(dir.path());
        let artifact: Artifact = "g:a:1".parse().unwrap();
        assert!(store.find_artifact(&artifact).is_none());

        let path = dir.path().join(store.path_for_artifact(&artifact));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"jar").unwrap();
        assert_eq!(store.find_artifact(&artifact), Some(path));
    }

    #[test]
    fn test_registration_is_deduplicated() {
        let store = SimpleLocalStore::new("/tmp");
        let artifact: Artifact = "g:a:1".parse().unwrap();
        store.register_artifact(&artifact, Some("central"));
        store.register_artifact(&artifact, Some("central"));
        store.register_artifact(&artifact, None);

        let registered = store.registered_artifacts();
        assert_eq!(registered.len(), 2);
        assert_eq!(registered[0].repository.as_deref(), Some("central"));
    }
}
