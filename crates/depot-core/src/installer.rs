//! Installation of artifacts and metadata into the local store
//!
//! Items are processed artifacts first, then metadata, and the first failure
//! aborts the request. Every attempted item produces an installing/installed
//! event pair; the installed event carries the error if the item failed.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::artifact::{Artifact, Metadata};
use crate::error::{InstallFailure, InstallSubject, InstallationError};
use crate::events::{EventKind, RepositoryEvent};
use crate::session::ValidSession;
use crate::trace::RequestTrace;

#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub artifacts: Vec<Artifact>,
    pub metadata: Vec<Metadata>,
    pub trace: Option<RequestTrace>,
}

impl InstallRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn add_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.push(metadata);
        self
    }

    pub fn with_trace(mut self, trace: RequestTrace) -> Self {
        self.trace = Some(trace);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallResult {
    pub artifacts: Vec<Artifact>,
    pub metadata: Vec<Metadata>,
}

/// File operations used by the installer
pub trait FileProcessor: Send + Sync {
    /// Copy `source` onto `target`, creating parent directories and carrying over
    /// the modification time. Returns the number of bytes copied.
    fn copy(&self, source: &Path, target: &Path) -> io::Result<u64>;
}

/// Copies through a temporary file in the target directory, then renames it into place
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFileProcessor;

impl FileProcessor for DefaultFileProcessor {
    fn copy(&self, source: &Path, target: &Path) -> io::Result<u64> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(".{file_name}.{}.part", std::process::id()));

        let copied = match fs::copy(source, &temp) {
            Ok(copied) => copied,
            Err(e) => {
                let _ = fs::remove_file(&temp);
                return Err(e);
            }
        };
        let modified = fs::metadata(source)?.modified()?;
        File::options().write(true).open(&temp)?.set_modified(modified)?;

        if let Err(e) = fs::rename(&temp, target) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        Ok(copied)
    }
}

#[derive(Clone, Copy)]
enum Item<'a> {
    Artifact(&'a Artifact),
    Metadata(&'a Metadata),
}

impl<'a> Item<'a> {
    fn file(self) -> Option<&'a Path> {
        match self {
            Item::Artifact(artifact) => artifact.file(),
            Item::Metadata(metadata) => metadata.file(),
        }
    }

    fn event(self, kind: EventKind) -> RepositoryEvent<'a> {
        match self {
            Item::Artifact(artifact) => RepositoryEvent::artifact(kind, artifact),
            Item::Metadata(metadata) => RepositoryEvent::metadata(kind, metadata),
        }
    }

    fn kinds(self) -> (EventKind, EventKind) {
        match self {
            Item::Artifact(_) => (EventKind::ArtifactInstalling, EventKind::ArtifactInstalled),
            Item::Metadata(_) => (EventKind::MetadataInstalling, EventKind::MetadataInstalled),
        }
    }

    fn subject(self) -> InstallSubject {
        match self {
            Item::Artifact(artifact) => InstallSubject::Artifact(artifact.clone()),
            Item::Metadata(metadata) => InstallSubject::Metadata(metadata.clone()),
        }
    }
}

#[derive(Clone)]
pub struct Installer {
    processor: Arc<dyn FileProcessor>,
}

impl Default for Installer {
    fn default() -> Self {
        Self::new(Arc::new(DefaultFileProcessor))
    }
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer").finish_non_exhaustive()
    }
}

impl Installer {
    pub fn new(processor: Arc<dyn FileProcessor>) -> Self {
        Self { processor }
    }

    pub fn install(
        &self,
        session: &ValidSession<'_>,
        request: InstallRequest,
    ) -> Result<InstallResult, InstallationError> {
        let trace = RequestTrace::new_child(request.trace.as_ref(), "install");

        for artifact in &request.artifacts {
            self.install_item(session, Item::Artifact(artifact), &trace)?;
        }
        for metadata in &request.metadata {
            self.install_item(session, Item::Metadata(metadata), &trace)?;
        }

        tracing::debug!(
            artifacts = request.artifacts.len(),
            metadata = request.metadata.len(),
            "installed into {}",
            session.local_store().base_dir().display()
        );
        Ok(InstallResult {
            artifacts: request.artifacts,
            metadata: request.metadata,
        })
    }

    fn install_item(
        &self,
        session: &ValidSession<'_>,
        item: Item<'_>,
        trace: &RequestTrace,
    ) -> Result<(), InstallationError> {
        let store = session.local_store();
        let relative = match item {
            Item::Artifact(artifact) => store.path_for_artifact(artifact),
            Item::Metadata(metadata) => store.path_for_metadata(metadata),
        };
        let target = store.base_dir().join(relative);
        let (installing, installed) = item.kinds();

        session.emit(item.event(installing).with_trace(Some(trace)).with_file(&target));

        let outcome = self.install_file(item.file(), &target);
        if outcome.is_ok() {
            match item {
                Item::Artifact(artifact) => store.register_artifact(artifact, None),
                Item::Metadata(metadata) => store.register_metadata(metadata),
            }
        }
        let error = outcome.err().map(|failure| InstallationError {
            subject: item.subject(),
            failure,
        });

        session.emit(
            item.event(installed)
                .with_trace(Some(trace))
                .with_file(&target)
                .with_error(error.as_ref().map(|e| e as &(dyn std::error::Error + Send + Sync + 'static))),
        );

        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Returns whether data was copied
    fn install_file(&self, source: Option<&Path>, target: &Path) -> Result<bool, InstallFailure> {
        let source = source.ok_or(InstallFailure::MissingFile)?;
        if !source.is_file() {
            return Err(InstallFailure::SourceNotFound(source.to_path_buf()));
        }
        if target.is_dir() {
            return Err(InstallFailure::TargetIsDirectory(target.to_path_buf()));
        }
        if is_same_file(source, target) {
            return Err(InstallFailure::SameFile(target.to_path_buf()));
        }

        if is_unchanged(source, target) {
            tracing::debug!(path = %target.display(), "skipped unchanged file");
            return Ok(false);
        }

        self.processor
            .copy(source, target)
            .map_err(|source_err| InstallFailure::Io {
                from: source.to_path_buf(),
                to: target.to_path_buf(),
                source: source_err,
            })?;
        Ok(true)
    }
}

fn is_same_file(source: &Path, target: &Path) -> bool {
    if source == target {
        return true;
    }
    match (source.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Same length and modification time
fn is_unchanged(source: &Path, target: &Path) -> bool {
    let (Ok(src), Ok(dst)) = (fs::metadata(source), fs::metadata(target)) else {
        return false;
    };
    if !dst.is_file() || src.len() != dst.len() {
        return false;
    }
    match (src.modified(), dst.modified()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Nature;
    use crate::local::{LocalStore, SimpleLocalStore};
    use crate::session::Session;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        source_dir: std::path::PathBuf,
        store: Arc<SimpleLocalStore>,
        events: Arc<Mutex<Vec<(EventKind, bool)>>>,
        session: Session,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let source_dir = dir.path().join("src");
        fs::create_dir_all(&source_dir).unwrap();
        let store = Arc::new(SimpleLocalStore::new(dir.path().join("store")));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let session = Session::new(store.clone()).with_listener(Arc::new(
            move |event: &RepositoryEvent<'_>| {
                sink.lock().unwrap().push((event.kind, event.error.is_some()));
            },
        ));
        Fixture {
            _dir: dir,
            source_dir,
            store,
            events,
            session,
        }
    }

    impl Fixture {
        fn file(&self, name: &str, content: &str) -> std::path::PathBuf {
            let path = self.source_dir.join(name);
            fs::write(&path, content).unwrap();
            path
        }

        fn target(&self, artifact: &Artifact) -> std::path::PathBuf {
            self.store.base_dir().join(self.store.path_for_artifact(artifact))
        }
    }

    fn artifact(file: &Path) -> Artifact {
        "org.example:lib:1.0".parse::<Artifact>().unwrap().with_file(file)
    }

    fn metadata(file: &Path) -> Metadata {
        Metadata::new("org.example", "lib", "", "maven-metadata.xml", Nature::Release).with_file(file)
    }

    #[derive(Default)]
    struct CountingProcessor {
        copies: AtomicUsize,
    }

    impl FileProcessor for CountingProcessor {
        fn copy(&self, source: &Path, target: &Path) -> io::Result<u64> {
            self.copies.fetch_add(1, Ordering::SeqCst);
            DefaultFileProcessor.copy(source, target)
        }
    }

    #[test]
    fn test_successful_install() {
        let fx = fixture();
        let a = artifact(&fx.file("lib.jar", "artifact"));
        let m = metadata(&fx.file("meta.xml", "metadata"));
        let request = InstallRequest::new().add_artifact(a.clone()).add_metadata(m.clone());

        let result = Installer::default()
            .install(&fx.session.validate().unwrap(), request)
            .unwrap();

        assert_eq!(fs::read_to_string(fx.target(&a)).unwrap(), "artifact");
        let meta_target = fx.store.base_dir().join(fx.store.path_for_metadata(&m));
        assert_eq!(fs::read_to_string(meta_target).unwrap(), "metadata");
        assert_eq!(result.artifacts, vec![a.clone()]);
        assert_eq!(result.metadata, vec![m.clone()]);
        assert_eq!(fx.store.registered_artifacts()[0].artifact, a);
        assert_eq!(fx.store.registered_metadata(), vec![m]);
        assert_eq!(
            *fx.events.lock().unwrap(),
            vec![
                (EventKind::ArtifactInstalling, false),
                (EventKind::ArtifactInstalled, false),
                (EventKind::MetadataInstalling, false),
                (EventKind::MetadataInstalled, false),
            ]
        );
    }

    #[test]
    fn test_missing_file_stops_request() {
        let fx = fixture();
        let missing = "org.example:lib:1.0".parse::<Artifact>().unwrap();
        let later = "org.example:other:1.0"
            .parse::<Artifact>()
            .unwrap()
            .with_file(fx.file("other.jar", "x"));
        let m = metadata(&fx.file("meta.xml", "metadata"));
        let request = InstallRequest::new()
            .add_artifact(missing)
            .add_artifact(later.clone())
            .add_metadata(m);

        let err = Installer::default()
            .install(&fx.session.validate().unwrap(), request)
            .unwrap_err();

        assert!(matches!(err.failure, InstallFailure::MissingFile));
        assert_eq!(
            *fx.events.lock().unwrap(),
            vec![
                (EventKind::ArtifactInstalling, false),
                (EventKind::ArtifactInstalled, true),
            ]
        );
        assert!(!fx.target(&later).exists());
        assert!(fx.store.registered_artifacts().is_empty());
    }

    #[test]
    fn test_nonexistent_source() {
        let fx = fixture();
        let a = artifact(&fx.source_dir.join("missing.jar"));
        let err = Installer::default()
            .install(&fx.session.validate().unwrap(), InstallRequest::new().add_artifact(a))
            .unwrap_err();
        assert!(matches!(err.failure, InstallFailure::SourceNotFound(_)));
        assert_eq!(fx.events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_nonexistent_metadata_source() {
        let fx = fixture();
        let m = metadata(&fx.source_dir.join("missing.xml"));
        let err = Installer::default()
            .install(&fx.session.validate().unwrap(), InstallRequest::new().add_metadata(m))
            .unwrap_err();
        assert!(matches!(err.subject, InstallSubject::Metadata(_)));
        assert_eq!(
            *fx.events.lock().unwrap(),
            vec![
                (EventKind::MetadataInstalling, false),
                (EventKind::MetadataInstalled, true),
            ]
        );
    }

    #[test]
    fn test_target_is_directory() {
        let fx = fixture();
        let a = artifact(&fx.file("lib.jar", "artifact"));
        fs::create_dir_all(fx.target(&a)).unwrap();

        let err = Installer::default()
            .install(&fx.session.validate().unwrap(), InstallRequest::new().add_artifact(a))
            .unwrap_err();
        assert!(matches!(err.failure, InstallFailure::TargetIsDirectory(_)));
    }

    #[test]
    fn test_destination_equals_source() {
        let fx = fixture();
        let probe = "org.example:lib:1.0".parse::<Artifact>().unwrap();
        let target = fx.target(&probe);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "artifact").unwrap();

        let err = Installer::default()
            .install(
                &fx.session.validate().unwrap(),
                InstallRequest::new().add_artifact(probe.with_file(&target)),
            )
            .unwrap_err();
        assert!(matches!(err.failure, InstallFailure::SameFile(_)));
    }

    #[test]
    fn test_unchanged_artifact_is_not_copied_again() {
        let fx = fixture();
        let source = fx.file("lib.jar", "artifact");
        let past = SystemTime::now() - Duration::from_secs(3600);
        File::options().write(true).open(&source).unwrap().set_modified(past).unwrap();

        let processor = Arc::new(CountingProcessor::default());
        let installer = Installer::new(processor.clone());
        let a = artifact(&source);
        let session = fx.session.validate().unwrap();

        installer.install(&session, InstallRequest::new().add_artifact(a.clone())).unwrap();
        let target = fx.target(&a);
        assert_eq!(fs::metadata(&target).unwrap().modified().unwrap(), past);

        installer.install(&session, InstallRequest::new().add_artifact(a)).unwrap();
        assert_eq!(processor.copies.load(Ordering::SeqCst), 1);
        assert_eq!(fs::metadata(&target).unwrap().modified().unwrap(), past);
        assert_eq!(fx.events.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_changed_source_is_copied() {
        let fx = fixture();
        let source = fx.file("lib.jar", "v1");
        let processor = Arc::new(CountingProcessor::default());
        let installer = Installer::new(processor.clone());
        let session = fx.session.validate().unwrap();

        installer.install(&session, InstallRequest::new().add_artifact(artifact(&source))).unwrap();
        fs::write(&source, "version two").unwrap();
        installer.install(&session, InstallRequest::new().add_artifact(artifact(&source))).unwrap();

        assert_eq!(processor.copies.load(Ordering::SeqCst), 2);
        assert_eq!(fs::read_to_string(fx.target(&artifact(&source))).unwrap(), "version two");
    }
}
