//! Artifact and metadata coordinates

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidCoordinates;

pub const SNAPSHOT: &str = "SNAPSHOT";

/// A versioned file identified by `group:artifact:extension[:classifier]:version`
///
/// Artifacts are values: attaching a file or changing the version yields a new
/// instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    group_id: String,
    artifact_id: String,
    extension: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    classifier: String,
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<PathBuf>,
}

impl Artifact {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        extension: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            extension: extension.into(),
            classifier: String::new(),
            version: version.into(),
            file: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = classifier.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn without_file(mut self) -> Self {
        self.file = None;
        self
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn is_snapshot(&self) -> bool {
        is_snapshot_version(&self.version)
    }

    /// Version with a timestamped snapshot suffix collapsed to `SNAPSHOT`
    pub fn base_version(&self) -> String {
        base_version(&self.version)
    }

    /// Coordinates without the version, used as a conflict key
    pub fn versionless_key(&self) -> String {
        if self.classifier.is_empty() {
            format!("{}:{}:{}", self.group_id, self.artifact_id, self.extension)
        } else {
            format!(
                "{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.extension, self.classifier
            )
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.versionless_key(), self.version)
    }
}

impl FromStr for Artifact {
    type Err = InvalidCoordinates;

    /// Parse `group:artifact[:extension[:classifier]]:version`; the extension defaults to `jar`
    fn from_str(coords: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = coords.split(':').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(InvalidCoordinates(coords.to_string()));
        }
        match parts.as_slice() {
            [group, artifact, version] => Ok(Artifact::new(*group, *artifact, "jar", *version)),
            [group, artifact, extension, version] => {
                Ok(Artifact::new(*group, *artifact, *extension, *version))
            }
            [group, artifact, extension, classifier, version] => {
                Ok(Artifact::new(*group, *artifact, *extension, *version).with_classifier(*classifier))
            }
            _ => Err(InvalidCoordinates(coords.to_string())),
        }
    }
}

pub fn is_snapshot_version(version: &str) -> bool {
    version.ends_with(SNAPSHOT) || timestamp_suffix_start(version).is_some()
}

pub fn base_version(version: &str) -> String {
    match timestamp_suffix_start(version) {
        Some(start) => format!("{}-{SNAPSHOT}", &version[..start]),
        None => version.to_string(),
    }
}

/// Byte offset of a `-yyyyMMdd.HHmmss-build` suffix
fn timestamp_suffix_start(version: &str) -> Option<usize> {
    let (rest, build) = version.rsplit_once('-')?;
    if build.is_empty() || !build.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (head, stamp) = rest.rsplit_once('-')?;
    let (date, time) = stamp.split_once('.')?;
    let digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());
    if digits(date, 8) && digits(time, 6) && !head.is_empty() {
        Some(head.len())
    } else {
        None
    }
}

/// Which kind of versions a metadata file describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nature {
    Release,
    Snapshot,
    #[default]
    ReleaseOrSnapshot,
}

/// A repository index file, e.g. `maven-metadata.xml`, at group, artifact or version level
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Metadata {
    group_id: String,
    artifact_id: String,
    version: String,
    kind: String,
    nature: Nature,
    file: Option<PathBuf>,
}

impl Metadata {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        nature: Nature,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            kind: kind.into(),
            nature,
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// File name of the metadata, e.g. `maven-metadata.xml`
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn nature(&self) -> Nature {
        self.nature
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coords: Vec<&str> = [
            self.group_id.as_str(),
            self.artifact_id.as_str(),
            self.version.as_str(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
        if coords.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}/{}", coords.join(":"), self.kind)
        }
    }
}

/// Packaging defaults for an artifact type id such as `test-jar`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactType {
    pub id: String,
    pub extension: String,
    pub classifier: String,
}

impl ArtifactType {
    pub fn new(id: &str, extension: &str, classifier: &str) -> Self {
        Self {
            id: id.to_string(),
            extension: extension.to_string(),
            classifier: classifier.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactTypeRegistry {
    types: HashMap<String, ArtifactType>,
}

impl ArtifactTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the common packaging types
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (id, extension, classifier) in [
            ("pom", "pom", ""),
            ("jar", "jar", ""),
            ("maven-plugin", "jar", ""),
            ("ejb", "jar", ""),
            ("ejb-client", "jar", "client"),
            ("test-jar", "jar", "tests"),
            ("javadoc", "jar", "javadoc"),
            ("java-source", "jar", "sources"),
            ("war", "war", ""),
            ("ear", "ear", ""),
            ("rar", "rar", ""),
        ] {
            registry.add(ArtifactType::new(id, extension, classifier));
        }
        registry
    }

    pub fn add(&mut self, artifact_type: ArtifactType) -> &mut Self {
        self.types.insert(artifact_type.id.clone(), artifact_type);
        self
    }

    pub fn get(&self, id: &str) -> Option<&ArtifactType> {
        self.types.get(id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Rewrite an artifact whose extension names a registered type id
    ///
    /// `g:a:test-jar:1.0` becomes `g:a:jar:tests:1.0`. An explicit classifier
    /// is kept.
    pub fn apply(&self, artifact: Artifact) -> Artifact {
        match self.types.get(artifact.extension()) {
            Some(ty) if ty.extension != artifact.extension() || !ty.classifier.is_empty() => {
                let classifier = if artifact.classifier().is_empty() {
                    ty.classifier.clone()
                } else {
                    artifact.classifier().to_string()
                };
                artifact
                    .with_extension(ty.extension.clone())
                    .with_classifier(classifier)
            }
            _ => artifact,
        }
    }
}
