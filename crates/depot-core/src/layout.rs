//! Path layout of artifacts and metadata inside a repository or local store

use crate::artifact::{Artifact, Metadata};

/// Content type served by [`DefaultLayout`]
pub const DEFAULT_CONTENT_TYPE: &str = "default";

/// Maps coordinates to `/`-separated locations relative to a repository root
pub trait RepositoryLayout: Send + Sync {
    fn artifact_location(&self, artifact: &Artifact) -> String;

    fn metadata_location(&self, metadata: &Metadata) -> String;
}

/// `group/as/dirs/artifact/version/artifact-version[-classifier].extension`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLayout;

impl RepositoryLayout for DefaultLayout {
    fn artifact_location(&self, artifact: &Artifact) -> String {
        artifact_path(artifact)
    }

    fn metadata_location(&self, metadata: &Metadata) -> String {
        metadata_path(metadata, metadata.kind())
    }
}

pub fn artifact_path(artifact: &Artifact) -> String {
    let mut path = String::new();
    push_group(&mut path, artifact.group_id());
    path.push_str(artifact.artifact_id());
    path.push('/');
    path.push_str(&artifact.base_version());
    path.push('/');
    path.push_str(&file_name(artifact));
    path
}

pub fn file_name(artifact: &Artifact) -> String {
    let mut name = format!("{}-{}", artifact.artifact_id(), artifact.version());
    if !artifact.classifier().is_empty() {
        name.push('-');
        name.push_str(artifact.classifier());
    }
    if !artifact.extension().is_empty() {
        name.push('.');
        name.push_str(artifact.extension());
    }
    name
}

/// Directory of a metadata file followed by `name`
pub fn metadata_path(metadata: &Metadata, name: &str) -> String {
    let mut path = String::new();
    if !metadata.group_id().is_empty() {
        push_group(&mut path, metadata.group_id());
        if !metadata.artifact_id().is_empty() {
            path.push_str(metadata.artifact_id());
            path.push('/');
            if !metadata.version().is_empty() {
                path.push_str(metadata.version());
                path.push('/');
            }
        }
    }
    path.push_str(name);
    path
}

fn push_group(path: &mut String, group_id: &str) {
    for segment in group_id.split('.').filter(|s| !s.is_empty()) {
        path.push_str(segment);
        path.push('/');
    }
}
