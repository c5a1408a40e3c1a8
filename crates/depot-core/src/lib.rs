//! Dependency resolution against artifact repositories
//!
//! The entry point is [`RepositorySystem`]: given a [`Session`] it collects a
//! dependency graph, resolves the artifacts of its nodes through pluggable
//! repository connectors and installs artifacts into a local store.

pub mod aggregator;
pub mod artifact;
pub mod collection;
pub mod config;
pub mod connector;
pub mod error;
pub mod events;
pub mod graph;
pub mod installer;
pub mod layout;
pub mod local;
pub mod priority;
pub mod repository;
pub mod resolution;
pub mod resolver;
pub mod selector;
pub mod session;
pub mod sync;
pub mod system;
pub mod trace;

pub use aggregator::RemoteRepositoryManager;
pub use artifact::{Artifact, Metadata, Nature};
pub use collection::{CollectRequest, CollectResult, DependencyCollector};
pub use config::{ConfigProperties, ConfigValue};
pub use error::{Error, Result};
pub use events::{EventKind, RepositoryEvent, RepositoryListener};
pub use graph::{Dependency, DependencyGraph, DependencyNode, NodeId};
pub use installer::{InstallRequest, InstallResult, Installer};
pub use local::{LocalStore, SimpleLocalStore};
pub use repository::{RemoteRepository, RepositoryPolicy};
pub use resolution::{ArtifactRequest, ArtifactResult, DependencyRequest, DependencyResult};
pub use session::{Session, ValidSession};
pub use system::RepositorySystem;
pub use trace::RequestTrace;
