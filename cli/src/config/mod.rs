//! Configuration management for depot
//!
//! - `schema` - Configuration data structures
//! - `io` - Reading, writing, and updating config files
//! - `paths` - Directory path management
//!
//! ```rust,no_run
//! use depot::config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let path = config::resolve_config_path(None)?;
//! let config = config::load_config(&path)?;
//! println!("{} repositories", config.repositories.len());
//! # Ok(())
//! # }
//! ```

pub mod io;
pub mod paths;
pub mod schema;

pub use io::{add_repository, load_config, remove_repository, resolve_config_path, save_config};
pub use paths::{get_config_path, get_default_local_store, get_depot_dir};
pub use schema::{DepotConfig, MirrorConfig, PolicyConfig, ProxyConfig, RepositoryConfig, ServerConfig};
