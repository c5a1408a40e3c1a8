pub mod collect;
pub mod commands;
pub mod config;
pub mod logging;
pub mod system;

pub use collect::DescriptorCollector;
pub use config::DepotConfig;
