// Use modules from the library crate
use depot::commands::{self, Workspace};
use depot::{config, logging};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "depot",
    about = "Resolve, inspect and install artifacts from Maven-style repositories",
    version
)]
struct Cli {
    /// Config file (defaults to ~/.config/depot/config.toml)
    #[arg(long, global = true, env = config::paths::CONFIG_ENV, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug output on stderr and in the log file
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the repositories requests will use
    ///
    /// Mirrors, proxies and credentials from the config are applied unless
    /// --raw is given.
    ///
    /// Examples:
    ///   depot repos
    ///   depot repos --raw --json
    ///   depot repos add central https://repo.example.org/maven2
    #[command(args_conflicts_with_subcommands = true)]
    Repos {
        #[command(subcommand)]
        command: Option<ReposCommand>,

        /// Show repositories exactly as configured
        #[arg(long)]
        raw: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Collect and resolve the dependencies of one or more artifacts
    ///
    /// Coordinates are <groupId>:<artifactId>[:<type>[:<classifier>]]:<version>.
    /// A single artifact becomes the root of the tree; several are resolved
    /// as siblings under a virtual root.
    ///
    /// Examples:
    ///   depot resolve org.example:app:1.0
    ///   depot resolve org.example:app:1.0 org.example:tool:test-jar:2.0
    ///   depot resolve org.example:app:1.0 --scope compile --scope runtime
    Resolve {
        /// Artifact coordinates
        #[arg(required = true, value_name = "COORDS")]
        coords: Vec<String>,

        /// Only resolve nodes in these scopes
        #[arg(long = "scope", value_name = "SCOPE")]
        scopes: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Install a file into the local store
    ///
    /// Example:
    ///   depot install org.example:tool:0.1 target/tool.jar
    Install {
        /// Artifact coordinates
        coords: String,

        /// File to install
        file: PathBuf,
    },

    /// List transporters, layouts and connectors in the order they are tried
    ///
    /// Priorities can be changed in the config's [properties] table with
    /// depot.priority.<Type> keys; a NaN priority disables a component.
    Components,

    /// Show paths and configuration statistics
    Info,
}

#[derive(Subcommand)]
enum ReposCommand {
    /// Add a repository to the config
    Add {
        /// Repository id (matched by mirror_of and servers)
        id: String,

        /// Repository URL, e.g. file:///srv/repository
        url: String,

        /// Repository layout
        #[arg(long, default_value = "default")]
        layout: String,

        /// Do not resolve snapshot versions from this repository
        #[arg(long)]
        no_snapshots: bool,
    },

    /// Remove a repository from the config
    Remove {
        /// Repository id
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match cli.command {
        Command::Repos {
            command: Some(command),
            ..
        } => {
            let config_path = config::resolve_config_path(cli.config.as_deref())?;
            match command {
                ReposCommand::Add {
                    id,
                    url,
                    layout,
                    no_snapshots,
                } => commands::repos::handle_add(&config_path, &id, &url, &layout, no_snapshots),
                ReposCommand::Remove { id } => commands::repos::handle_remove(&config_path, &id),
            }
        }

        Command::Repos {
            command: None,
            raw,
            json,
        } => {
            let workspace = Workspace::load(cli.config.as_deref())?;
            commands::repos::handle_list(&workspace, raw, json)
        }

        Command::Resolve {
            coords,
            scopes,
            json,
        } => {
            let workspace = Workspace::load(cli.config.as_deref())?;
            commands::resolve::handle_resolve(&workspace, &coords, &scopes, json)
        }

        Command::Install { coords, file } => {
            let workspace = Workspace::load(cli.config.as_deref())?;
            commands::install::handle_install(&workspace, &coords, &file)
        }

        Command::Components => {
            let workspace = Workspace::load(cli.config.as_deref())?;
            commands::components::handle_components(&workspace)
        }

        Command::Info => {
            let workspace = Workspace::load(cli.config.as_deref())?;
            commands::info::handle_info(&workspace)
        }
    }
}
