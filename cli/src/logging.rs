use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "depot=info,depot_core=info";
const VERBOSE_FILTER: &str = "depot=debug,depot_core=debug";

/// Initialize logging for the depot CLI
///
/// Logs are written to `<data dir>/depot/logs/depot.log.YYYY-MM-DD`, rotated
/// daily, and echoed to stderr. `RUST_LOG` takes precedence over the default
/// filter; `verbose` raises the default to debug.
pub fn init(verbose: bool) -> Result<()> {
    let log_dir = get_log_dir()?;

    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "depot.log");

    let default_filter = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // stderr stays quiet below warn unless verbose
    let stderr_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr.with_max_level(stderr_level))
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!("Logging initialized to {}", log_dir.display());

    Ok(())
}

/// Log directory under the platform data dir
pub fn get_log_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .context("Failed to determine data directory (XDG_DATA_HOME or platform equivalent)")?;

    Ok(data_dir.join("depot").join("logs"))
}
