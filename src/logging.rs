//! Diagnostics go to a file, never to the terminal the UI draws on.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Install a subscriber appending to `log_file`, filtered by `RUST_LOG`
/// (default `info`). Without a log file nothing is installed and events
/// are discarded.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let file_name = path
        .file_name()
        .with_context(|| format!("invalid log file path {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let appender = tracing_appender::rolling::never(dir, file_name);

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()
        .context("invalid RUST_LOG")?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(appender).with_ansi(false))
        .with(env_filter)
        .try_init()
        .context("cannot install log subscriber")?;

    Ok(())
}
