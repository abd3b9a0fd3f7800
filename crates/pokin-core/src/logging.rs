use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;

use crate::db;

/// Default log file: `~/.local/share/pokin/pokin.log`.
pub fn log_path() -> Result<PathBuf> {
    Ok(db::data_dir()?.join("pokin.log"))
}

/// Parse a config log level, defaulting to INFO for unknown values.
pub fn parse_level(level: &str) -> Level {
    level.trim().parse::<Level>().unwrap_or(Level::INFO)
}

/// Install the global subscriber writing to `path`.
/// The terminal belongs to the TUI, so nothing is logged to stdout/stderr.
pub fn init(path: &Path, level: &str) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file at {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_max_level(parse_level(level))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {e}"))?;

    Ok(())
}
