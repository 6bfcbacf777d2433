//! File-backed `tracing` setup. The terminal belongs to the interface, so log
//! output goes to a file in the config directory.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

static LOG_FILE: OnceCell<PathBuf> = OnceCell::new();

/// Installs the global subscriber. `RUST_LOG` overrides `default_filter`.
/// Repeated calls are no-ops.
pub fn init_logging(log_path: &Path, default_filter: &str) -> Result<()> {
    if LOG_FILE.get().is_some() {
        return Ok(());
    }

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    let _ = LOG_FILE.set(log_path.to_path_buf());
    Ok(())
}

pub fn log_file() -> Option<&'static Path> {
    LOG_FILE.get().map(PathBuf::as_path)
}
