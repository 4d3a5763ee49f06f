//! Logging configuration for SQL Lab.
//!
//! Writes to stderr by default, or to a log file with `--log-file`.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes logging to the file at `log_path`.
///
/// The default location (see [`get_log_path`]) is `~/.local/state/sqllab/sqllab.log`
/// on Linux, or the platform-appropriate state/config directory elsewhere.
pub fn init_file_logging(log_path: &Path) -> io::Result<()> {
    let log_file = open_log_file(log_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false)
        .init();
    Ok(())
}

/// Creates the parent directory and truncates the log file.
fn open_log_file(log_path: &Path) -> io::Result<File> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(log_path)
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the path for the log file.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("sqllab").join("sqllab.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("sqllab").join("sqllab.log");
    }

    std::env::temp_dir().join("sqllab.log")
}
