//! Logging configuration for psqueelie.
//!
//! Logs go to stderr unless a log file is configured, in which case they are
//! appended to that file without ANSI colours.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes logging, writing to `log_file` when given and stderr otherwise.
pub fn init_logging(log_file: Option<&Path>) {
    match log_file {
        Some(path) => init_file_logging(path),
        None => init_stderr_logging(),
    }
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Initializes logging to a file, falling back to stderr if it cannot be opened.
pub fn init_file_logging(log_path: &Path) {
    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_stderr_logging();
            return;
        }
    }

    let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {e}");
            init_stderr_logging();
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false)
        .init();
}

/// Returns the default path for the log file.
///
/// Uses the XDG state directory on Linux (`~/.local/state/psqueelie/psqueelie.log`),
/// or falls back to the config directory on other platforms.
pub fn default_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("psqueelie").join("psqueelie.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("psqueelie").join("psqueelie.log");
    }

    std::env::temp_dir().join("psqueelie.log")
}
