//! Logging configuration for NeuroShell.
//!
//! Interactive sessions log to a file so tracing output never interleaves
//! with the prompt; script and one-shot runs log to stderr where test
//! harnesses can capture it.

use std::fs::{self, File};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// The state-directory log file (interactive mode).
    File,
    /// Stderr (script and one-shot modes).
    Stderr,
}

/// Initializes the tracing subscriber for the chosen target.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. A file target
/// that cannot be created degrades to no logging rather than polluting the
/// prompt.
pub fn init(target: LogTarget) {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt().with_env_filter(filter()).init();
        }
        LogTarget::File => {
            let log_path = log_file_path();
            if let Some(parent) = log_path.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!("Warning: Could not create log directory: {e}");
                    return;
                }
            }
            // Truncate on each run to avoid unbounded growth.
            let log_file = match File::create(&log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not create log file: {e}");
                    return;
                }
            };
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(log_file)
                .with_ansi(false)
                .init();
        }
    }
}

/// Initializes logging for interactive mode.
pub fn init_file_logging() {
    init(LogTarget::File);
}

/// Initializes logging for script and one-shot modes.
pub fn init_stderr_logging() {
    init(LogTarget::Stderr);
}

/// Returns the log file location: the XDG state directory on Linux, falling
/// back to the config directory, then the temp directory.
pub fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("neuroshell").join("neuroshell.log"))
        .unwrap_or_else(|| std::env::temp_dir().join("neuroshell.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_is_absolute() {
        assert!(log_file_path().is_absolute());
    }

    #[test]
    fn test_log_path_ends_with_log_file() {
        assert!(log_file_path().ends_with("neuroshell.log"));
    }
}
