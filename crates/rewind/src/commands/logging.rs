//! Logging initialization.
//!
//! Logs go to a file in the platform log directory unless `--stderr` is
//! given, so command output on stdout stays clean.

use rewind_util::{LogConfig, LogLevel, LogTarget};
use std::path::PathBuf;

/// Initialize logging. Returns the log file path if logging to a file.
///
/// `--verbose` wins over the configured level; `RUST_LOG` wins over both.
pub fn init_logging(verbose: bool, stderr: bool, configured: Option<LogLevel>) -> Option<PathBuf> {
    let level = if verbose {
        LogLevel::Debug
    } else {
        configured.unwrap_or_default()
    };
    let target = if stderr {
        LogTarget::Stderr
    } else {
        LogTarget::File(get_log_dir().join("rewind.log"))
    };

    rewind_util::log::init(LogConfig {
        target,
        level,
        include_location: verbose,
    })
}

/// Get the log directory path.
pub fn get_log_dir() -> PathBuf {
    rewind_util::path::logs_dir()
}
