//! Logging setup using tracing.
//!
//! One subscriber is installed per process. Its filter covers the workspace
//! crates and `RUST_LOG` overrides it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose targets are raised together.
const WORKSPACE_TARGETS: &[&str] = &["rewind", "rewind_core", "rewind_history", "rewind_util"];

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a log level, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ]
        .into_iter()
        .find(|level| level.as_str().eq_ignore_ascii_case(s))
    }

    /// `EnvFilter` directives setting every workspace crate to this level.
    pub fn directives(&self) -> String {
        WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, self.as_str()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogTarget {
    /// Discard log lines.
    #[default]
    Off,
    /// Human-readable lines on stderr.
    Stderr,
    /// Append to a file, creating its directory.
    File(PathBuf),
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub target: LogTarget,
    pub level: LogLevel,
    /// Include file and line of the call site.
    pub include_location: bool,
}

/// Install the global subscriber.
///
/// Call once at startup. Returns the log file in use, if any. A file that
/// cannot be opened is reported on stderr and logging is turned off.
pub fn init(config: LogConfig) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.directives()));
    let registry = tracing_subscriber::registry().with(filter);

    match config.target {
        LogTarget::Off => {
            registry.init();
            None
        }
        LogTarget::Stderr => {
            registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .init();
            None
        }
        LogTarget::File(path) => match open_log_file(&path) {
            Ok(file) => {
                registry
                    .with(
                        fmt::layer()
                            .with_target(false)
                            .with_ansi(false)
                            .with_writer(Mutex::new(file))
                            .with_file(config.include_location)
                            .with_line_number(config.include_location),
                    )
                    .init();
                Some(path)
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {}: {e}", path.display());
                registry.init();
                None
            }
        },
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
