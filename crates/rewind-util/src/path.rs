//! Path utilities.
//!
//! This module provides utilities for working with file paths.

use std::path::{Component, Path, PathBuf};

/// Get the rewind configuration directory.
///
/// This follows XDG conventions on Linux/macOS:
/// - `$XDG_CONFIG_HOME/rewind` if set
/// - `~/.config/rewind` otherwise
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rewind"))
}

/// Get the default history root: `~/.rewind/history`.
pub fn default_history_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".rewind").join("history"))
}

/// Get the log directory path.
pub fn logs_dir() -> PathBuf {
    // macOS: ~/Library/Logs/rewind
    // Linux: ~/.local/state/rewind/logs
    // Windows: %LOCALAPPDATA%/rewind/logs

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return home.join("Library/Logs/rewind");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(state_dir) = dirs::state_dir() {
            return state_dir.join("rewind/logs");
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".local/state/rewind/logs");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(local_app) = dirs::data_local_dir() {
            return local_app.join("rewind/logs");
        }
    }

    // Fallback
    PathBuf::from(".rewind/logs")
}

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a leading tilde, or when no home directory is known,
/// are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// Check if a path is within a base directory.
pub fn is_within(path: &Path, base: &Path) -> bool {
    let canonical_path = path.canonicalize().ok();
    let canonical_base = base.canonicalize().ok();

    match (canonical_path, canonical_base) {
        (Some(p), Some(b)) => p.starts_with(&b),
        // If we can't canonicalize, do a simple prefix check
        _ => normalize(path).starts_with(normalize(base)),
    }
}

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => {
                result.push(component);
            }
        }
    }

    result
}
