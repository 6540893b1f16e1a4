//! Mapping of original file paths onto the mirrored history tree.
//!
//! A file `/home/u/proj/a.txt` keeps its snapshots in
//! `<history_root>/home/u/proj/`. The root marker of the original path is
//! dropped so the remainder can be joined under the history root.

use rewind_util::path::normalize;
use std::path::{Component, Path, PathBuf};

/// Path separators accepted on Windows-style paths.
const WINDOWS_SEPARATORS: [char; 2] = ['\\', '/'];

/// Strategy for turning an absolute file path into a relative mirror path.
///
/// Chosen once per process with [`MirrorStrategy::native`]; both variants are
/// pure string/path transformations and never touch the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorStrategy {
    /// Strip the leading `/`.
    Posix,
    /// Strip UNC `\\` prefixes, verbatim `\\?\` prefixes and the drive letter.
    Windows,
}

impl MirrorStrategy {
    /// Strategy for the platform this binary was built for.
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Resolve the backup directory for `original` under `history_root`.
    pub fn resolve(&self, original: &Path, history_root: &Path) -> PathBuf {
        match self {
            Self::Posix => resolve_posix(original, history_root),
            Self::Windows => resolve_windows(original, history_root),
        }
    }
}

impl Default for MirrorStrategy {
    fn default() -> Self {
        Self::native()
    }
}

/// Resolve the backup directory with the native strategy.
pub fn resolve(original: &Path, history_root: &Path) -> PathBuf {
    MirrorStrategy::native().resolve(original, history_root)
}

fn resolve_posix(original: &Path, history_root: &Path) -> PathBuf {
    let dir = original.parent().unwrap_or(Path::new(""));
    let relative: PathBuf = normalize(dir)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    history_root.join(relative)
}

fn resolve_windows(original: &Path, history_root: &Path) -> PathBuf {
    let raw = original.to_string_lossy();
    let dir = match raw.rfind(WINDOWS_SEPARATORS) {
        Some(idx) => &raw[..idx],
        None => "",
    };

    let mut rest = dir.trim_start_matches(WINDOWS_SEPARATORS);
    // \\?\C:\x and \\.\C:\x device prefixes
    if let Some(stripped) = rest.strip_prefix("?\\").or_else(|| rest.strip_prefix(".\\")) {
        rest = stripped.strip_prefix("UNC\\").unwrap_or(stripped);
    }
    if rest.as_bytes().get(1) == Some(&b':') {
        rest = &rest[2..];
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split(WINDOWS_SEPARATORS) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut out = history_root
        .to_string_lossy()
        .trim_end_matches(WINDOWS_SEPARATORS)
        .to_string();
    for segment in segments {
        out.push('\\');
        out.push_str(segment);
    }
    PathBuf::from(out)
}
