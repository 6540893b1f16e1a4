//! Snapshot naming and references.
//!
//! A snapshot of `notes.txt` is stored as `2024-03-01_14.05.09.notes.txt`.
//! When two different contents map to the same second a two digit sequence
//! is appended to the stamp (`2024-03-01_14.05.09_01.notes.txt`), which still
//! sorts after the unsuffixed name.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Timestamp prefix of snapshot file names; lexicographic order is chronological.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H.%M.%S";

/// Display format for timeline labels.
pub const LABEL_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";

/// Length of a formatted [`TIMESTAMP_FORMAT`] stamp.
const STAMP_LEN: usize = 19;

/// A snapshot file discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRef {
    /// Full path of the snapshot file.
    pub path: PathBuf,

    /// File name, `<stamp>.<original name>`.
    pub name: String,

    /// Modification time of the snapshot file.
    pub modified: DateTime<Utc>,
}

impl SnapshotRef {
    /// Create a reference from a path and its modification time.
    pub fn new(path: PathBuf, modified: SystemTime) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            modified: DateTime::<Utc>::from(modified),
        }
    }

    /// Human-readable label in the local time zone.
    pub fn label(&self) -> String {
        format_label(&self.modified.with_timezone(&Local))
    }
}

/// Format a timeline label for the given time.
pub fn format_label<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(LABEL_FORMAT).to_string()
}

/// Build a snapshot file name for a source file modified at `modified`.
///
/// `sequence` disambiguates snapshots landing on the same second; 0 means none.
pub fn snapshot_name(modified: SystemTime, base_name: &str, sequence: u32) -> String {
    let stamp = DateTime::<Local>::from(modified).format(TIMESTAMP_FORMAT);
    if sequence == 0 {
        format!("{stamp}.{base_name}")
    } else {
        format!("{stamp}_{sequence:02}.{base_name}")
    }
}

/// Parse the timestamp of a snapshot name belonging to `base_name`.
///
/// Returns `None` for names that are not snapshots of exactly that file,
/// e.g. snapshots of `b.a.txt` when looking for `a.txt`.
pub fn parse_snapshot_name(name: &str, base_name: &str) -> Option<NaiveDateTime> {
    let prefix = name.strip_suffix(base_name)?.strip_suffix('.')?;
    let stamp = prefix.get(..STAMP_LEN)?;
    let tail = &prefix[STAMP_LEN..];

    if !tail.is_empty() {
        let digits = tail.strip_prefix('_')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// The file name of `path` as UTF-8, if it has one.
pub fn base_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
