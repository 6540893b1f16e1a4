//! Retention: per-file age-based pruning and whole-history deletion.

use crate::snapshot::SnapshotRef;
use crate::{HistoryError, HistoryResult};
use chrono::{DateTime, Duration, Utc};
use rewind_util::TimingGuard;
use std::io::ErrorKind;
use std::path::{Component, Path};
use tokio::fs;
use tracing::{debug, info, warn};

/// Wiping the history tree is reported as slow past this.
const SLOW_DELETE_ALL: std::time::Duration = std::time::Duration::from_secs(30);

/// Oldest modification time a snapshot may have and still be kept.
///
/// A window reaching past the earliest representable time keeps everything.
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(retention_days))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Delete every snapshot modified before `cutoff`.
///
/// Each snapshot is judged on its own timestamp; there is no minimum number
/// kept. Snapshots already gone are ignored; other failures are logged.
/// Returns the number of files removed.
pub async fn prune_expired(snapshots: &[SnapshotRef], cutoff: DateTime<Utc>) -> usize {
    let mut deleted = 0;

    for snapshot in snapshots.iter().filter(|s| s.modified < cutoff) {
        match fs::remove_file(&snapshot.path).await {
            Ok(()) => {
                debug!(path = %snapshot.path.display(), "Pruned expired snapshot");
                deleted += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %snapshot.path.display(), error = %e, "Failed to prune snapshot");
            }
        }
    }

    deleted
}

/// Recursively remove the whole history root.
///
/// A missing root is not an error. Returns whether anything was removed.
pub async fn delete_all(history_root: &Path) -> HistoryResult<bool> {
    if is_unsafe_root(history_root) {
        return Err(HistoryError::UnsafeRoot(history_root.to_path_buf()));
    }

    // Always report how long the wipe took.
    let _timing = TimingGuard::history("delete_all", history_root.display().to_string())
        .info_after(std::time::Duration::ZERO)
        .warn_after(SLOW_DELETE_ALL);
    match fs::remove_dir_all(history_root).await {
        Ok(()) => {
            info!(path = %history_root.display(), "Deleted all local history");
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(HistoryError::file_io(history_root, e)),
    }
}

/// Empty paths, filesystem roots and the home directory itself.
fn is_unsafe_root(path: &Path) -> bool {
    let has_normal = path.components().any(|c| matches!(c, Component::Normal(_)));
    if !has_normal {
        return true;
    }
    dirs::home_dir().is_some_and(|home| home == path)
}
