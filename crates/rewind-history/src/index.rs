//! Timeline listing for one original file.
//!
//! Nothing is persisted: every listing re-reads the backup directory, so the
//! order must be reproducible from the files alone. Entries are ordered by
//! modification time, newest first, with the file name as tie breaker.

use crate::mirror::MirrorStrategy;
use crate::snapshot::{base_name, parse_snapshot_name, SnapshotRef};
use crate::{HistoryError, HistoryResult};
use glob::Pattern;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Ordered snapshots of one original file, newest first.
#[derive(Debug, Clone)]
pub struct Timeline {
    file: PathBuf,
    backup_dir: PathBuf,
    entries: Vec<SnapshotRef>,
}

impl Timeline {
    /// The original file this timeline belongs to.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// The mirrored directory holding the snapshots.
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// All snapshots, newest first.
    pub fn entries(&self) -> &[SnapshotRef] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> Option<&SnapshotRef> {
        self.entries.first()
    }

    /// Snapshot at a timeline position (0 is newest).
    pub fn get(&self, position: usize) -> Option<&SnapshotRef> {
        self.entries.get(position)
    }

    /// Display labels, one per entry.
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(SnapshotRef::label).collect()
    }

    /// The `(older, newer)` pair for an incremental diff at `position`.
    ///
    /// The oldest entry has nothing to compare against and yields `None`.
    pub fn incremental_pair(&self, position: usize) -> Option<(&SnapshotRef, &SnapshotRef)> {
        let newer = self.entries.get(position)?;
        let older = self.entries.get(position + 1)?;
        Some((older, newer))
    }

    /// Number of positions that have an incremental diff.
    pub fn incremental_len(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }
}

/// Lists snapshots for original files under one history root.
#[derive(Debug, Clone)]
pub struct SnapshotIndex {
    history_root: PathBuf,
    mirror: MirrorStrategy,
}

impl SnapshotIndex {
    /// Create an index over `history_root` using the native mirror strategy.
    pub fn new(history_root: impl Into<PathBuf>) -> Self {
        Self {
            history_root: history_root.into(),
            mirror: MirrorStrategy::native(),
        }
    }

    /// Use a specific mirror strategy.
    pub fn with_mirror(mut self, mirror: MirrorStrategy) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn history_root(&self) -> &Path {
        &self.history_root
    }

    /// The backup directory for `file`.
    pub fn backup_dir(&self, file: &Path) -> PathBuf {
        self.mirror.resolve(file, &self.history_root)
    }

    /// List the timeline of `file`.
    ///
    /// A missing backup directory yields an empty timeline.
    pub async fn list(&self, file: &Path) -> HistoryResult<Timeline> {
        let name = base_name(file).ok_or_else(|| HistoryError::InvalidPath(file.to_path_buf()))?;
        let backup_dir = self.backup_dir(file);
        let entries = scan(&backup_dir, name).await?;
        debug!(
            path = %file.display(),
            count = entries.len(),
            "Listed snapshots"
        );
        Ok(Timeline {
            file: file.to_path_buf(),
            backup_dir,
            entries,
        })
    }
}

/// List the timeline of `file` under `history_path` with the native mirror.
pub async fn list_snapshots(file: &Path, history_path: &Path) -> HistoryResult<Timeline> {
    SnapshotIndex::new(history_path).list(file).await
}

/// Scan `backup_dir` for snapshots of `base_name`, newest first.
///
/// Files matching `*<base_name>` whose prefix is not a snapshot stamp are
/// skipped, as are files that vanish between listing and stat.
pub(crate) async fn scan(backup_dir: &Path, base_name: &str) -> HistoryResult<Vec<SnapshotRef>> {
    let mut reader = match fs::read_dir(backup_dir).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(HistoryError::file_io(backup_dir, e)),
    };

    let pattern = Pattern::new(&format!("*{}", Pattern::escape(base_name)))
        .map_err(|_| HistoryError::InvalidPath(backup_dir.join(base_name)))?;

    let mut snapshots = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| HistoryError::file_io(backup_dir, e))?
    {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !pattern.matches(name) || parse_snapshot_name(name, base_name).is_none() {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(HistoryError::file_io(entry.path(), e)),
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .map_err(|e| HistoryError::file_io(entry.path(), e))?;
        snapshots.push(SnapshotRef::new(entry.path(), modified));
    }

    snapshots.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.name.cmp(&a.name))
    });

    Ok(snapshots)
}
