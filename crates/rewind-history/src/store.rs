//! Snapshot storage implementation.
//!
//! Snapshots are plain file copies kept in a tree that mirrors the original
//! file's directory:
//! ```text
//! history_root/
//!   home/u/proj/                       # mirror of /home/u/proj
//!     2024-03-01_14.05.09.main.rs      # snapshot of /home/u/proj/main.rs
//!     2024-03-02_09.12.44.main.rs
//!     .main.rs.<pid>.<n>.tmp            # copy in flight, renamed when complete
//! ```

use crate::index::{self, SnapshotIndex, Timeline};
use crate::mirror::MirrorStrategy;
use crate::snapshot::{base_name, snapshot_name, SnapshotRef};
use crate::sweep::{prune_expired, retention_cutoff};
use crate::{HistoryError, HistoryResult};
use chrono::Utc;
use filetime::FileTime;
use rewind_util::TimingGuard;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

/// Highest same-second sequence suffix tried before giving up.
const MAX_SEQUENCE: u32 = 99;

/// Temp files older than this are leftovers of an aborted write.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Snapshots slower than this are reported as warnings.
const SLOW_SAVE: Duration = Duration::from_secs(1);

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Size and age limits applied to every file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Files larger than this many bytes are never snapshotted.
    pub file_size_limit: u64,

    /// Snapshots older than this many days are deleted.
    pub retention_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            file_size_limit: 4 * 1024 * 1024,
            retention_days: 30,
        }
    }
}

/// What [`SnapshotStore::process_history`] did for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The file exceeds the size limit; nothing was written or pruned.
    TooLarge { size: u64, limit: u64 },

    /// The latest snapshot already has this content.
    Unchanged { latest: PathBuf },

    /// A new snapshot was written and expired ones pruned.
    Stored { snapshot: SnapshotRef, pruned: usize },
}

/// Storage for local file history.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    index: SnapshotIndex,
    policy: RetentionPolicy,
}

impl SnapshotStore {
    /// Create a store rooted at `history_root`.
    ///
    /// Nothing is created on disk until the first snapshot is written.
    pub fn new(history_root: impl Into<PathBuf>, policy: RetentionPolicy) -> Self {
        Self {
            index: SnapshotIndex::new(history_root),
            policy,
        }
    }

    /// Use a specific mirror strategy instead of the native one.
    pub fn with_mirror(mut self, mirror: MirrorStrategy) -> Self {
        self.index = self.index.with_mirror(mirror);
        self
    }

    pub fn history_root(&self) -> &Path {
        self.index.history_root()
    }

    pub fn index(&self) -> &SnapshotIndex {
        &self.index
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// List the timeline of `file`, newest first.
    pub async fn timeline(&self, file: &Path) -> HistoryResult<Timeline> {
        self.index.list(file).await
    }

    /// Take a snapshot of `file` if its content changed, then prune.
    ///
    /// Steps, each gating the next:
    /// 1. skip files larger than the size limit
    /// 2. create the mirrored backup directory
    /// 3. list existing snapshots
    /// 4. skip when the newest snapshot has identical bytes
    /// 5. copy to a temp file, stamp it with the source mtime, rename into place
    /// 6. delete listed snapshots older than the retention window
    pub async fn process_history(&self, file: &Path) -> HistoryResult<ProcessOutcome> {
        let _timing = TimingGuard::history("process", file.display().to_string())
            .warn_after(SLOW_SAVE);

        let metadata = fs::metadata(file)
            .await
            .map_err(|e| HistoryError::file_io(file, e))?;
        let size = metadata.len();
        if size > self.policy.file_size_limit {
            warn!(
                path = %file.display(),
                size,
                limit_kb = self.policy.file_size_limit / 1024,
                "Local history did not save a copy of this file because it exceeds the size limit"
            );
            return Ok(ProcessOutcome::TooLarge {
                size,
                limit: self.policy.file_size_limit,
            });
        }

        let name = base_name(file).ok_or_else(|| HistoryError::InvalidPath(file.to_path_buf()))?;
        let backup_dir = self.index.backup_dir(file);
        fs::create_dir_all(&backup_dir)
            .await
            .map_err(|e| HistoryError::file_io(&backup_dir, e))?;

        cleanup_stale_temps(&backup_dir, name).await;

        let existing = index::scan(&backup_dir, name).await?;
        if let Some(latest) = existing.first() {
            if same_content(file, size, latest).await? {
                debug!(path = %file.display(), latest = %latest.name, "No changes since last snapshot");
                return Ok(ProcessOutcome::Unchanged {
                    latest: latest.path.clone(),
                });
            }
        }

        let snapshot = write_snapshot(file, &backup_dir, name, &metadata).await?;
        let cutoff = retention_cutoff(Utc::now(), self.policy.retention_days);
        let pruned = prune_expired(&existing, cutoff).await;

        info!(
            path = %file.display(),
            snapshot = %snapshot.name,
            pruned,
            "Stored local history snapshot"
        );

        Ok(ProcessOutcome::Stored { snapshot, pruned })
    }
}

/// Compare the live file with a snapshot byte for byte.
///
/// A snapshot that vanished since listing counts as different.
async fn same_content(file: &Path, size: u64, snapshot: &SnapshotRef) -> HistoryResult<bool> {
    let snapshot_meta = match fs::metadata(&snapshot.path).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(HistoryError::file_io(&snapshot.path, e)),
    };
    if snapshot_meta.len() != size {
        return Ok(false);
    }

    let current = fs::read(file)
        .await
        .map_err(|e| HistoryError::file_io(file, e))?;
    let previous = match fs::read(&snapshot.path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(HistoryError::file_io(&snapshot.path, e)),
    };

    Ok(current == previous)
}

/// Copy `file` into `backup_dir` under a fresh snapshot name.
async fn write_snapshot(
    file: &Path,
    backup_dir: &Path,
    base_name: &str,
    metadata: &Metadata,
) -> HistoryResult<SnapshotRef> {
    let modified = metadata
        .modified()
        .map_err(|e| HistoryError::file_io(file, e))?;
    let target = free_snapshot_path(backup_dir, base_name, modified).await?;

    let temp = backup_dir.join(format!(
        ".{}.{}.{}.tmp",
        base_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    copy_then_rename(file, &temp, &target, metadata).await?;

    Ok(SnapshotRef::new(target, modified))
}

/// Copy `file` to `temp` with the source's times, then move it to `target`.
///
/// On failure the temp copy is removed so no partial snapshot remains.
async fn copy_then_rename(
    file: &Path,
    temp: &Path,
    target: &Path,
    metadata: &Metadata,
) -> HistoryResult<()> {
    let result = async {
        fs::copy(file, temp)
            .await
            .map_err(|e| HistoryError::file_io(file, e))?;
        filetime::set_file_times(
            temp,
            FileTime::from_last_access_time(metadata),
            FileTime::from_last_modification_time(metadata),
        )
        .map_err(|e| HistoryError::file_io(temp, e))?;
        fs::rename(temp, target)
            .await
            .map_err(|e| HistoryError::file_io(target, e))
    }
    .await;

    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(temp).await {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!(path = %temp.display(), error = %cleanup, "Failed to remove temp snapshot");
            }
        }
        return Err(e);
    }
    Ok(())
}

/// First unused snapshot path for a source modified at `modified`.
async fn free_snapshot_path(
    backup_dir: &Path,
    base_name: &str,
    modified: SystemTime,
) -> HistoryResult<PathBuf> {
    for sequence in 0..=MAX_SEQUENCE {
        let path = backup_dir.join(snapshot_name(modified, base_name, sequence));
        let taken = fs::try_exists(&path)
            .await
            .map_err(|e| HistoryError::file_io(&path, e))?;
        if !taken {
            return Ok(path);
        }
    }

    Err(HistoryError::file_io(
        backup_dir.join(snapshot_name(modified, base_name, MAX_SEQUENCE)),
        std::io::Error::new(ErrorKind::AlreadyExists, "no free snapshot name for this second"),
    ))
}

/// Remove temp copies of `base_name` left behind by an interrupted write.
async fn cleanup_stale_temps(backup_dir: &Path, base_name: &str) {
    let Ok(mut reader) = fs::read_dir(backup_dir).await else {
        return;
    };
    let prefix = format!(".{base_name}.");
    let now = SystemTime::now();

    while let Ok(Some(entry)) = reader.next_entry().await {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !name.starts_with(&prefix) || !name.ends_with(".tmp") {
            continue;
        }

        let stale = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > STALE_TEMP_AGE);
        if !stale {
            continue;
        }

        match fs::remove_file(entry.path()).await {
            Ok(()) => debug!(path = %entry.path().display(), "Removed stale temp snapshot"),
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to remove stale temp snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _history: TempDir,
        work: TempDir,
        store: SnapshotStore,
    }

    fn setup(policy: RetentionPolicy) -> Fixture {
        let history = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = SnapshotStore::new(history.path().join("history"), policy);
        Fixture {
            _history: history,
            work,
            store,
        }
    }

    /// Write `content` and stamp the file `secs_ago` seconds in the past.
    async fn save(path: &Path, content: &str, secs_ago: u64) {
        fs::write(path, content).await.unwrap();
        let when = SystemTime::now() - Duration::from_secs(secs_ago);
        filetime::set_file_mtime(path, FileTime::from_system_time(when)).unwrap();
    }

    #[tokio::test]
    async fn test_first_save_creates_snapshot() {
        let fx = setup(RetentionPolicy::default());
        let file = fx.work.path().join("notes.txt");
        save(&file, "hello\n", 60).await;

        let outcome = fx.store.process_history(&file).await.unwrap();
        let ProcessOutcome::Stored { snapshot, pruned } = outcome else {
            panic!("expected a snapshot, got {outcome:?}");
        };
        assert_eq!(pruned, 0);
        assert!(snapshot.name.ends_with(".notes.txt"));
        assert_eq!(snapshot.path.parent().unwrap(), fx.store.index().backup_dir(&file));
        assert_eq!(fs::read_to_string(&snapshot.path).await.unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_identical_save_is_noop() {
        let fx = setup(RetentionPolicy::default());
        let file = fx.work.path().join("a.txt");
        save(&file, "same", 120).await;

        fx.store.process_history(&file).await.unwrap();
        // touch without changing content
        save(&file, "same", 60).await;
        let outcome = fx.store.process_history(&file).await.unwrap();

        assert!(matches!(outcome, ProcessOutcome::Unchanged { .. }));
        assert_eq!(fx.store.timeline(&file).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_saves_are_ordered() {
        let fx = setup(RetentionPolicy::default());
        let file = fx.work.path().join("a.txt");
        let contents = ["v1", "v2", "v3", "v4"];

        for (i, content) in contents.iter().enumerate() {
            save(&file, content, (contents.len() - i) as u64 * 60).await;
            fx.store.process_history(&file).await.unwrap();
        }

        let timeline = fx.store.timeline(&file).await.unwrap();
        assert_eq!(timeline.len(), contents.len());

        let mut oldest_first: Vec<_> = timeline.entries().to_vec();
        oldest_first.reverse();
        for (snapshot, content) in oldest_first.iter().zip(contents) {
            assert_eq!(fs::read_to_string(&snapshot.path).await.unwrap(), content);
        }
        let names: Vec<_> = oldest_first.iter().map(|s| s.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[tokio::test]
    async fn test_snapshot_inherits_source_mtime() {
        let fx = setup(RetentionPolicy::default());
        let file = fx.work.path().join("a.txt");
        save(&file, "content", 3 * 86_400).await;

        fx.store.process_history(&file).await.unwrap();

        let source = fs::metadata(&file).await.unwrap().modified().unwrap();
        let timeline = fx.store.timeline(&file).await.unwrap();
        let snapshot = timeline.latest().unwrap();
        let copied = fs::metadata(&snapshot.path).await.unwrap().modified().unwrap();
        assert_eq!(copied, source);
    }

    #[tokio::test]
    async fn test_same_second_saves_get_sequence_suffix() {
        let fx = setup(RetentionPolicy::default());
        let file = fx.work.path().join("a.txt");
        let when = SystemTime::now() - Duration::from_secs(30);

        fs::write(&file, "first").await.unwrap();
        filetime::set_file_mtime(&file, FileTime::from_system_time(when)).unwrap();
        fx.store.process_history(&file).await.unwrap();

        fs::write(&file, "second").await.unwrap();
        filetime::set_file_mtime(&file, FileTime::from_system_time(when)).unwrap();
        fx.store.process_history(&file).await.unwrap();

        let timeline = fx.store.timeline(&file).await.unwrap();
        assert_eq!(timeline.len(), 2);
        assert!(timeline.latest().unwrap().name.contains("_01."));
        assert_eq!(
            fs::read_to_string(&timeline.latest().unwrap().path).await.unwrap(),
            "second"
        );
    }

    #[tokio::test]
    async fn test_oversized_file_is_never_snapshotted() {
        let fx = setup(RetentionPolicy {
            file_size_limit: 8,
            retention_days: 30,
        });
        let file = fx.work.path().join("big.txt");

        for (i, content) in ["0123456789", "abcdefghij"].iter().enumerate() {
            save(&file, content, 100 - i as u64).await;
            let outcome = fx.store.process_history(&file).await.unwrap();
            assert_eq!(outcome, ProcessOutcome::TooLarge { size: 10, limit: 8 });
        }

        assert!(!fx.store.index().backup_dir(&file).exists());
        assert!(fx.store.timeline(&file).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retention_window() {
        let retention_days = 5;
        let fx = setup(RetentionPolicy {
            file_size_limit: 1024,
            retention_days,
        });
        let file = fx.work.path().join("a.txt");
        let backup_dir = fx.store.index().backup_dir(&file);
        std::fs::create_dir_all(&backup_dir).unwrap();

        let day = 86_400;
        let expired = backup_dir.join("2000-01-01_00.00.00.a.txt");
        let kept = backup_dir.join("2000-01-05_00.00.00.a.txt");
        save(&expired, "old", (u64::from(retention_days) + 1) * day).await;
        save(&kept, "recent", (u64::from(retention_days) - 1) * day).await;

        save(&file, "current", 10).await;
        let outcome = fx.store.process_history(&file).await.unwrap();

        assert!(matches!(outcome, ProcessOutcome::Stored { pruned: 1, .. }));
        assert!(!expired.exists());
        assert!(kept.exists());
        assert_eq!(fx.store.timeline(&file).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_save_does_not_prune() {
        let fx = setup(RetentionPolicy {
            file_size_limit: 1024,
            retention_days: 1,
        });
        let file = fx.work.path().join("a.txt");
        save(&file, "stale", 10 * 86_400).await;
        fx.store.process_history(&file).await.unwrap();

        let outcome = fx.store.process_history(&file).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Unchanged { .. }));
        assert_eq!(fx.store.timeline(&file).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_files_do_not_interact() {
        let fx = setup(RetentionPolicy {
            file_size_limit: 1024,
            retention_days: 1,
        });
        let dir_a = fx.work.path().join("a");
        let dir_b = fx.work.path().join("b");
        fs::create_dir_all(&dir_a).await.unwrap();
        fs::create_dir_all(&dir_b).await.unwrap();
        let file_a = dir_a.join("x.txt");
        let file_b = dir_b.join("x.txt");
        let sibling = dir_a.join("y.x.txt");

        save(&file_a, "a", 10).await;
        save(&file_b, "b", 10).await;
        // an old sibling snapshot whose name also ends in x.txt
        save(&sibling, "s", 3 * 86_400).await;
        fx.store.process_history(&sibling).await.unwrap();

        let (a, b) = tokio::join!(
            fx.store.process_history(&file_a),
            fx.store.process_history(&file_b)
        );
        assert!(matches!(a.unwrap(), ProcessOutcome::Stored { pruned: 0, .. }));
        assert!(matches!(b.unwrap(), ProcessOutcome::Stored { pruned: 0, .. }));

        assert_ne!(
            fx.store.index().backup_dir(&file_a),
            fx.store.index().backup_dir(&file_b)
        );
        assert_eq!(fx.store.timeline(&file_a).await.unwrap().len(), 1);
        assert_eq!(fx.store.timeline(&file_b).await.unwrap().len(), 1);
        assert_eq!(fx.store.timeline(&sibling).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_temps_are_removed() {
        let fx = setup(RetentionPolicy::default());
        let file = fx.work.path().join("a.txt");
        let backup_dir = fx.store.index().backup_dir(&file);
        std::fs::create_dir_all(&backup_dir).unwrap();

        let stale = backup_dir.join(".a.txt.999.0.tmp");
        let fresh = backup_dir.join(".a.txt.999.1.tmp");
        save(&stale, "partial", 2 * 60 * 60).await;
        save(&fresh, "in flight", 5).await;

        save(&file, "content", 10).await;
        fx.store.process_history(&file).await.unwrap();

        assert!(!stale.exists());
        assert!(fresh.exists());
        assert_eq!(fx.store.timeline(&file).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_huge_retention_window_keeps_storing() {
        let fx = setup(RetentionPolicy {
            file_size_limit: 1024,
            retention_days: 999_999_999,
        });
        let file = fx.work.path().join("a.txt");

        save(&file, "1", 60).await;
        let first = fx.store.process_history(&file).await.unwrap();
        assert!(matches!(first, ProcessOutcome::Stored { pruned: 0, .. }));

        save(&file, "2", 30).await;
        let second = fx.store.process_history(&file).await.unwrap();
        assert!(matches!(second, ProcessOutcome::Stored { pruned: 0, .. }));
        assert_eq!(fx.store.timeline(&file).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_no_temp_file() {
        let fx = setup(RetentionPolicy::default());
        let file = fx.work.path().join("a.txt");
        save(&file, "content", 10).await;
        let metadata = std::fs::metadata(&file).unwrap();

        let backup_dir = fx.store.index().backup_dir(&file);
        let blocked = backup_dir.join("2000-01-01_00.00.00.a.txt");
        std::fs::create_dir_all(blocked.join("occupied")).unwrap();
        let temp = backup_dir.join(".a.txt.0.0.tmp");

        let result = copy_then_rename(&file, &temp, &blocked, &metadata).await;

        assert!(result.is_err());
        assert!(!temp.exists());
        assert!(blocked.join("occupied").is_dir());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let fx = setup(RetentionPolicy::default());
        let err = fx
            .store
            .process_history(&fx.work.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
