//! Host-facing history commands.
//!
//! Each command the editor (or the CLI) can issue has its own request type.
//! Results are a [`CommandOutput`]: either data to present or one of the
//! terse status messages below. Failures are returned as [`CoreError`] and
//! never affect other files or commands.

use crate::config::HistorySettings;
use crate::error::{CoreError, CoreResult};
use rewind_history::{delete_all, diff, SnapshotRef, SnapshotStore, Timeline};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Status shown when a file has no snapshots.
pub const NO_HISTORY_MSG: &str = "No local history found";

/// Status shown when a file has fewer than two snapshots.
pub const NO_INCREMENTAL_DIFF_MSG: &str = "No incremental diff found";

/// Status shown after the whole history was removed.
pub const HISTORY_DELETED_MSG: &str = "All local history deleted";

/// List the timeline of a file.
#[derive(Debug, Clone)]
pub struct BrowseRequest {
    pub file: PathBuf,
}

/// Diff two chronologically adjacent snapshots.
///
/// Without a position only the selectable entries are listed: every
/// snapshot except the oldest, which has nothing to compare against.
#[derive(Debug, Clone)]
pub struct IncrementalDiffRequest {
    pub file: PathBuf,
    pub position: Option<usize>,
}

/// Diff a snapshot against the live file.
#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub file: PathBuf,
    pub position: usize,
}

/// Open a snapshot from the timeline.
#[derive(Debug, Clone)]
pub struct ShowSnapshotRequest {
    pub file: PathBuf,
    pub position: usize,
}

/// Remove the entire history tree. Confirmation is the caller's job.
#[derive(Debug, Clone, Default)]
pub struct DeleteAllRequest;

/// Locate, and optionally open, the backup folder of a file.
#[derive(Debug, Clone)]
pub struct RevealRequest {
    pub file: PathBuf,
    /// Launch the platform file manager on the folder.
    pub launch: bool,
}

/// One selectable row of a timeline panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    /// Position in the timeline, 0 is newest.
    pub position: usize,
    /// Local time label.
    pub label: String,
    /// Snapshot file.
    pub path: PathBuf,
}

/// A computed diff between two files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffView {
    pub from: PathBuf,
    pub to: PathBuf,
    /// Unified diff text; empty when the files are identical.
    pub text: String,
}

impl DiffView {
    pub fn is_identical(&self) -> bool {
        self.text.is_empty()
    }

    /// The text to display, with a message for identical files.
    pub fn render(&self) -> &str {
        rewind_history::diff::render(&self.text)
    }
}

/// Result of a history command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    /// A terse status message.
    Status { message: &'static str },
    /// Timeline rows to choose from.
    Timeline { entries: Vec<TimelineEntry> },
    /// A diff to display.
    Diff(DiffView),
    /// A snapshot to open.
    Snapshot(SnapshotRef),
    /// The backup folder of a file.
    Folder { path: PathBuf },
}

impl CommandOutput {
    fn status(message: &'static str) -> Self {
        Self::Status { message }
    }
}

/// Executes history commands against one set of settings.
#[derive(Debug, Clone)]
pub struct HistoryService {
    settings: Arc<HistorySettings>,
    store: SnapshotStore,
}

impl HistoryService {
    pub fn new(settings: Arc<HistorySettings>) -> Self {
        let store = settings.store();
        Self { settings, store }
    }

    pub fn settings(&self) -> &HistorySettings {
        &self.settings
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// The timeline of a file, newest first.
    pub async fn timeline(&self, file: &Path) -> CoreResult<Timeline> {
        Ok(self.store.timeline(file).await?)
    }

    /// List all snapshots of a file.
    pub async fn browse(&self, request: BrowseRequest) -> CoreResult<CommandOutput> {
        let timeline = self.timeline(&request.file).await?;
        if timeline.is_empty() {
            return Ok(CommandOutput::status(NO_HISTORY_MSG));
        }
        Ok(CommandOutput::Timeline {
            entries: entries(timeline.entries()),
        })
    }

    /// List incremental diff positions, or diff one of them.
    pub async fn incremental_diff(
        &self,
        request: IncrementalDiffRequest,
    ) -> CoreResult<CommandOutput> {
        let timeline = self.timeline(&request.file).await?;
        if timeline.len() < 2 {
            return Ok(CommandOutput::status(NO_INCREMENTAL_DIFF_MSG));
        }

        let Some(position) = request.position else {
            let selectable = &timeline.entries()[..timeline.incremental_len()];
            return Ok(CommandOutput::Timeline {
                entries: entries(selectable),
            });
        };

        let (older, newer) =
            timeline
                .incremental_pair(position)
                .ok_or(CoreError::InvalidPosition {
                    position,
                    len: timeline.incremental_len(),
                })?;
        let view = diff_view(&older.path, &newer.path).await?;
        Ok(CommandOutput::Diff(view))
    }

    /// Diff a snapshot against the current file content.
    pub async fn compare(&self, request: CompareRequest) -> CoreResult<CommandOutput> {
        let timeline = self.timeline(&request.file).await?;
        if timeline.is_empty() {
            return Ok(CommandOutput::status(NO_HISTORY_MSG));
        }

        let snapshot = select(&timeline, request.position)?;
        let view = diff_view(&snapshot.path, &request.file).await?;
        Ok(CommandOutput::Diff(view))
    }

    /// Pick a snapshot to open.
    pub async fn show(&self, request: ShowSnapshotRequest) -> CoreResult<CommandOutput> {
        let timeline = self.timeline(&request.file).await?;
        if timeline.is_empty() {
            return Ok(CommandOutput::status(NO_HISTORY_MSG));
        }
        Ok(CommandOutput::Snapshot(select(&timeline, request.position)?.clone()))
    }

    /// Delete every snapshot of every file.
    pub async fn delete_all(&self, _request: DeleteAllRequest) -> CoreResult<CommandOutput> {
        let removed = delete_all(&self.settings.history_path).await?;
        debug!(removed, "Delete-all finished");
        Ok(CommandOutput::status(HISTORY_DELETED_MSG))
    }

    /// Locate the backup folder of a file, opening it if requested.
    pub async fn reveal(&self, request: RevealRequest) -> CoreResult<CommandOutput> {
        let folder = self.store.index().backup_dir(&request.file);
        if !tokio::fs::try_exists(&folder).await? {
            return Ok(CommandOutput::status(NO_HISTORY_MSG));
        }

        if request.launch {
            open::that_detached(&folder).map_err(|e| CoreError::Reveal {
                path: folder.clone(),
                message: e.to_string(),
            })?;
            info!(path = %folder.display(), "Opened backup folder");
        }

        Ok(CommandOutput::Folder { path: folder })
    }
}

fn entries(snapshots: &[SnapshotRef]) -> Vec<TimelineEntry> {
    snapshots
        .iter()
        .enumerate()
        .map(|(position, snapshot)| TimelineEntry {
            position,
            label: snapshot.label(),
            path: snapshot.path.clone(),
        })
        .collect()
}

fn select(timeline: &Timeline, position: usize) -> CoreResult<&SnapshotRef> {
    timeline.get(position).ok_or(CoreError::InvalidPosition {
        position,
        len: timeline.len(),
    })
}

async fn diff_view(from: &Path, to: &Path) -> CoreResult<DiffView> {
    let text = diff(from, to).await?;
    Ok(DiffView {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        text,
    })
}
