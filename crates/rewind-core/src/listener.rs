//! Editor save events.
//!
//! The host reports document lifecycle events; [`SaveListener`] decides
//! which of them produce a snapshot and hands those files to the history
//! worker without waiting for the result.

use crate::config::HistorySettings;
use rewind_history::WorkerHandle;
use rewind_util::path::is_within;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// A document lifecycle event reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "path", rename_all = "snake_case")]
pub enum EditorEvent {
    /// The file is about to be written.
    PreSave(PathBuf),
    /// The file was written.
    PostSave(PathBuf),
    /// The file's document was closed.
    Close(PathBuf),
}

impl EditorEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::PreSave(path) | Self::PostSave(path) | Self::Close(path) => path,
        }
    }
}

/// Routes save events to the history worker.
#[derive(Debug, Clone)]
pub struct SaveListener {
    settings: Arc<HistorySettings>,
    worker: WorkerHandle,
}

impl SaveListener {
    pub fn new(settings: Arc<HistorySettings>, worker: WorkerHandle) -> Self {
        Self { settings, worker }
    }

    /// Whether `event` should produce a snapshot under the current settings.
    ///
    /// Saves trigger unless `history_on_close` is set, in which case only
    /// closes do. Files inside the history tree are never snapshotted.
    pub fn should_snapshot(&self, event: &EditorEvent) -> bool {
        let triggered = match event {
            EditorEvent::PreSave(_) => false,
            EditorEvent::PostSave(_) => !self.settings.history_on_close,
            EditorEvent::Close(_) => self.settings.history_on_close,
        };
        if !triggered {
            return false;
        }

        let path = event.path();
        if is_within(path, &self.settings.history_path) {
            trace!(path = %path.display(), "Ignoring save inside history tree");
            return false;
        }
        path.is_file()
    }

    /// Handle an event. Returns whether a snapshot was queued.
    pub fn on_event(&self, event: &EditorEvent) -> bool {
        if !self.should_snapshot(event) {
            return false;
        }
        self.worker.submit(event.path())
    }
}
