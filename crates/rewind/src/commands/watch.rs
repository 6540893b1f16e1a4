//! Watch mode: the CLI acting as an editor host.
//!
//! File-system notifications under a directory are turned into editor
//! events and fed to the [`SaveListener`]. Writes become `PostSave`; a
//! file closed after writing becomes `Close` where the platform reports it.
//! Editors that save atomically rename a temp file over the target; the
//! rename destination counts as saved.
//! Bursts of notifications for the same file are debounced so a snapshot is
//! only taken once the file has been quiet for a moment.

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rewind_core::{EditorEvent, HistorySettings, SaveListener};
use rewind_history::{HistoryWorker, DEFAULT_QUEUE_CAPACITY};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Quiet period before a changed file is handed to the listener.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// How often pending events are checked.
const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Map a notification to the editor event it represents, if any.
pub fn editor_event(kind: &EventKind, path: &Path) -> Option<EditorEvent> {
    let path = path.to_path_buf();
    match kind {
        EventKind::Create(CreateKind::File | CreateKind::Any)
        | EventKind::Modify(
            ModifyKind::Data(_)
            | ModifyKind::Any
            | ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any),
        ) => Some(EditorEvent::PostSave(path)),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(EditorEvent::Close(path)),
        _ => None,
    }
}

/// Paths of `event` that may have received new content.
///
/// A two-sided rename lists source then destination; only the destination
/// holds the saved file.
pub fn saved_paths(event: &Event) -> &[PathBuf] {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let skip = event.paths.len().saturating_sub(1);
            &event.paths[skip..]
        }
        _ => &event.paths,
    }
}

/// Watch `dir` recursively until Ctrl-C, snapshotting saved files.
pub async fn handle_watch(settings: Arc<HistorySettings>, dir: &Path) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let worker = HistoryWorker::spawn(Arc::new(settings.store()), DEFAULT_QUEUE_CAPACITY);
    let listener = SaveListener::new(settings.clone(), worker.handle());

    let (event_tx, mut event_rx) = mpsc::channel::<Event>(256);
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                let _ = event_tx.blocking_send(event);
            }
            Err(e) => warn!(error = %e, "Watch error"),
        },
        Config::default(),
    )?;
    watcher.watch(dir, RecursiveMode::Recursive)?;

    info!(dir = %dir.display(), history = %settings.history_path.display(), "Watching for saves");
    println!("Watching {} (Ctrl-C to stop)", dir.display());

    let mut pending: HashMap<PathBuf, (EditorEvent, Instant)> = HashMap::new();
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(event) = event_rx.recv() => {
                for path in saved_paths(&event) {
                    if let Some(editor_event) = editor_event(&event.kind, path) {
                        pending.insert(path.clone(), (editor_event, Instant::now()));
                    }
                }
            }
            _ = ticker.tick() => {
                flush(&mut pending, &listener);
            }
        }
    }

    drop(watcher);
    // Quiet or not, hand over what is left before draining.
    for (_, (event, _)) in pending.drain() {
        listener.on_event(&event);
    }
    drop(listener);
    debug!("Waiting for queued snapshots");
    worker.shutdown().await;
    println!("Stopped");
    Ok(())
}

fn flush(pending: &mut HashMap<PathBuf, (EditorEvent, Instant)>, listener: &SaveListener) {
    let now = Instant::now();
    pending.retain(|_, (event, seen)| {
        if now.duration_since(*seen) < DEBOUNCE {
            return true;
        }
        if listener.on_event(event) {
            debug!(path = %event.path().display(), "Queued snapshot");
        }
        false
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, RemoveKind};

    #[test]
    fn test_editor_event_mapping() {
        let path = Path::new("/p/a.txt");

        assert_eq!(
            editor_event(&EventKind::Modify(ModifyKind::Data(DataChange::Content)), path),
            Some(EditorEvent::PostSave(path.to_path_buf()))
        );
        assert_eq!(
            editor_event(&EventKind::Create(CreateKind::File), path),
            Some(EditorEvent::PostSave(path.to_path_buf()))
        );
        assert_eq!(
            editor_event(&EventKind::Access(AccessKind::Close(AccessMode::Write)), path),
            Some(EditorEvent::Close(path.to_path_buf()))
        );
        assert_eq!(
            editor_event(&EventKind::Modify(ModifyKind::Name(RenameMode::To)), path),
            Some(EditorEvent::PostSave(path.to_path_buf()))
        );
        assert_eq!(
            editor_event(&EventKind::Modify(ModifyKind::Name(RenameMode::Both)), path),
            Some(EditorEvent::PostSave(path.to_path_buf()))
        );
        assert_eq!(
            editor_event(&EventKind::Modify(ModifyKind::Name(RenameMode::From)), path),
            None
        );
        assert_eq!(
            editor_event(&EventKind::Remove(RemoveKind::File), path),
            None
        );
        assert_eq!(
            editor_event(&EventKind::Create(CreateKind::Folder), path),
            None
        );
    }

    #[test]
    fn test_atomic_save_uses_rename_destination() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/p/.a.txt.swp"))
            .add_path(PathBuf::from("/p/a.txt"));
        assert_eq!(saved_paths(&event), [PathBuf::from("/p/a.txt")]);

        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/p/a.txt"));
        assert_eq!(saved_paths(&event), [PathBuf::from("/p/a.txt")]);
    }
}
