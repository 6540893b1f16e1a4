//! Background processing of save events.
//!
//! Saves are queued on a bounded channel and handled one at a time by a
//! single task, so snapshot writes and retention sweeps never overlap.
//! Callers never wait for a result; failures are logged. Each save runs in
//! its own task, so a panic is contained to that save.

use crate::store::{ProcessOutcome, SnapshotStore};
use crate::HistoryResult;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default number of queued saves before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Cloneable handle for submitting files to a [`HistoryWorker`].
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<PathBuf>,
}

impl WorkerHandle {
    /// Queue `file` for snapshotting.
    ///
    /// Never blocks; returns `false` when the queue is full or closed.
    pub fn submit(&self, file: impl Into<PathBuf>) -> bool {
        let file = file.into();
        match self.tx.try_send(file) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(file)) => {
                warn!(path = %file.display(), "History queue full, dropping save");
                false
            }
            Err(mpsc::error::TrySendError::Closed(file)) => {
                warn!(path = %file.display(), "History worker stopped, dropping save");
                false
            }
        }
    }
}

/// Owns the queue consumer task.
pub struct HistoryWorker {
    handle: WorkerHandle,
    task: JoinHandle<()>,
}

impl HistoryWorker {
    /// Spawn the consumer on the current tokio runtime.
    pub fn spawn(store: Arc<SnapshotStore>, capacity: usize) -> Self {
        Self::spawn_with(capacity, move |file| {
            let store = store.clone();
            async move { store.process_history(&file).await }
        })
    }

    fn spawn_with<F, Fut>(capacity: usize, process: F) -> Self
    where
        F: Fn(PathBuf) -> Fut + Send + 'static,
        Fut: Future<Output = HistoryResult<ProcessOutcome>> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<PathBuf>(capacity.max(1));

        let task = tokio::spawn(async move {
            while let Some(file) = rx.recv().await {
                let job = tokio::spawn(process(file.clone()));
                match job.await {
                    Ok(Ok(ProcessOutcome::Stored { snapshot, .. })) => {
                        debug!(path = %file.display(), snapshot = %snapshot.name, "Background snapshot stored");
                    }
                    Ok(Ok(outcome)) => {
                        debug!(path = %file.display(), ?outcome, "Background snapshot skipped");
                    }
                    Ok(Err(e)) => {
                        warn!(path = %file.display(), error = %e, "Local history failed");
                    }
                    Err(e) => {
                        warn!(path = %file.display(), error = %e, "Local history job aborted");
                    }
                }
            }
            debug!("History worker drained");
        });

        Self {
            handle: WorkerHandle { tx },
            task,
        }
    }

    /// A handle for submitting work.
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Queue `file` for snapshotting. See [`WorkerHandle::submit`].
    pub fn submit(&self, file: impl Into<PathBuf>) -> bool {
        self.handle.submit(file)
    }

    /// Stop accepting work and wait for queued saves to finish.
    ///
    /// Outstanding [`WorkerHandle`] clones keep the queue open; drop them first.
    pub async fn shutdown(self) {
        drop(self.handle);
        if let Err(e) = self.task.await {
            warn!(error = %e, "History worker terminated abnormally");
        }
    }
}
