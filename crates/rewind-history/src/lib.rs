//! Local file history for rewind.
//!
//! Every save of a file leaves a timestamped copy in a directory tree that
//! mirrors the file's location under a history root. This crate provides:
//! - Path mirroring from original files to backup directories
//! - Snapshot writing with content de-duplication and atomic renames
//! - Timeline listing, newest first
//! - Unified diffs between snapshots or against the live file
//! - Age-based pruning and whole-history deletion
//! - A background worker that processes saves off the caller's path
//!
//! # Example
//!
//! ```no_run
//! use rewind_history::{RetentionPolicy, SnapshotStore};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SnapshotStore::new("/home/me/.rewind/history", RetentionPolicy::default());
//!
//! // After the editor saved the file
//! store.process_history(Path::new("/home/me/proj/main.rs")).await?;
//!
//! let timeline = store.timeline(Path::new("/home/me/proj/main.rs")).await?;
//! if let Some((older, newer)) = timeline.incremental_pair(0) {
//!     let diff = rewind_history::diff(&older.path, &newer.path).await?;
//!     println!("{}", rewind_history::diff::render(&diff));
//! }
//! # Ok(())
//! # }
//! ```

pub mod diff;
mod error;
pub mod index;
pub mod mirror;
pub mod snapshot;
mod store;
pub mod sweep;
mod worker;

pub use diff::diff;
pub use error::{HistoryError, HistoryResult};
pub use index::{list_snapshots, SnapshotIndex, Timeline};
pub use mirror::MirrorStrategy;
pub use snapshot::SnapshotRef;
pub use store::{ProcessOutcome, RetentionPolicy, SnapshotStore};
pub use sweep::delete_all;
pub use worker::{HistoryWorker, WorkerHandle, DEFAULT_QUEUE_CAPACITY};
