//! Core logic for rewind.
//!
//! This crate connects the history engine to its hosts:
//! - Configuration management (multi-source, JSONC support)
//! - Typed history commands with status messages
//! - Save event routing to the background history worker

pub mod command;
pub mod config;
pub mod error;
pub mod listener;

pub use command::{
    BrowseRequest, CommandOutput, CompareRequest, DeleteAllRequest, DiffView, HistoryService,
    IncrementalDiffRequest, RevealRequest, ShowSnapshotRequest, TimelineEntry,
    HISTORY_DELETED_MSG, NO_HISTORY_MSG, NO_INCREMENTAL_DIFF_MSG,
};
pub use config::{Config, HistorySettings};
pub use error::{ConfigError, CoreError, CoreResult};
pub use listener::{EditorEvent, SaveListener};
