//! History error types.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors that can occur while maintaining local history.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// IO error without a specific file attached.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error on a specific file or directory.
    #[error("IO error on {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File content is not valid UTF-8 and cannot be diffed as text.
    #[error("File is not valid UTF-8: {}", .0.display())]
    Encoding(PathBuf),

    /// Path has no usable file name.
    #[error("Invalid file path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// History root that must never be removed wholesale.
    #[error("Refusing to delete history root: {}", .0.display())]
    UnsafeRoot(PathBuf),
}

impl HistoryError {
    /// Attach a path to an IO error.
    pub fn file_io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io(e) | Self::FileIo { source: e, .. } => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}
