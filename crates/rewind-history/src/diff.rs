//! Unified diffs between snapshots and live files.
//!
//! Both sides are read as strict UTF-8. Files that are not valid UTF-8 are
//! rejected with [`HistoryError::Encoding`] rather than decoded lossily.

use crate::{HistoryError, HistoryResult};
use similar::TextDiff;
use std::path::Path;
use tokio::fs;

/// Shown instead of an empty diff.
pub const NO_DIFFERENCES_MSG: &str = "No differences.";

/// Lines of context around each hunk.
const CONTEXT_LINES: usize = 3;

/// Compute a unified diff from `from` to `to`.
///
/// The file paths are used as the `---`/`+++` headers. Identical content
/// yields an empty string.
pub async fn diff(from: &Path, to: &Path) -> HistoryResult<String> {
    let old = read_text(from).await?;
    let new = read_text(to).await?;
    Ok(unified_diff(
        &old,
        &new,
        &from.display().to_string(),
        &to.display().to_string(),
    ))
}

/// Compute a unified diff between two strings.
pub fn unified_diff(old: &str, new: &str, from_label: &str, to_label: &str) -> String {
    if old == new {
        return String::new();
    }

    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(from_label, to_label)
        .to_string()
}

/// Text to display for a computed diff.
pub fn render(diff: &str) -> &str {
    if diff.is_empty() {
        NO_DIFFERENCES_MSG
    } else {
        diff
    }
}

async fn read_text(path: &Path) -> HistoryResult<String> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| HistoryError::file_io(path, e))?;
    String::from_utf8(bytes).map_err(|_| HistoryError::Encoding(path.to_path_buf()))
}
