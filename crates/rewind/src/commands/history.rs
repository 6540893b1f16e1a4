//! History command handlers.
//!
//! Each handler builds a typed request, runs it through the
//! [`HistoryService`] and prints the outcome.

use anyhow::bail;
use rewind_core::{
    BrowseRequest, CommandOutput, CompareRequest, DeleteAllRequest, HistoryService,
    IncrementalDiffRequest, RevealRequest, ShowSnapshotRequest,
};
use rewind_history::ProcessOutcome;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Resolve a command-line path against the working directory.
pub fn absolute_path(cwd: &Path, path: &Path) -> PathBuf {
    rewind_util::path::normalize(&cwd.join(path))
}

/// Snapshot a file right now.
pub async fn handle_save(service: &HistoryService, file: &Path) -> anyhow::Result<()> {
    if !file.is_file() {
        bail!("Not a file: {}", file.display());
    }

    match service.store().process_history(file).await? {
        ProcessOutcome::Stored { snapshot, pruned } => {
            println!("Snapshot saved: {}", snapshot.path.display());
            if pruned > 0 {
                println!("Pruned {pruned} expired snapshot(s)");
            }
        }
        ProcessOutcome::Unchanged { latest } => {
            println!("Unchanged since {}", latest.display());
        }
        ProcessOutcome::TooLarge { size, limit } => {
            println!("Skipped: {size} bytes exceeds the {limit} byte limit");
        }
    }
    Ok(())
}

/// List the timeline of a file.
pub async fn handle_list(service: &HistoryService, file: PathBuf, json: bool) -> anyhow::Result<()> {
    let output = service.browse(BrowseRequest { file }).await?;
    print_output(output, json).await
}

/// Diff a snapshot against the live file.
pub async fn handle_diff(
    service: &HistoryService,
    file: PathBuf,
    position: usize,
) -> anyhow::Result<()> {
    let output = service.compare(CompareRequest { file, position }).await?;
    print_output(output, false).await
}

/// List or show incremental diffs.
pub async fn handle_incremental(
    service: &HistoryService,
    file: PathBuf,
    position: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let output = service
        .incremental_diff(IncrementalDiffRequest { file, position })
        .await?;
    print_output(output, json).await
}

/// Print the content of a snapshot.
pub async fn handle_show(
    service: &HistoryService,
    file: PathBuf,
    position: usize,
) -> anyhow::Result<()> {
    let output = service.show(ShowSnapshotRequest { file, position }).await?;
    print_output(output, false).await
}

/// Delete the whole history tree after confirmation.
pub async fn handle_delete_all(service: &HistoryService, yes: bool) -> anyhow::Result<()> {
    let root = &service.settings().history_path;
    if !yes && !confirm(&format!("Delete all local history in {}?", root.display()))? {
        println!("Cancelled");
        return Ok(());
    }

    let output = service.delete_all(DeleteAllRequest).await?;
    print_output(output, false).await
}

/// Open (or just print) the backup folder of a file.
pub async fn handle_reveal(
    service: &HistoryService,
    file: PathBuf,
    print_only: bool,
) -> anyhow::Result<()> {
    let output = service
        .reveal(RevealRequest {
            file,
            launch: !print_only,
        })
        .await?;
    print_output(output, false).await
}

async fn print_output(output: CommandOutput, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match output {
        CommandOutput::Status { message } => println!("{message}"),
        CommandOutput::Timeline { entries } => {
            for entry in entries {
                println!("{:>4}  {}", entry.position, entry.label);
            }
        }
        CommandOutput::Diff(view) => print!("{}", with_newline(view.render())),
        CommandOutput::Snapshot(snapshot) => {
            let content = tokio::fs::read(&snapshot.path).await?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
        CommandOutput::Folder { path } => println!("{}", path.display()),
    }
    Ok(())
}

fn with_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
