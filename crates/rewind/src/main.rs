//! Rewind - local file history.
//!
//! This is the main entry point for the rewind CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::*;
use rewind_core::{Config, HistoryService};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rewind")]
#[command(author, version, about = "Local file history for your editor", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    stderr: bool,

    /// Config file to load on top of the global and project config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a snapshot of a file now
    Save {
        /// File to snapshot
        file: PathBuf,
    },
    /// List the snapshots of a file, newest first
    List {
        /// File whose history to list
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Diff a snapshot against the current file
    Diff {
        /// File to compare
        file: PathBuf,
        /// Timeline position (0 is newest)
        #[arg(default_value_t = 0)]
        position: usize,
    },
    /// Diff a snapshot against the one before it
    Incremental {
        /// File whose history to diff
        file: PathBuf,
        /// Timeline position; lists the choices when omitted
        position: Option<usize>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the content of a snapshot
    Show {
        /// File whose snapshot to print
        file: PathBuf,
        /// Timeline position (0 is newest)
        #[arg(default_value_t = 0)]
        position: usize,
    },
    /// Delete all local history
    DeleteAll {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Open the backup folder of a file
    Reveal {
        /// File whose backup folder to open
        file: PathBuf,
        /// Only print the folder path
        #[arg(long)]
        print: bool,
    },
    /// Watch a directory and snapshot files as they are saved
    Watch {
        /// Directory to watch (defaults to the working directory)
        dir: Option<PathBuf>,
    },
    /// Show configuration
    Config {
        /// Write the resolved settings to ./rewind.json
        #[arg(long)]
        init: bool,
    },
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    let explicit = cli.config.as_deref().map(|p| absolute_path(&cwd, p));
    let (config, sources) = Config::load_with(Some(&cwd), explicit.as_deref()).await?;

    let log_file = init_logging(cli.verbose, cli.stderr, config.log_level.map(Into::into));
    tracing::debug!(command = ?std::env::args().collect::<Vec<_>>(), "Starting rewind");

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }
    if let Commands::Config { init } = cli.command {
        return show_config(&cwd, &config, &sources, init).await;
    }

    let settings = Arc::new(config.history_settings()?);
    let service = HistoryService::new(settings.clone());
    let file = |path: &Path| absolute_path(&cwd, path);

    let result = match cli.command {
        Commands::Save { file: path } => handle_save(&service, &file(&path)).await,
        Commands::List { file: path, json } => handle_list(&service, file(&path), json).await,
        Commands::Diff {
            file: path,
            position,
        } => handle_diff(&service, file(&path), position).await,
        Commands::Incremental {
            file: path,
            position,
            json,
        } => handle_incremental(&service, file(&path), position, json).await,
        Commands::Show {
            file: path,
            position,
        } => handle_show(&service, file(&path), position).await,
        Commands::DeleteAll { yes } => handle_delete_all(&service, yes).await,
        Commands::Reveal { file: path, print } => {
            handle_reveal(&service, file(&path), print).await
        }
        Commands::Watch { dir } => {
            let dir = dir.map_or_else(|| cwd.clone(), |d| file(&d));
            handle_watch(settings, &dir).await
        }
        Commands::Config { .. } | Commands::Version => Ok(()),
    };

    if cli.verbose {
        if let Some(path) = log_file {
            eprintln!("Logs: {}", path.display());
        }
    }

    result
}

/// Show the configuration sources and resolved settings.
async fn show_config(
    cwd: &Path,
    config: &Config,
    sources: &[PathBuf],
    init: bool,
) -> anyhow::Result<()> {
    let settings = config.history_settings()?;

    if init {
        let target = cwd.join("rewind.json");
        if target.exists() {
            anyhow::bail!("{} already exists", target.display());
        }
        let resolved = Config {
            history_path: Some(settings.history_path.clone()),
            file_size_limit: Some(settings.file_size_limit),
            history_retention: Some(settings.history_retention),
            history_on_close: Some(settings.history_on_close),
            ..Default::default()
        };
        let path = resolved.save(Some(cwd)).await?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    println!("Configuration sources:");
    if sources.is_empty() {
        println!("  (none)");
    } else {
        for source in sources {
            println!("  {}", source.display());
        }
    }
    println!();

    println!("Current configuration:");
    println!("{}", serde_json::to_string_pretty(&settings)?);

    Ok(())
}

/// Print version information.
fn print_version() {
    println!("rewind {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Local file history for your editor.");
}
