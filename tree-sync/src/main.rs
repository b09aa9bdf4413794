//! Tree Sync - Main entry point
//!
//! Synchronizes a local directory with a folder of a vault store.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tree_sync::config::{Config, ConfigFile};
use tree_sync::fs::LocalFs;
use tree_sync::remote::{RemoteStore, VaultStore};
use tree_sync::sync::{run_sync, Direction, StdoutSink, SyncOptions};
use tree_sync::transfer::ProgressReporter;
use tree_sync::utils::{self, signal::wait_for_termination};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Remote directory
    #[arg(short, long, value_name = "PATH")]
    remote: String,

    /// Local directory
    #[arg(short, long, value_name = "PATH")]
    local: PathBuf,

    /// Download files from the remote store instead of uploading
    #[arg(short, long)]
    download: bool,

    /// Delete files on the target side that are missing on the source side
    #[arg(long)]
    delete: bool,

    /// Only delete missing files, do not transfer anything
    #[arg(long)]
    delete_only: bool,

    /// Transfer every file regardless of size and modification time
    #[arg(long)]
    always: bool,

    /// Overwrite directories with files
    #[arg(long)]
    force: bool,

    /// Show what would be done without changing anything
    #[arg(short = 'n', long = "dryrun")]
    dry_run: bool,

    /// Disable the progress display
    #[arg(long)]
    no_progress: bool,

    /// Continue past per-file errors
    #[arg(long)]
    ignore_errors: bool,

    /// Print only errors and warnings
    #[arg(short, long)]
    quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "FILE", conflicts_with = "ignore_config_file")]
    config: Option<PathBuf>,

    /// Do not read $HOME/.tree-sync.toml
    #[arg(long)]
    ignore_config_file: bool,

    /// Vault directory (overrides config)
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn config_file(&self) -> ConfigFile {
        match (&self.config, self.ignore_config_file) {
            (Some(path), _) => ConfigFile::Explicit(path.clone()),
            (None, true) => ConfigFile::Ignored,
            (None, false) => ConfigFile::Home,
        }
    }

    fn sync_options(&self, config: &Config) -> SyncOptions {
        let direction = if self.download {
            Direction::Download
        } else {
            Direction::Upload
        };

        let mut options = SyncOptions::new(self.remote.clone(), self.local.clone(), direction);
        options.delete = self.delete;
        options.delete_only = self.delete_only;
        options.always = self.always;
        options.force = self.force;
        options.dry_run = self.dry_run;
        options.ignore_errors = self.ignore_errors || config.transfer.ignore_errors;
        options.no_progress = self.no_progress || config.transfer.no_progress || self.quiet;
        options.quiet = self.quiet;
        options
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run succeeded; errors are setup failures.
async fn run(args: Args) -> Result<bool> {
    // Load configuration
    let config = Config::load(args.config_file())?;

    // Initialize logging
    let default_level = if args.quiet { "warn" } else { config.log.level.as_str() };
    let log_level = args.log_level.as_deref().unwrap_or(default_level);
    utils::logger::init(log_level)?;

    tracing::debug!("Starting tree-sync v{}", env!("CARGO_PKG_VERSION"));

    let store_path = args.store.clone().unwrap_or_else(|| config.store.path.clone());
    let vault = VaultStore::open(&store_path)
        .await
        .with_context(|| format!("opening vault {}", store_path.display()))?;

    let options = args.sync_options(&config);
    let progress = ProgressReporter::new(!options.no_progress);
    let mut sink = StdoutSink;

    let report = tokio::select! {
        report = run_sync(&options, &vault, &LocalFs, &mut sink, &progress) => report?,
        signal = wait_for_termination() => {
            progress.finish(false);
            tracing::warn!("Received {}, stopping", signal);
            if options.direction == Direction::Upload && !options.dry_run {
                // Blobs already written stay reachable
                vault.persist().await?;
            }
            return Ok(false);
        }
    };

    if !options.quiet {
        println!("{}", report);
    }

    Ok(report.success)
}
