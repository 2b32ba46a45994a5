//! `dirmon`: watch a bookmarks directory and print what the monitor reports.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bookmarks_directory_monitor::{
    ChannelDelegate, FileKind, LocalDirectoryMonitor, LocalFileSystem, MonitorConfig,
    MonitorHandle, SnapshotEvaluator,
};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod output;

use output::Printer;

/// Watch a bookmarks directory and report its contents.
#[derive(Debug, Parser)]
#[command(name = "dirmon", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch a directory and print every snapshot until interrupted
    Watch(WatchArgs),
    /// Print the current contents of a directory once
    List(ListArgs),
}

#[derive(Debug, Args)]
struct SelectArgs {
    /// Directory to inspect (overrides the config file)
    directory: Option<PathBuf>,

    /// File kind to report: kml, kmz or gpx
    #[arg(long)]
    kind: Option<FileKind>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print one JSON object per line
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct WatchArgs {
    #[command(flatten)]
    select: SelectArgs,

    /// Debounce quiet interval in milliseconds
    #[arg(long)]
    quiet_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[command(flatten)]
    select: SelectArgs,
}

impl SelectArgs {
    fn config(&self) -> Result<MonitorConfig> {
        let mut config = match (&self.config, &self.directory) {
            (Some(path), _) => MonitorConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            (None, Some(directory)) => MonitorConfig::new(directory),
            (None, None) => anyhow::bail!("either a directory or --config is required"),
        };
        if let (Some(_), Some(directory)) = (&self.config, &self.directory) {
            config.directory = directory.clone();
        }
        if let Some(kind) = self.kind {
            config.file_kind = kind;
        }
        Ok(config)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Watch(args) => watch(args).await,
        Command::List(args) => list(args),
    }
}

async fn watch(args: WatchArgs) -> Result<()> {
    let mut config = args.select.config()?;
    if let Some(quiet_ms) = args.quiet_ms {
        config.quiet_interval_ms = quiet_ms;
    }
    config.validate().context("Invalid configuration")?;

    let printer = Printer::new(args.select.json);
    let (delegate, mut events) = ChannelDelegate::new();
    let mut monitor = LocalDirectoryMonitor::new(config).context("Failed to create monitor")?;
    monitor.set_delegate(&delegate);

    let handle = MonitorHandle::spawn(monitor);
    let directory = handle
        .start()
        .await
        .with_context(|| format!("Failed to start watching {}", handle.directory().display()))?;
    info!("Watching {} (Ctrl-C to stop)", directory.display());

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                printer.event(&event)?;
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    handle.stop().await?;
    handle.shutdown().await?;
    info!("Stopped");
    Ok(())
}

fn list(args: ListArgs) -> Result<()> {
    let config = args.select.config()?;
    config.validate().context("Invalid configuration")?;

    let evaluator = SnapshotEvaluator::new(
        config.directory.clone(),
        config.file_kind,
        Box::new(LocalFileSystem),
    );
    let evaluation = evaluator
        .collect()
        .with_context(|| format!("Failed to list {}", evaluator.directory().display()))?;

    Printer::new(args.select.json).evaluation(&evaluation)
}
