mod cmd_manual;
mod cmd_mirror;
mod cmd_sessions;
mod cmd_store;
mod cmd_track;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use worklog_store::{DataDir, JsonStore, MirroredStore, RemoteMirror};

#[derive(Parser, Debug)]
#[command(name = "worklog")]
#[command(about = "Track work sessions from filesystem activity and manage the local data store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Data directory (defaults to $WORKLOG_DATA_DIR, then the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a directory and record a session until interrupted
    Track(cmd_track::TrackArgs),
    /// List recorded sessions for a project
    Sessions {
        /// Project ID
        #[arg(long)]
        project: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a completed session entered by hand
    Manual {
        /// Project ID
        #[arg(long)]
        project: String,

        /// Start time (RFC 3339)
        #[arg(long)]
        start: String,

        /// End time (RFC 3339)
        #[arg(long)]
        end: String,
    },
    /// Read and write raw store keys
    Store {
        #[command(subcommand)]
        op: cmd_store::StoreOp,
    },
    /// Talk to the configured remote mirror
    Mirror {
        #[command(subcommand)]
        op: cmd_mirror::MirrorOp,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let data_dir = cli.data_dir.as_ref();

    match cli.command {
        Commands::Track(args) => cmd_track::run(args, data_dir, cli.pretty),
        Commands::Sessions { project, json } => {
            cmd_sessions::run(&project, json, data_dir, cli.pretty)
        }
        Commands::Manual {
            project,
            start,
            end,
        } => cmd_manual::run(&project, &start, &end, data_dir, cli.pretty),
        Commands::Store { op } => cmd_store::run(op, data_dir, cli.pretty),
        Commands::Mirror { op } => cmd_mirror::run(op, data_dir, cli.pretty),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Local store with writes mirrored to the remote, when one is configured.
pub(crate) type AppStore = MirroredStore<JsonStore, RemoteMirror>;

pub(crate) fn open_local(data_dir: Option<&PathBuf>) -> Result<JsonStore> {
    let mut resolver = DataDir::new();
    if let Some(dir) = data_dir {
        resolver = resolver.with_dir(dir);
    }
    let dir = resolver
        .resolve()
        .context("Failed to determine the data directory")?;
    JsonStore::open(&dir).with_context(|| format!("Failed to open data directory {:?}", dir))
}

pub(crate) fn open_store(data_dir: Option<&PathBuf>) -> Result<AppStore> {
    let local = open_local(data_dir)?;
    let mirror = RemoteMirror::init(&local);
    Ok(MirroredStore::new(local, mirror))
}

pub(crate) fn format_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}
