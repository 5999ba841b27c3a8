use crate::{format_json, open_store, runtime};
use anyhow::{Context, Result, anyhow};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use worklog::{ActivityEntry, TrackerEvent};
use worklog_tracker::{SessionHistory, SessionTracker, TrackerConfig, TrackerError};

#[derive(Args, Debug)]
pub struct TrackArgs {
    /// Project ID the session belongs to
    #[arg(long)]
    pub project: String,

    /// Directory to watch
    pub dir: PathBuf,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// How long a file must stay unchanged before a change is recorded
    #[arg(long, default_value_t = 1000)]
    pub settle_ms: u64,

    /// How often pending changes are checked
    #[arg(long, default_value_t = 100)]
    pub poll_ms: u64,

    /// Also record changes under dot-prefixed files and directories
    #[arg(long)]
    pub include_dotfiles: bool,
}

impl TrackArgs {
    fn config(&self) -> TrackerConfig {
        TrackerConfig::default()
            .with_stability_threshold(Duration::from_millis(self.settle_ms))
            .with_poll_interval(Duration::from_millis(self.poll_ms))
            .with_ignore_dotfiles(!self.include_dotfiles)
    }
}

pub fn run(args: TrackArgs, data_dir: Option<&PathBuf>, pretty: bool) -> Result<()> {
    let store = Arc::new(open_store(data_dir)?);
    let rt = runtime()?;
    // Built and dropped outside the runtime: the mirror's HTTP client blocks.
    let mut tracker = SessionTracker::new(SessionHistory::new(store), args.config());
    rt.block_on(track(&mut tracker, &args, pretty))
}

async fn track(tracker: &mut SessionTracker, args: &TrackArgs, pretty: bool) -> Result<()> {
    let mut events = tracker.subscribe();
    let session = tracker
        .start_session(&args.project, &args.dir)
        .with_context(|| format!("Failed to start tracking {:?}", args.dir))?;
    eprintln!(
        "Tracking {} for project {} (session {}). Press Ctrl-C to stop.",
        args.dir.display(),
        session.project_id,
        session.id
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl-C; stopping");
                }
                break;
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event, args.json)?,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event output fell behind; the session log is unaffected");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    match tracker.stop_session().await {
        Ok(Some(finished)) => {
            eprintln!(
                "Stopped after {:.1}s with {} change(s).",
                finished.duration,
                finished.logs.len()
            );
            println!("{}", format_json(&finished, pretty)?);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(TrackerError::Persist { session, source }) => {
            // Still print the record so the work is not lost.
            println!("{}", format_json(&session, pretty)?);
            Err(anyhow!(source).context(format!("Session {} was not saved", session.id)))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_event(event: &TrackerEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", format_json(event, false)?);
        return Ok(());
    }
    match event {
        TrackerEvent::Activity(entry) => println!("{}", describe(entry)),
        TrackerEvent::Error { message } => eprintln!("watch error: {message}"),
    }
    Ok(())
}

fn describe(entry: &ActivityEntry) -> String {
    format!(
        "{}  {:<6}  {}",
        entry.timestamp.format("%H:%M:%S"),
        entry.kind.as_str(),
        entry.file_path
    )
}
