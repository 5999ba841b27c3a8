use crate::{format_json, open_store, runtime};
use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use worklog::Session;
use worklog_tracker::{SessionHistory, SessionTracker, TrackerConfig};

pub fn run(
    project: &str,
    start: &str,
    end: &str,
    data_dir: Option<&PathBuf>,
    pretty: bool,
) -> Result<()> {
    let session = build_session(project, start, end)?;

    let store = Arc::new(open_store(data_dir)?);
    let rt = runtime()?;
    let tracker = SessionTracker::new(SessionHistory::new(store), TrackerConfig::default());
    rt.block_on(tracker.save_manual_session(session.clone()))
        .context("Failed to save manual session")?;

    println!("{}", format_json(&session, pretty)?);
    Ok(())
}

fn build_session(project: &str, start: &str, end: &str) -> Result<Session> {
    ensure!(!project.trim().is_empty(), "Project ID must not be empty");
    let start = parse_time(start).context("Invalid --start")?;
    let end = parse_time(end).context("Invalid --end")?;
    ensure!(end >= start, "--end ({end}) is before --start ({start})");
    Ok(Session::manual(project, start, end))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("expected an RFC 3339 timestamp, got {s:?}"))?;
    Ok(parsed.with_timezone(&Utc))
}
