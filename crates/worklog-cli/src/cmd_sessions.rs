use crate::{format_json, open_local, runtime};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use worklog::{Session, query};
use worklog_tracker::{SessionHistory, SessionTracker, TrackerConfig};

pub fn run(project: &str, json: bool, data_dir: Option<&PathBuf>, pretty: bool) -> Result<()> {
    let store = Arc::new(open_local(data_dir)?);
    let rt = runtime()?;
    let tracker = SessionTracker::new(SessionHistory::new(store), TrackerConfig::default());
    let sessions = rt
        .block_on(tracker.sessions_for_project(project))
        .with_context(|| format!("Failed to load sessions for {project}"))?;

    if json {
        println!("{}", format_json(&sessions, pretty)?);
    } else {
        print!("{}", render_table(project, &sessions));
    }
    Ok(())
}

fn render_table(project: &str, sessions: &[Session]) -> String {
    let mut out = String::new();
    if sessions.is_empty() {
        let _ = writeln!(out, "No sessions recorded for {project}.");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<36}  {:<20}  {:<20}  {:>9}  {:>7}  STATUS",
        "ID", "START", "END", "DURATION", "CHANGES"
    );
    for session in query::sorted_by_start(sessions) {
        let end = session
            .end_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<36}  {:<20}  {:<20}  {:>9}  {:>7}  {}",
            session.id,
            session.start_time.format("%Y-%m-%d %H:%M:%S"),
            end,
            format_duration(session.duration),
            session.logs.len(),
            session.status
        );
    }
    let _ = writeln!(
        out,
        "\nTotal: {} across {} session(s)",
        format_duration(query::total_duration(sessions, project)),
        sessions.len()
    );
    out
}

/// `H:MM:SS`, rounded down to the second.
fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00:00");
        assert_eq!(format_duration(59.9), "0:00:59");
        assert_eq!(format_duration(3661.0), "1:01:01");
        assert_eq!(format_duration(-5.0), "0:00:00");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_table("p1", &[]), "No sessions recorded for p1.\n");
    }

    #[test]
    fn test_render_sorted_with_total() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let later = Session::manual("p1", t0 + Duration::hours(3), t0 + Duration::hours(4))
            .with_id("later");
        let early = Session::manual("p1", t0, t0 + Duration::minutes(30)).with_id("early");

        let table = render_table("p1", &[later, early]);
        let early_at = table.find("early").unwrap();
        let later_at = table.find("later").unwrap();
        assert!(early_at < later_at);
        assert!(table.contains("2024-01-02 09:00:00"));
        assert!(table.contains("Total: 1:30:00 across 2 session(s)"));
    }
}
