//! Filtering and aggregation over session collections.

use crate::types::{ChangeKind, Session, SessionStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Sessions belonging to `project_id`, in stored order.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use worklog::{Session, query};
///
/// let t0 = Utc.timestamp_opt(0, 0).unwrap();
/// let t1 = Utc.timestamp_opt(60, 0).unwrap();
/// let sessions = vec![
///     Session::manual("p1", t0, t1),
///     Session::manual("p2", t0, t1),
///     Session::manual("p1", t0, t1),
/// ];
///
/// assert_eq!(query::by_project(&sessions, "p1").len(), 2);
/// ```
pub fn by_project<'a>(sessions: &'a [Session], project_id: &str) -> Vec<&'a Session> {
    sessions
        .iter()
        .filter(|s| s.project_id == project_id)
        .collect()
}

/// Sessions that have finished.
pub fn completed(sessions: &[Session]) -> Vec<&Session> {
    sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .collect()
}

/// Sessions whose start falls in `[start, end]`.
pub fn started_between(
    sessions: &[Session],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<&Session> {
    sessions
        .iter()
        .filter(|s| s.start_time >= start && s.start_time <= end)
        .collect()
}

/// Total recorded seconds across the completed sessions of a project.
pub fn total_duration(sessions: &[Session], project_id: &str) -> f64 {
    sessions
        .iter()
        .filter(|s| s.project_id == project_id && s.status == SessionStatus::Completed)
        .map(|s| s.duration)
        .sum()
}

/// Clone and order sessions by start time, oldest first.
pub fn sorted_by_start<'a, I>(sessions: I) -> Vec<Session>
where
    I: IntoIterator<Item = &'a Session>,
{
    let mut out: Vec<Session> = sessions.into_iter().cloned().collect();
    out.sort_by_key(|s| s.start_time);
    out
}

/// Number of log entries of each kind in a session.
pub fn change_counts(session: &Session) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for kind in [ChangeKind::Added, ChangeKind::Modified, ChangeKind::Removed] {
        counts.insert(kind.as_str(), 0);
    }
    for entry in &session.logs {
        *counts.entry(entry.kind.as_str()).or_insert(0) += 1;
    }
    counts
}
