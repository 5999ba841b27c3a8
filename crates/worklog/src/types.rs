use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Session
// ============================================================================

/// One timed block of work against a project.
///
/// Sessions are created active by the tracker, accumulate [`ActivityEntry`]
/// records while their directory is watched, and become immutable once
/// [`complete`](Session::complete) has run. Manual (backfilled) sessions are
/// constructed already completed and carry no `root`.
///
/// # JSON shape
///
/// ```json
/// {
///   "id": "5b0c…",
///   "projectId": "proj-1",
///   "startTime": 1767261600000,
///   "endTime": 1767265200000,
///   "duration": 3600.0,
///   "logs": [ { "timestamp": 1767261700000, "filePath": "a.txt", "type": "add" } ],
///   "status": "completed"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub project_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed seconds; `0.0` until the session completes.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub logs: Vec<ActivityEntry>,
    pub status: SessionStatus,
    /// Directory that was watched. Log paths are relative to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Fields written by other clients (notes, descriptions, ...).
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Session {
    /// Create a new active session with a fresh id, starting now.
    pub fn start(project_id: impl Into<String>, root: Option<String>) -> Self {
        Self::start_at(project_id, root, Utc::now())
    }

    /// Timestamps are truncated to milliseconds, the precision they are
    /// stored at.
    pub fn start_at(
        project_id: impl Into<String>,
        root: Option<String>,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            start_time: start.trunc_subsecs(3),
            end_time: None,
            duration: 0.0,
            logs: Vec::new(),
            status: SessionStatus::Active,
            root,
            extra: HashMap::new(),
        }
    }

    /// Build an already-completed session, e.g. time entered by hand.
    pub fn manual(
        project_id: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        let mut session = Self::start_at(project_id, None, start);
        session.complete(end);
        session
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Append an activity entry. Returns `false` (and drops the entry) once
    /// the session has completed.
    pub fn record(&mut self, entry: ActivityEntry) -> bool {
        if !self.is_active() {
            return false;
        }
        self.logs.push(entry);
        true
    }

    /// Close the session at `end`.
    ///
    /// An `end` earlier than the start is clamped to the start so that a
    /// completed session always satisfies `end_time >= start_time`. Calling
    /// this on an already-completed session does nothing.
    pub fn complete(&mut self, end: DateTime<Utc>) {
        if !self.is_active() {
            return;
        }
        let end = end.trunc_subsecs(3).max(self.start_time);
        self.end_time = Some(end);
        self.duration = seconds_between(self.start_time, end);
        self.status = SessionStatus::Completed;
    }

    /// Time elapsed since the start: up to `now` while active, the recorded
    /// span once completed.
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        let end = self.end_time.unwrap_or(now);
        end - self.start_time
    }
}

/// `(end - start)` in seconds at millisecond precision.
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}

// ============================================================================
// Activity
// ============================================================================

/// One filesystem change observed during an active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Path relative to the watched root, `/`-separated.
    pub file_path: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
}

impl ActivityEntry {
    pub fn new(timestamp: DateTime<Utc>, file_path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(3),
            file_path: file_path.into(),
            kind,
        }
    }

    pub fn now(file_path: impl Into<String>, kind: ChangeKind) -> Self {
        Self::new(Utc::now(), file_path, kind)
    }
}

/// Kind of change recorded in an [`ActivityEntry`].
///
/// Serialized with the event names the desktop app has always stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "add")]
    Added,
    #[serde(rename = "unlink")]
    Removed,
    #[serde(rename = "change")]
    Modified,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "add",
            ChangeKind::Removed => "unlink",
            ChangeKind::Modified => "change",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tracker events
// ============================================================================

/// Out-of-band notification pushed to tracker observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TrackerEvent {
    /// A settled change that was appended to the active session.
    Activity(ActivityEntry),
    /// The watch backend reported a problem. The session stays active.
    Error { message: String },
}
