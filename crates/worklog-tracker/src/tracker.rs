//! The session state machine: `Idle` until a session starts, `Active` until
//! it is stopped.

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::history::SessionHistory;
use crate::watch::{ActivitySink, WatchHandle, spawn_watch};
use chrono::Utc;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{info, warn};
use worklog::{Session, TrackerEvent, seconds_between};
use worklog_store::StoreError;

/// One millisecond, the precision durations are stored at.
const DURATION_TOLERANCE: f64 = 0.001;

struct ActiveSession {
    session: Arc<Mutex<Session>>,
    watch: WatchHandle,
}

impl ActiveSession {
    fn snapshot(&self) -> Session {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Owns the single current-session slot.
///
/// `start_session` and `stop_session` take `&mut self`, so the
/// check-and-set on the slot can never interleave with another start.
/// Share a tracker between tasks behind an async mutex if needed.
pub struct SessionTracker {
    history: SessionHistory,
    config: TrackerConfig,
    events: broadcast::Sender<TrackerEvent>,
    active: Option<ActiveSession>,
}

impl std::fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTracker")
            .field("config", &self.config)
            .field("active", &self.active.as_ref().map(|a| a.snapshot().id))
            .finish()
    }
}

impl SessionTracker {
    pub fn new(history: SessionHistory, config: TrackerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            history,
            config,
            events,
            active: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// Register an observer for activity and watch-error notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Begin tracking `root` for `project_id`.
    ///
    /// Fails without side effects if a session is already active, if `root`
    /// is not a readable directory, or if the OS watch cannot be opened.
    /// Must be called from within a Tokio runtime.
    pub fn start_session(&mut self, project_id: &str, root: impl AsRef<Path>) -> Result<Session> {
        if let Some(active) = &self.active {
            return Err(TrackerError::AlreadyActive {
                session_id: active.snapshot().id,
            });
        }

        let root = root.as_ref();
        let metadata = std::fs::metadata(root).map_err(|source| TrackerError::Root {
            root: root.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(TrackerError::NotADirectory(root.to_path_buf()));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TrackerError::NoRuntime)?;

        let session = Session::start(project_id, Some(root.to_string_lossy().into_owned()));
        let shared = Arc::new(Mutex::new(session.clone()));
        let sink = ActivitySink::new(Arc::clone(&shared), self.events.clone());
        let watch = spawn_watch(&runtime, root, &self.config, sink).map_err(|source| {
            TrackerError::Watch {
                root: root.to_path_buf(),
                source,
            }
        })?;

        info!(
            session_id = %session.id,
            project_id,
            root = %root.display(),
            "session started"
        );
        self.active = Some(ActiveSession {
            session: shared,
            watch,
        });
        Ok(session)
    }

    /// End the active session and append it to history.
    ///
    /// Returns `Ok(None)` when no session is active. The slot is cleared only
    /// once the history write has finished; if the write fails the completed
    /// session is returned inside [`TrackerError::Persist`]. If this future is
    /// dropped before then, the session stays in the slot, already completed,
    /// and a later call picks up where it left off. A drop during the history
    /// write itself may still let that write land, so the retry can append a
    /// second copy.
    pub async fn stop_session(&mut self) -> Result<Option<Session>> {
        let Some(active) = self.active.as_mut() else {
            return Ok(None);
        };

        active.watch.stop().await;
        let session = {
            let mut session = active.session.lock().unwrap_or_else(|e| e.into_inner());
            session.complete(Utc::now());
            session.clone()
        };
        info!(
            session_id = %session.id,
            project_id = %session.project_id,
            duration = session.duration,
            changes = session.logs.len(),
            "session stopped"
        );

        let saved = self.append(session.clone()).await;
        self.active = None;
        match saved {
            Ok(()) => Ok(Some(session)),
            Err(source) => {
                warn!(session_id = %session.id, error = %source, "failed to save session");
                Err(TrackerError::Persist {
                    session: Box::new(session),
                    source,
                })
            }
        }
    }

    /// Snapshot of the active session, if any.
    pub fn current_session(&self) -> Option<Session> {
        self.active.as_ref().map(ActiveSession::snapshot)
    }

    /// Every stored session of `project_id`, in stored order.
    pub async fn sessions_for_project(&self, project_id: &str) -> Result<Vec<Session>> {
        let history = self.history.clone();
        let project_id = project_id.to_string();
        blocking(move || Ok(history.for_project(&project_id))).await
    }

    /// Append an externally built (backfilled or edited) session to history.
    ///
    /// Does not require the tracker to be idle and never touches the
    /// current-session slot.
    pub async fn save_manual_session(&self, session: Session) -> Result<()> {
        validate_manual(&session)?;
        info!(session_id = %session.id, project_id = %session.project_id, "saving manual session");
        self.append(session).await.map_err(TrackerError::Store)
    }

    /// History writes may reach the blocking remote mirror, so they run off
    /// the async executor.
    async fn append(&self, session: Session) -> std::result::Result<(), StoreError> {
        let history = self.history.clone();
        match tokio::task::spawn_blocking(move || history.append(&session)).await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Io(std::io::Error::other(e))),
        }
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            warn!(
                session_id = %active.snapshot().id,
                "tracker dropped with an active session; it was not saved"
            );
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(TrackerError::Store(StoreError::Io(std::io::Error::other(e)))))
}

fn validate_manual(session: &Session) -> Result<()> {
    if session.is_active() {
        return Err(TrackerError::InvalidSession(
            "manual sessions must be completed".to_string(),
        ));
    }
    match session.end_time {
        None => Err(TrackerError::InvalidSession(
            "completed session has no end time".to_string(),
        )),
        Some(end) if end < session.start_time => Err(TrackerError::InvalidSession(
            "end time is before start time".to_string(),
        )),
        Some(end) => {
            let expected = seconds_between(session.start_time, end);
            if (session.duration - expected).abs() > DURATION_TOLERANCE {
                return Err(TrackerError::InvalidSession(format!(
                    "duration {}s does not match the {expected}s between start and end",
                    session.duration
                )));
            }
            Ok(())
        }
    }
}
