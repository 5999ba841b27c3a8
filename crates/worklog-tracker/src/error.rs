use std::path::PathBuf;
use thiserror::Error;
use worklog::Session;
use worklog_store::StoreError;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("A session is already active: {session_id}")]
    AlreadyActive { session_id: String },

    #[error("Cannot watch {}: {source}", root.display())]
    Root {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to start file watcher on {}: {source}", root.display())]
    Watch {
        root: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Session tracking requires a Tokio runtime")]
    NoRuntime,

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// The session completed but could not be appended to history. The
    /// completed record is handed back so the caller can retry or export it.
    #[error("Session {} completed but was not saved: {source}", session.id)]
    Persist {
        session: Box<Session>,
        #[source]
        source: StoreError,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl TrackerError {
    /// The completed session carried by a persistence failure, if any.
    pub fn into_unsaved_session(self) -> Option<Session> {
        match self {
            TrackerError::Persist { session, .. } => Some(*session),
            _ => None,
        }
    }
}
