#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod history;
pub mod tracker;
mod watch;

pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use history::{SESSIONS_KEY, SessionHistory};
pub use tracker::SessionTracker;
pub use worklog::{ActivityEntry, ChangeKind, Session, SessionStatus, TrackerEvent};
