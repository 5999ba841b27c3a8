#![doc = include_str!("../README.md")]

pub mod query;
mod types;

pub use types::{
    ActivityEntry, ChangeKind, Session, SessionStatus, TrackerEvent, seconds_between,
};
