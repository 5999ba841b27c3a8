//! Append-only record of finished sessions, kept under one store key.

use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};
use worklog::{Session, query};
use worklog_store::{Result, Store};

pub const SESSIONS_KEY: &str = "sessions";

/// Session history backed by the `sessions` key of a shared [`Store`].
///
/// Appends rewrite the whole array. Rows that do not parse as a [`Session`]
/// are skipped when reading but preserved when appending.
#[derive(Clone)]
pub struct SessionHistory {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for SessionHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHistory").finish_non_exhaustive()
    }
}

impl SessionHistory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn rows(&self) -> Vec<Value> {
        match self.store.read(SESSIONS_KEY, json!([])) {
            Value::Array(rows) => rows,
            other => {
                warn!(
                    kind = value_kind(&other),
                    "session history is not an array; treating as empty"
                );
                Vec::new()
            }
        }
    }

    pub fn append(&self, session: &Session) -> Result<()> {
        let mut rows = self.rows();
        rows.push(serde_json::to_value(session)?);
        self.store.write(SESSIONS_KEY, &Value::Array(rows))?;
        debug!(
            session_id = %session.id,
            project_id = %session.project_id,
            "appended session to history"
        );
        Ok(())
    }

    pub fn all(&self) -> Vec<Session> {
        self.rows()
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Session>(row) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable session row");
                    None
                }
            })
            .collect()
    }

    /// Sessions recorded for `project_id`, in stored order.
    pub fn for_project(&self, project_id: &str) -> Vec<Session> {
        let all = self.all();
        query::by_project(&all, project_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Seconds tracked across the completed sessions of `project_id`.
    pub fn total_duration(&self, project_id: &str) -> f64 {
        query::total_duration(&self.all(), project_id)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
