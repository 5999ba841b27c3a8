//! PostgREST client for a Supabase project.

use crate::error::MirrorError;
use crate::mirror::{MirrorClient, MirrorConfig};
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Talks to `{url}/rest/v1/{table}` with the project's API key.
///
/// Uses reqwest's blocking client: call it from a plain thread (or
/// `spawn_blocking`), never directly on an async executor.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(config: &MirrorConfig) -> Result<Self, MirrorError> {
        if !config.is_complete() {
            return Err(MirrorError::Config("url and key are required".into()));
        }
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(MirrorError::Config(format!(
                "url must be http(s): {}",
                config.url
            )));
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.key.clone(),
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn check(
        table: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, MirrorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(MirrorError::Status {
            table: table.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

impl MirrorClient for SupabaseClient {
    fn upsert(&self, table: &str, rows: &[Value]) -> Result<(), MirrorError> {
        let response = self
            .http
            .post(self.table_url(table))
            .query(&[("on_conflict", "id")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()?;
        Self::check(table, response)?;
        Ok(())
    }

    fn select_all(&self, table: &str) -> Result<Vec<Value>, MirrorError> {
        let response = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "*")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()?;
        Ok(Self::check(table, response)?.json()?)
    }
}
