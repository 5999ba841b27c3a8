//! Best-effort replication of array-shaped collections to a remote table.
//!
//! The mirror is never authoritative. When credentials are missing it does
//! nothing; when the remote fails it logs and moves on.

use crate::error::MirrorError;
use crate::hook::WriteHook;
use crate::supabase::SupabaseClient;
use crate::{SETTINGS_KEY, Store};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

type MirrorResult<T> = std::result::Result<T, MirrorError>;

/// Transport to a remote relational store.
pub trait MirrorClient: Send + Sync {
    /// Insert or update `rows` in `table`, resolving conflicts on `id`.
    fn upsert(&self, table: &str, rows: &[Value]) -> MirrorResult<()>;

    /// Every row of `table`.
    fn select_all(&self, table: &str) -> MirrorResult<Vec<Value>>;
}

/// Remote endpoint credentials, stored under `settings.supabaseConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub key: String,
}

impl MirrorConfig {
    pub const SETTINGS_FIELD: &'static str = "supabaseConfig";

    /// Extract credentials from a settings document. Returns `None` unless
    /// both the URL and the key are present and non-blank.
    pub fn from_settings(settings: &Value) -> Option<Self> {
        let raw = settings.get(Self::SETTINGS_FIELD)?;
        let config: MirrorConfig = serde_json::from_value(raw.clone()).ok()?;
        let config = MirrorConfig {
            url: config.url.trim().to_string(),
            key: config.key.trim().to_string(),
        };
        config.is_complete().then_some(config)
    }

    pub fn is_complete(&self) -> bool {
        !self.url.is_empty() && !self.key.is_empty()
    }
}

pub struct RemoteMirror {
    client: Option<Box<dyn MirrorClient>>,
}

impl std::fmt::Debug for RemoteMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMirror")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl RemoteMirror {
    /// Build a mirror from the credentials in `store`'s settings.
    ///
    /// Missing credentials, or a client that cannot be constructed, leave the
    /// mirror disabled: every later sync is a silent no-op.
    pub fn init(store: &dyn Store) -> Self {
        let settings = store.read(SETTINGS_KEY, json!({}));
        let Some(config) = MirrorConfig::from_settings(&settings) else {
            debug!("remote mirror not configured; running local-only");
            return Self::disabled();
        };
        match SupabaseClient::new(&config) {
            Ok(client) => {
                info!(url = %config.url, "remote mirror enabled");
                Self::with_client(client)
            }
            Err(e) => {
                warn!(error = %e, "failed to build remote mirror client; running local-only");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn with_client<C: MirrorClient + 'static>(client: C) -> Self {
        Self {
            client: Some(Box::new(client)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Upsert `records` into `table`, reporting the outcome.
    ///
    /// Returns `Ok(false)` when the mirror is disabled and nothing was sent.
    /// An empty `records` is still sent; it cannot remove remote rows.
    pub fn try_sync_table(&self, table: &str, records: &[Value]) -> MirrorResult<bool> {
        let Some(client) = &self.client else {
            return Ok(false);
        };
        client.upsert(table, records)?;
        debug!(table, rows = records.len(), "mirrored table");
        Ok(true)
    }

    /// Upsert `records` into `table`; failures are logged only.
    pub fn sync_table(&self, table: &str, records: &[Value]) {
        if let Err(e) = self.try_sync_table(table, records) {
            warn!(table, error = %e, "remote mirror sync failed");
        }
    }

    /// Pull every row of `table`. `None` when disabled or on any error.
    pub fn fetch_table(&self, table: &str) -> Option<Vec<Value>> {
        let client = self.client.as_ref()?;
        match client.select_all(table) {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(table, error = %e, "remote mirror fetch failed");
                None
            }
        }
    }
}

impl WriteHook for RemoteMirror {
    /// Only array-shaped values are collections of rows; single objects
    /// (settings and the like) are never mirrored.
    fn after_write(&self, key: &str, value: &Value) -> MirrorResult<()> {
        match value {
            Value::Array(records) => self.try_sync_table(key, records).map(|_| ()),
            _ => Ok(()),
        }
    }
}
