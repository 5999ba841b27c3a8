#![doc = include_str!("../README.md")]

pub mod bulk;
pub mod error;
pub mod hook;
pub mod local;
pub mod mirror;
pub mod paths;
pub mod supabase;

pub use bulk::{ImportReport, export_all, import_all};
pub use error::{MirrorError, Result, StoreError};
pub use hook::{MirroredStore, WriteHook};
pub use local::JsonStore;
pub use mirror::{MirrorClient, MirrorConfig, RemoteMirror};
pub use paths::{DATA_DIR_ENV, DataDir};
pub use supabase::SupabaseClient;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Key under which application settings (including mirror credentials) live.
pub const SETTINGS_KEY: &str = "settings";

/// Whole-document key/value persistence.
///
/// Each key holds one JSON value that is always read and written in full.
/// Implementations must never fail a read: a missing key is seeded with the
/// caller's default, and an unreadable one yields the default.
pub trait Store: Send + Sync {
    /// Current value for `key`, seeding `default` if the key does not exist.
    fn read(&self, key: &str, default: Value) -> Value;

    /// Replace the value for `key`.
    fn write(&self, key: &str, value: &Value) -> Result<()>;

    /// Keys that currently hold a value, sorted.
    fn keys(&self) -> Result<Vec<String>>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn read(&self, key: &str, default: Value) -> Value {
        (**self).read(key, default)
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        (**self).write(key, value)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn read(&self, key: &str, default: Value) -> Value {
        (**self).read(key, default)
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        (**self).write(key, value)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

/// Typed access on top of [`Store`].
pub trait StoreExt: Store {
    /// Read `key` as `T`. A stored value of the wrong shape is logged and
    /// replaced by `default` in the result (the file is left as is).
    fn load<T>(&self, key: &str, default: T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        let seed = match serde_json::to_value(&default) {
            Ok(seed) => seed,
            Err(e) => {
                tracing::warn!(key, error = %e, "default is not serializable");
                return default;
            }
        };
        match serde_json::from_value(self.read(key, seed)) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value has unexpected shape; using default");
                default
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.write(key, &serde_json::to_value(value)?)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
