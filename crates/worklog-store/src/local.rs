//! File-backed JSON store: one `<key>.json` document per key.
//!
//! Every read re-parses the file and every write replaces it in full through
//! a temp file and rename, so readers never observe a half-written document.
//! There is no in-process cache and no locking; concurrent writers to the
//! same key race and the last rename wins.

use crate::Store;
use crate::error::{Result, StoreError};
use crate::paths::DataDir;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Open a store in the directory chosen by [`DataDir`].
    pub fn at_default_location() -> Result<Self> {
        Self::open(DataDir::new().resolve()?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Backing file for `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }

    fn seed(&self, key: &str, path: &Path, default: Value) -> Value {
        let content = match serde_json::to_string_pretty(&default) {
            Ok(content) => content,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize default; not seeding");
                return default;
            }
        };

        let mut temp = match NamedTempFile::new_in(&self.dir) {
            Ok(temp) => temp,
            Err(e) => {
                warn!(key, error = %e, "failed to create temp file for seed");
                return default;
            }
        };
        if let Err(e) = temp.write_all(content.as_bytes()).and_then(|_| temp.flush()) {
            warn!(key, error = %e, "failed to write seed");
            return default;
        }

        match temp.persist_noclobber(path) {
            Ok(_) => {
                debug!(key, "seeded store key with default");
                default
            }
            // Someone wrote the key between our read and the seed; theirs wins.
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                read_file(key, path).unwrap_or(default)
            }
            Err(e) => {
                warn!(key, error = %e.error, "failed to persist seed");
                default
            }
        }
    }

    fn replace(&self, path: &Path, content: &str) -> Result<()> {
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;
        temp.persist(path).map_err(|e| StoreError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

impl Store for JsonStore {
    fn read(&self, key: &str, default: Value) -> Value {
        let path = match self.path_for(key) {
            Ok(path) => path,
            Err(e) => {
                warn!(key, error = %e, "rejected store read");
                return default;
            }
        };

        match fs::metadata(&path) {
            Ok(_) => read_file(key, &path).unwrap_or(default),
            Err(e) if e.kind() == ErrorKind::NotFound => self.seed(key, &path, default),
            Err(e) => {
                warn!(key, error = %e, "failed to stat store file");
                default
            }
        }
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key)?;
        let content = serde_json::to_string_pretty(value)?;
        self.replace(&path, &content).inspect_err(|e| {
            error!(key, path = %path.display(), error = %e, "failed to write store file");
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some(EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && validate_key(stem).is_ok()
                && path.is_file()
            {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Parse a store file. Failures are logged and the file is left untouched.
fn read_file(key: &str, path: &Path) -> Option<Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(key, error = %e, "failed to read store file; using default");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, path = %path.display(), error = %e, "corrupt store file; using default");
            None
        }
    }
}

/// Keys map straight to file names inside the store directory.
pub fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && !key.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
