//! Whole-store export and import.
//!
//! Both operate key by key through [`Store`]. There is no transaction across
//! keys: an import that fails halfway leaves the earlier keys written.

use crate::Store;
use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Every stored key and its current value.
pub fn export_all(store: &dyn Store) -> Result<Map<String, Value>> {
    let mut bundle = Map::new();
    for key in store.keys()? {
        let value = store.read(&key, Value::Null);
        bundle.insert(key, value);
    }
    Ok(bundle)
}

/// Outcome of [`import_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub written: Vec<String>,
    /// Keys that could not be written, with the reason.
    pub failed: Vec<(String, String)>,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Write each key of `bundle` into `store`.
pub fn import_all(store: &dyn Store, bundle: &Map<String, Value>) -> ImportReport {
    let mut report = ImportReport::default();
    for (key, value) in bundle {
        match store.write(key, value) {
            Ok(()) => report.written.push(key.clone()),
            Err(e) => {
                warn!(key = %key, error = %e, "import skipped key");
                report.failed.push((key.clone(), e.to_string()));
            }
        }
    }
    info!(
        written = report.written.len(),
        failed = report.failed.len(),
        "import finished"
    );
    report
}
