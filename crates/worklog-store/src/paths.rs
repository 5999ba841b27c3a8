use crate::error::{Result, StoreError};
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "WORKLOG_DATA_DIR";

const APP_DIR_NAME: &str = "worklog";

/// Resolves where store files live.
///
/// Order: an explicit directory set with [`with_dir`](DataDir::with_dir),
/// then `$WORKLOG_DATA_DIR`, then the platform data directory
/// (`~/.local/share/worklog`, `~/Library/Application Support/worklog`, ...).
#[derive(Debug, Clone, Default)]
pub struct DataDir {
    dir: Option<PathBuf>,
}

impl DataDir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn resolve(&self) -> Result<PathBuf> {
        resolve_with(
            self.dir.clone(),
            std::env::var_os(DATA_DIR_ENV),
            dirs::data_dir(),
        )
    }
}

fn resolve_with(
    explicit: Option<PathBuf>,
    env: Option<OsString>,
    platform: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    if let Some(dir) = env.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    platform
        .map(|base| base.join(APP_DIR_NAME))
        .ok_or(StoreError::NoDataDirectory)
}
