//! Post-write hooks layered over a primary [`Store`].

use crate::Store;
use crate::error::{MirrorError, Result};
use serde_json::Value;
use tracing::warn;

/// Side effect run after a successful primary write.
pub trait WriteHook: Send + Sync {
    fn after_write(&self, key: &str, value: &Value) -> std::result::Result<(), MirrorError>;
}

/// A [`Store`] that runs `hook` after every successful write to `inner`.
///
/// The hook's outcome never changes the write result: the primary store is
/// the only source of truth, so a failed hook is logged and forgotten.
#[derive(Debug, Clone)]
pub struct MirroredStore<S, H> {
    inner: S,
    hook: H,
}

impl<S: Store, H: WriteHook> MirroredStore<S, H> {
    pub fn new(inner: S, hook: H) -> Self {
        Self { inner, hook }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }
}

impl<S: Store, H: WriteHook> Store for MirroredStore<S, H> {
    fn read(&self, key: &str, default: Value) -> Value {
        self.inner.read(key, default)
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        self.inner.write(key, value)?;
        if let Err(e) = self.hook.after_write(key, value) {
            warn!(key, error = %e, "post-write hook failed; local write kept");
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys()
    }
}
