//! Per-symbol lock files.

use chrono::Utc;
use tracing::{debug, warn};

use crate::{BlobStore, Result, StorageError};

/// Exclusive hold on a symbol, released on drop.
#[derive(Debug)]
pub struct SymbolLock<'a> {
    store: &'a dyn BlobStore,
    path: String,
}

impl<'a> SymbolLock<'a> {
    /// Takes the lock at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another holder has it.
    pub fn acquire(store: &'a dyn BlobStore, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let owner = format!("pid={} at={}\n", std::process::id(), Utc::now().to_rfc3339());
        if !store.create_new(&path, owner.as_bytes())? {
            return Err(StorageError::Locked(path));
        }
        debug!(path = %path, "lock acquired");
        Ok(Self { store, path })
    }

    /// Path of the lock blob.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for SymbolLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.remove(&self.path) {
            warn!(path = %self.path, error = %e, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBlobStore;

    #[test]
    fn test_lock_is_exclusive_and_released() {
        let store = MemoryBlobStore::new();
        {
            let lock = SymbolLock::acquire(&store, "FX/lock/EURUSD.lock").unwrap();
            assert_eq!(lock.path(), "FX/lock/EURUSD.lock");
            assert!(matches!(
                SymbolLock::acquire(&store, "FX/lock/EURUSD.lock"),
                Err(StorageError::Locked(_))
            ));
            assert!(SymbolLock::acquire(&store, "FX/lock/GBPUSD.lock").is_ok());
        }
        assert!(!store.exists("FX/lock/EURUSD.lock").unwrap());
        assert!(SymbolLock::acquire(&store, "FX/lock/EURUSD.lock").is_ok());
    }
}
