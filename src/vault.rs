//! Durable key-value vault
//!
//! Single point of truth for everything the platform persists. Every
//! collection is a JSON string stored under a well-known key, namespaced
//! by the prefix conventions in [`crate::session`]:
//! - `user_<principalId>_<collection>` for owner copies
//! - `shared_<collection>` for cross-principal mirrors
//! - unprefixed keys for session pointers and the principal registry
//!
//! The vault itself knows nothing about namespaces or record shapes. It
//! stores opaque strings; the record store layers list semantics on top.

use crate::error::StoreError;
use sled::Db;
use std::path::Path;
use tracing::info;

/// Durable string-to-string store backed by sled
pub struct Vault {
    db: Db,
}

impl Vault {
    /// Open or create the vault database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened vault");
        Ok(Self { db })
    }

    /// Open a throwaway vault that leaves nothing on disk. Test-only
    /// convenience; production callers go through [`Vault::open`].
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Store a value, overwriting any previous value for the key
    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    /// Fetch a value. Absent keys are `None`, never an error.
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.db.get(key.as_bytes())? {
            Some(value) => Ok(Some(String::from_utf8_lossy(&value).into_owned())),
            None => Ok(None),
        }
    }

    /// Remove a key. Returns whether the key was present.
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.db.remove(key.as_bytes())?.is_some())
    }

    /// List every key in the vault
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for item in self.db.iter() {
            let (key, _) = item?;
            if let Ok(key) = String::from_utf8(key.to_vec()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// List keys under a namespace prefix
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for item in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            if let Ok(key) = String::from_utf8(key.to_vec()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Get vault statistics
    pub fn stats(&self) -> Result<VaultStats, StoreError> {
        Ok(VaultStats {
            total_keys: self.db.len() as u64,
            size_on_disk_bytes: self.db.size_on_disk()?,
        })
    }
}

/// Vault statistics
#[derive(Debug, Clone)]
pub struct VaultStats {
    pub total_keys: u64,
    pub size_on_disk_bytes: u64,
}
