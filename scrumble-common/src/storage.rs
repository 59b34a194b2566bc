//! Durable per-browser key-value storage
//!
//! The client keeps everything it remembers about this "browser" (fingerprint,
//! vote ledger, overrides, seeded tallies) as JSON strings under fixed keys.
//! Storage is allowed to fail: callers degrade to session-only behavior and
//! never let a storage error escape the reconciliation path.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Storage key of the anonymous browser fingerprint
pub const FINGERPRINT_KEY: &str = "scrumble-fp";
/// Storage key of the local vote ledger
pub const VOTED_KEY: &str = "scrumble-voted";
/// Storage key of the local-UI override layer
pub const UI_OVERRIDES_KEY: &str = "scrumble-ui-overrides";
/// Storage key of cached seed tallies
pub const SEED_VOTES_KEY: &str = "scrumble-seed-votes";

/// String-keyed storage that survives reloads
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Shared handle used by every store in this crate
pub type SharedStore = Arc<dyn DurableStore>;

/// Read and decode a JSON value, `Ok(None)` when the key is absent
pub fn read_json<T: DeserializeOwned>(store: &dyn DurableStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub fn write_json<T: Serialize>(store: &dyn DurableStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Session-only storage
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::StorageUnavailable("memory store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::StorageUnavailable("memory store lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::StorageUnavailable("memory store lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object file
///
/// The file is read on first access and rewritten atomically (temp file +
/// rename) on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Storage file is corrupt, starting empty"
                    );
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::StorageUnavailable(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::StorageUnavailable(format!("{}: {}", parent.display(), e)))?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)
            .map_err(|e| Error::StorageUnavailable(format!("{}: {}", temp_path.display(), e)))?;
        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| Error::StorageUnavailable(format!("{}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), keys = entries.len(), "Storage file written");
        Ok(())
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| Error::StorageUnavailable("file store lock poisoned".to_string()))?;
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        match guard.as_mut() {
            Some(entries) => f(entries),
            None => Err(Error::Internal("file store cache missing".to_string())),
        }
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|entries| Ok(entries.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| {
            let previous = entries.insert(key.to_string(), value.to_string());
            if let Err(e) = self.persist(entries) {
                // Keep memory and disk in agreement
                match previous {
                    Some(old) => entries.insert(key.to_string(), old),
                    None => entries.remove(key),
                };
                return Err(e);
            }
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_entries(|entries| {
            if let Some(old) = entries.remove(key) {
                if let Err(e) = self.persist(entries) {
                    entries.insert(key.to_string(), old);
                    return Err(e);
                }
            }
            Ok(())
        })
    }
}

/// Storage that is switched off (private mode, quota exhausted, unwritable
/// data folder). Every call fails.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn shared(reason: impl Into<String>) -> SharedStore {
        Arc::new(Self::new(reason))
    }
}

impl DurableStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::StorageUnavailable(self.reason.clone()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::StorageUnavailable(self.reason.clone()))
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::StorageUnavailable(self.reason.clone()))
    }
}
