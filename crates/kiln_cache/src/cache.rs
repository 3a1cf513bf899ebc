//! The cache facade used by the scheduler and the CLI.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kiln_common::{Fingerprint, Value};
use serde::de::DeserializeOwned;

use crate::db::FileDb;
use crate::dir::DirStore;
use crate::entry::{BuildMeta, CacheEntry};
use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::storage::{BackendKind, Storage, WriteConcurrency};

/// Recorded build duration of one cached target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTime {
    /// Target name.
    pub name: String,
    /// How long the command ran.
    pub elapsed: Duration,
    /// Seconds since the Unix epoch when the build finished.
    pub built_at: u64,
}

/// A shared handle to a storage backend.
///
/// Cloning is cheap; all clones see the same store.
#[derive(Clone)]
pub struct Cache {
    storage: Arc<dyn Storage>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("kind", &self.storage.kind())
            .finish()
    }
}

impl Cache {
    /// Wraps a backend.
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Wraps an already shared backend.
    pub fn from_arc(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Opens a backend of the given kind at `path`. The memory backend ignores
    /// the path.
    pub fn open(kind: BackendKind, path: &Path) -> Result<Self, StorageError> {
        let cache = match kind {
            BackendKind::Dir => Self::new(DirStore::new(path)),
            BackendKind::Db => Self::new(FileDb::open(path)?),
            BackendKind::Memory => Self::in_memory(),
        };
        tracing::debug!(backend = %kind, path = %path.display(), "opened cache");
        Ok(cache)
    }

    /// A fresh in-memory cache.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// The underlying backend.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Backend kind.
    pub fn kind(&self) -> BackendKind {
        self.storage.kind()
    }

    /// Backend concurrency model.
    pub fn write_concurrency(&self) -> WriteConcurrency {
        self.storage.write_concurrency()
    }

    /// Stores a value together with the fingerprint it was built under.
    pub fn put(
        &self,
        key: &str,
        value: Value,
        fingerprint: Fingerprint,
        meta: BuildMeta,
    ) -> Result<(), StorageError> {
        self.put_entry(
            key,
            &CacheEntry {
                value,
                fingerprint,
                meta,
            },
        )
    }

    /// Stores a complete entry.
    pub fn put_entry(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError> {
        self.storage.put(key, entry)
    }

    /// Loads the full entry under `key`.
    pub fn entry(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        self.storage.get(key)
    }

    /// Loads the value under `key`.
    pub fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.storage.get(key)?.map(|e| e.value))
    }

    /// Loads and decodes the value under `key`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key)? {
            Some(value) => value
                .decode()
                .map(Some)
                .map_err(|e| StorageError::Serialization {
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Loads the fingerprint stored under `key`.
    pub fn fingerprint(&self, key: &str) -> Result<Option<Fingerprint>, StorageError> {
        Ok(self.storage.get(key)?.map(|e| e.fingerprint))
    }

    /// Returns `true` if an entry exists under `key`.
    pub fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.storage.exists(key)
    }

    /// All stored keys, sorted.
    pub fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        self.storage.list_keys()
    }

    /// Removes one entry. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.storage.remove(key)
    }

    /// Deletes the entire cache.
    pub fn destroy(&self) -> Result<(), StorageError> {
        self.storage.destroy()
    }

    /// Build durations of every readable entry, sorted by name. Corrupt
    /// entries are skipped with a warning.
    pub fn build_times(&self) -> Result<Vec<BuildTime>, StorageError> {
        let mut times = Vec::new();
        for key in self.list_keys()? {
            match self.entry(&key) {
                Ok(Some(entry)) => times.push(BuildTime {
                    name: key,
                    elapsed: entry.meta.elapsed,
                    built_at: entry.meta.built_at,
                }),
                Ok(None) => {}
                Err(e) if e.is_corrupt() => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable cache entry");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(times)
    }
}
