//! The backend-neutral storage interface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entry::CacheEntry;
use crate::error::StorageError;

/// Whether a backend tolerates concurrent writers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteConcurrency {
    /// Workers may write their own entries directly.
    MultiWriter,
    /// All writes must go through one coordinating thread.
    SingleWriter,
}

/// Available storage backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One file per key in a directory.
    #[default]
    Dir,
    /// A single append-only database file.
    Db,
    /// In-process memory, lost at exit.
    Memory,
}

impl BackendKind {
    /// Lowercase name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Dir => "dir",
            BackendKind::Db => "db",
            BackendKind::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dir" | "directory" => Ok(BackendKind::Dir),
            "db" | "database" => Ok(BackendKind::Db),
            "memory" | "mem" => Ok(BackendKind::Memory),
            other => Err(StorageError::UnknownBackend(other.to_string())),
        }
    }
}

/// A durable key-value store of cache entries.
///
/// Every `put` is all-or-nothing per key: a concurrent or later reader sees
/// either the previous entry or the new one, never a mix.
pub trait Storage: Send + Sync {
    /// Stores `entry` under `key`, replacing any previous entry.
    fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError>;

    /// Loads the entry under `key`.
    ///
    /// Returns `Ok(None)` for a missing key and [`StorageError::Corrupt`] for
    /// an entry that fails validation.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError>;

    /// Returns `true` if an entry exists under `key`.
    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// All stored keys, sorted.
    fn list_keys(&self) -> Result<Vec<String>, StorageError>;

    /// Removes the entry under `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// Deletes the whole store. Later writes start from empty.
    fn destroy(&self) -> Result<(), StorageError>;

    /// Concurrency model of this backend.
    fn write_concurrency(&self) -> WriteConcurrency;

    /// Which backend this is.
    fn kind(&self) -> BackendKind;
}
