//! In-process backend, mainly for tests and throwaway runs.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entry::CacheEntry;
use crate::error::StorageError;
use crate::storage::{BackendKind, Storage, WriteConcurrency};

/// A [`Storage`] held in a hash map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for MemoryStore {
    fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError> {
        self.write().insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        Ok(self.read().get(key).cloned())
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.read().contains_key(key))
    }

    fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.write().remove(key).is_some())
    }

    fn destroy(&self) -> Result<(), StorageError> {
        self.write().clear();
        Ok(())
    }

    fn write_concurrency(&self) -> WriteConcurrency {
        WriteConcurrency::MultiWriter
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
