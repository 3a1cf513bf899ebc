//! Directory backend: one file per key.
//!
//! Entries live at `<root>/entries/<escaped key>.entry`. A write goes to a
//! temporary file in the same directory and is renamed over the final path,
//! so each key is replaced atomically and independent keys can be written
//! from many threads at once.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::entry::{decode_entry, encode_entry, CacheEntry};
use crate::error::StorageError;
use crate::storage::{BackendKind, Storage, WriteConcurrency};

const ENTRY_EXT: &str = "entry";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A [`Storage`] backed by a directory of entry files.
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Opens (without creating) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entries_dir(&self) -> PathBuf {
        self.root.join("entries")
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.entries_dir()
            .join(format!("{}.{ENTRY_EXT}", escape_key(key)))
    }
}

impl Storage for DirStore {
    fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError> {
        let dir = self.entries_dir();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let bytes = encode_entry(entry)?;
        let path = self.entry_path(key);
        let temp = dir.join(format!(
            ".{}.{}.{}.tmp",
            escape_key(key),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        std::fs::write(&temp, &bytes).map_err(|e| StorageError::io(&temp, e))?;
        if let Err(e) = std::fs::rename(&temp, &path) {
            let _ = std::fs::remove_file(&temp);
            return Err(StorageError::io(&path, e));
        }
        tracing::trace!(key, bytes = bytes.len(), "wrote cache entry");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let path = self.entry_path(key);
        match std::fs::read(&path) {
            Ok(raw) => decode_entry(key, &raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entry_path(key).is_file())
    }

    fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let dir = self.entries_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| StorageError::io(&dir, e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.starts_with('.'))
                .and_then(unescape_key)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    /// Removes the entries directory. The root itself goes only when nothing
    /// else lives in it, since it may be shared with the project.
    fn destroy(&self) -> Result<(), StorageError> {
        let dir = self.entries_dir();
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io(&dir, e)),
        }
        // Fails harmlessly when the root is missing or still holds other files.
        let _ = std::fs::remove_dir(&self.root);
        Ok(())
    }

    fn write_concurrency(&self) -> WriteConcurrency {
        WriteConcurrency::MultiWriter
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Dir
    }
}

/// Escapes a key into a portable file stem: ASCII alphanumerics, `_` and `-`
/// are kept, every other byte becomes `%XX`.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn unescape_key(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::tests::sample;

    #[test]
    fn key_escaping() {
        assert_eq!(escape_key("model_16"), "model_16");
        assert_eq!(escape_key("lr_0.5"), "lr_0%2E5");
        assert_eq!(escape_key(".."), "%2E%2E");
        assert_eq!(unescape_key("lr_0%2E5").as_deref(), Some("lr_0.5"));
        assert_eq!(unescape_key("bad%2"), None);
    }

    #[test]
    fn layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path().join(".kiln"));
        store.put("fit.v2", &sample("x")).unwrap();
        assert!(dir
            .path()
            .join(".kiln/entries/fit%2Ev2.entry")
            .is_file());
        assert_eq!(store.list_keys().unwrap(), vec!["fit.v2".to_string()]);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());
        store.put("data", &sample("x")).unwrap();
        std::fs::write(dir.path().join("entries/data.entry"), b"garbage").unwrap();
        assert!(store.get("data").unwrap_err().is_corrupt());
    }

    #[test]
    fn destroy_leaves_foreign_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kiln.toml"), "[project]\n").unwrap();
        std::fs::write(dir.path().join("data.csv"), "a\n").unwrap();
        let store = DirStore::new(dir.path());
        store.put("data", &sample("x")).unwrap();

        store.destroy().unwrap();
        assert!(dir.path().join("kiln.toml").is_file());
        assert!(dir.path().join("data.csv").is_file());
        assert!(!dir.path().join("entries").exists());
        assert!(store.list_keys().unwrap().is_empty());
    }

    #[test]
    fn destroy_removes_a_dedicated_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path().join(".kiln"));
        store.put("data", &sample("x")).unwrap();
        store.destroy().unwrap();
        assert!(!dir.path().join(".kiln").exists());
        store.destroy().unwrap();
    }

    #[test]
    fn stray_temp_files_are_not_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());
        store.put("data", &sample("x")).unwrap();
        std::fs::write(dir.path().join("entries/.data.1.0.tmp"), b"partial").unwrap();
        std::fs::write(dir.path().join("entries/.hidden.entry"), b"partial").unwrap();
        assert_eq!(store.list_keys().unwrap(), vec!["data".to_string()]);
    }
}
