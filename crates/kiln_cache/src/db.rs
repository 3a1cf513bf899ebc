//! Single-file database backend.
//!
//! The database is an append-only log. After an 8-byte file header, every
//! record is framed as
//!
//! ```text
//! [u32 LE body length][16-byte checksum][bincode Record]
//! ```
//!
//! and is either a `Put` carrying a whole [`CacheEntry`] or a `Remove`. Opening
//! the file replays the log into an in-memory index of record offsets; a torn
//! or corrupt tail (an interrupted write) is truncated away, so a key always
//! reads as its last fully written entry. [`FileDb::compact`] rewrites the log
//! with live entries only.
//!
//! One file handle behind a mutex means one writer at a time: the backend
//! declares [`WriteConcurrency::SingleWriter`].

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use kiln_common::{Fingerprint, HashAlgorithm};
use serde::{Deserialize, Serialize};

use crate::entry::CacheEntry;
use crate::error::StorageError;
use crate::storage::{BackendKind, Storage, WriteConcurrency};

/// Magic bytes and format version at the start of every database file.
const DB_MAGIC: [u8; 8] = *b"KILNDB\x00\x01";

/// Length prefix plus checksum.
const FRAME_OVERHEAD: usize = 4 + 16;

#[derive(Serialize, Deserialize)]
enum Record {
    Put { key: String, entry: CacheEntry },
    Remove { key: String },
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    /// Offset of the frame's checksum.
    offset: u64,
    /// Body length.
    len: usize,
}

struct Inner {
    file: Option<File>,
    index: HashMap<String, Slot>,
    end: u64,
    dead: usize,
}

/// A [`Storage`] backed by one append-only file.
pub struct FileDb {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for FileDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDb").field("path", &self.path).finish()
    }
}

impl FileDb {
    /// Opens or creates the database at `path`, replaying its log.
    ///
    /// # Errors
    ///
    /// I/O failures, or [`StorageError::Corrupt`] if the file exists but is not
    /// a kiln database.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let inner = load(&path)?;
        Ok(Self {
            path,
            inner: Mutex::new(inner),
        })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of superseded records that [`FileDb::compact`] would drop.
    pub fn dead_records(&self) -> usize {
        self.lock().dead
    }

    /// Rewrites the log with only the live entries, then swaps it in.
    pub fn compact(&self) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.file.is_none() {
            return Ok(());
        }

        let mut keys: Vec<String> = inner.index.keys().cloned().collect();
        keys.sort();
        let mut out = DB_MAGIC.to_vec();
        for key in keys {
            if let Some(entry) = read_entry(&mut inner, &key)? {
                out.extend_from_slice(&frame(&Record::Put { key, entry })?);
            }
        }

        let temp = self.path.with_extension("compact");
        std::fs::write(&temp, &out).map_err(|e| StorageError::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| StorageError::io(&self.path, e))?;
        let before = inner.end;
        *inner = load(&self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            before,
            after = inner.end,
            "compacted cache database"
        );
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends one framed record and returns the locked state together with
    /// the slot the record landed in.
    fn append(&self, record: &Record) -> Result<(MutexGuard<'_, Inner>, Slot), StorageError> {
        let bytes = frame(record)?;
        let mut inner = self.lock();
        if inner.file.is_none() {
            *inner = load(&self.path)?;
        }
        let end = inner.end;
        let file = inner.file.as_mut().ok_or_else(|| {
            StorageError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "database is closed"),
            )
        })?;

        let written = file
            .seek(SeekFrom::Start(end))
            .and_then(|_| file.write_all(&bytes))
            .and_then(|_| file.flush());
        if let Err(e) = written {
            // Drop whatever part of the frame made it to disk.
            let _ = file.set_len(end);
            return Err(StorageError::io(&self.path, e));
        }
        inner.end = end + bytes.len() as u64;
        let slot = Slot {
            offset: end + 4,
            len: bytes.len() - FRAME_OVERHEAD,
        };
        Ok((inner, slot))
    }
}

impl Storage for FileDb {
    fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError> {
        let record = Record::Put {
            key: key.to_string(),
            entry: entry.clone(),
        };
        let (mut inner, slot) = self.append(&record)?;
        if inner.index.insert(key.to_string(), slot).is_some() {
            inner.dead += 1;
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let mut inner = self.lock();
        read_entry(&mut inner, key)
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.lock().index.contains_key(key))
    }

    fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.lock().index.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        if !self.lock().index.contains_key(key) {
            return Ok(false);
        }
        let (mut inner, _) = self.append(&Record::Remove {
            key: key.to_string(),
        })?;
        let existed = inner.index.remove(key).is_some();
        inner.dead += 2;
        Ok(existed)
    }

    fn destroy(&self) -> Result<(), StorageError> {
        let mut inner = self.lock();
        inner.file = None;
        inner.index.clear();
        inner.end = 0;
        inner.dead = 0;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }

    fn write_concurrency(&self) -> WriteConcurrency {
        WriteConcurrency::SingleWriter
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Db
    }
}

fn encode_record(record: &Record) -> Result<Vec<u8>, StorageError> {
    bincode::serde::encode_to_vec(record, bincode::config::standard()).map_err(|e| {
        StorageError::Serialization {
            reason: e.to_string(),
        }
    })
}

fn frame(record: &Record) -> Result<Vec<u8>, StorageError> {
    let body = encode_record(record)?;
    let checksum = Fingerprint::from_bytes(HashAlgorithm::Xxh3, &body);
    let mut out = Vec::with_capacity(FRAME_OVERHEAD + body.len());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(checksum.as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

fn read_entry(inner: &mut Inner, key: &str) -> Result<Option<CacheEntry>, StorageError> {
    let Some(slot) = inner.index.get(key).copied() else {
        return Ok(None);
    };
    let Some(file) = inner.file.as_mut() else {
        return Ok(None);
    };

    let mut raw = vec![0u8; 16 + slot.len];
    file.seek(SeekFrom::Start(slot.offset))
        .and_then(|_| file.read_exact(&mut raw))
        .map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            reason: format!("unreadable record: {e}"),
        })?;

    let corrupt = |reason: &str| StorageError::Corrupt {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let (checksum, body) = raw.split_at(16);
    if Fingerprint::from_bytes(HashAlgorithm::Xxh3, body).as_bytes()[..] != checksum[..] {
        return Err(corrupt("checksum mismatch"));
    }
    match bincode::serde::decode_from_slice(body, bincode::config::standard()) {
        Ok((Record::Put { entry, .. }, _)) => Ok(Some(entry)),
        Ok((Record::Remove { .. }, _)) => Err(corrupt("index points at a removal record")),
        Err(e) => Err(corrupt(&e.to_string())),
    }
}

/// Opens `path` (creating it if needed) and replays the log.
fn load(path: &Path) -> Result<Inner, StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StorageError::io(path, e))?;

    let mut raw = Vec::new();
    file.read_to_end(&mut raw)
        .map_err(|e| StorageError::io(path, e))?;

    if raw.is_empty() {
        file.write_all(&DB_MAGIC)
            .and_then(|_| file.flush())
            .map_err(|e| StorageError::io(path, e))?;
        return Ok(Inner {
            file: Some(file),
            index: HashMap::new(),
            end: DB_MAGIC.len() as u64,
            dead: 0,
        });
    }
    if raw.len() < DB_MAGIC.len() || raw[..DB_MAGIC.len()] != DB_MAGIC {
        return Err(StorageError::Corrupt {
            key: path.display().to_string(),
            reason: "not a kiln cache database".to_string(),
        });
    }

    let mut index = HashMap::new();
    let mut dead = 0;
    let mut pos = DB_MAGIC.len();
    while pos < raw.len() {
        let Some(record_len) = replay_one(&raw[pos..]) else {
            break;
        };
        let body_start = pos + FRAME_OVERHEAD;
        let body = &raw[body_start..body_start + record_len];
        match bincode::serde::decode_from_slice(body, bincode::config::standard()) {
            Ok((Record::Put { key, .. }, _)) => {
                let slot = Slot {
                    offset: (pos + 4) as u64,
                    len: record_len,
                };
                if index.insert(key, slot).is_some() {
                    dead += 1;
                }
            }
            Ok((Record::Remove { key }, _)) => {
                if index.remove(&key).is_some() {
                    dead += 1;
                }
                dead += 1;
            }
            Err(_) => break,
        }
        pos = body_start + record_len;
    }

    if pos < raw.len() {
        tracing::warn!(
            path = %path.display(),
            dropped = raw.len() - pos,
            "truncating torn tail of cache database"
        );
        file.set_len(pos as u64)
            .map_err(|e| StorageError::io(path, e))?;
    }

    Ok(Inner {
        file: Some(file),
        index,
        end: pos as u64,
        dead,
    })
}

/// Validates the frame at the start of `raw` and returns its body length, or
/// `None` if the frame is incomplete or fails its checksum.
fn replay_one(raw: &[u8]) -> Option<usize> {
    if raw.len() < FRAME_OVERHEAD {
        return None;
    }
    let len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
    let body = raw.get(FRAME_OVERHEAD..FRAME_OVERHEAD + len)?;
    let checksum = &raw[4..FRAME_OVERHEAD];
    (Fingerprint::from_bytes(HashAlgorithm::Xxh3, body).as_bytes()[..] == checksum[..]).then_some(len)
}
