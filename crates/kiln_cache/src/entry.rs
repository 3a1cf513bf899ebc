//! Cache entries and their on-disk encoding.
//!
//! An entry pairs a target's value with the fingerprint it was built under,
//! so a reader can never observe one without the other. Encoded entries carry
//! a header with magic bytes, a format version and a payload checksum:
//!
//! ```text
//! [u32 LE header length][bincode EntryHeader][bincode CacheEntry]
//! ```

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use kiln_common::{Fingerprint, HashAlgorithm, Value};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Magic bytes identifying an encoded kiln cache entry.
const ENTRY_MAGIC: [u8; 4] = *b"KILN";

/// Current entry format version. Increment on breaking changes to the header
/// or payload layout.
const ENTRY_FORMAT_VERSION: u32 = 1;

/// Build metadata recorded with every entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMeta {
    /// Wall-clock time the command took.
    pub elapsed: Duration,
    /// Seconds since the Unix epoch when the build finished.
    pub built_at: u64,
    /// Hash algorithm the fingerprint was computed with.
    pub algorithm: HashAlgorithm,
    /// Content fingerprints of the declared output files after the build.
    pub output_files: Vec<(PathBuf, Fingerprint)>,
}

impl BuildMeta {
    /// Metadata for a build that just finished.
    pub fn now(elapsed: Duration, algorithm: HashAlgorithm) -> Self {
        let built_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            elapsed,
            built_at,
            algorithm,
            output_files: Vec::new(),
        }
    }
}

/// A stored target result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The realized value.
    pub value: Value,
    /// Fingerprint the value was built under.
    pub fingerprint: Fingerprint,
    /// Build metadata.
    pub meta: BuildMeta,
}

/// Header prepended to every encoded entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryHeader {
    magic: [u8; 4],
    format_version: u32,
    checksum: Fingerprint,
}

/// Encodes an entry with its validation header.
pub(crate) fn encode_entry(entry: &CacheEntry) -> Result<Vec<u8>, StorageError> {
    let payload = bincode::serde::encode_to_vec(entry, bincode::config::standard()).map_err(
        |e| StorageError::Serialization {
            reason: e.to_string(),
        },
    )?;
    let header = EntryHeader {
        magic: ENTRY_MAGIC,
        format_version: ENTRY_FORMAT_VERSION,
        checksum: Fingerprint::from_bytes(HashAlgorithm::Xxh3, &payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| StorageError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);
    Ok(output)
}

/// Decodes and validates an entry stored under `key`.
pub(crate) fn decode_entry(key: &str, raw: &[u8]) -> Result<CacheEntry, StorageError> {
    let corrupt = |reason: &str| StorageError::Corrupt {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if raw.len() < 4 {
        return Err(corrupt("truncated header length"));
    }
    let header_len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    if raw.len() < 4 + header_len {
        return Err(corrupt("truncated header"));
    }

    let (header, _): (EntryHeader, _) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .map_err(|_| corrupt("unreadable header"))?;
    if header.magic != ENTRY_MAGIC {
        return Err(corrupt("bad magic bytes"));
    }
    if header.format_version != ENTRY_FORMAT_VERSION {
        return Err(corrupt(&format!(
            "format version {} (expected {ENTRY_FORMAT_VERSION})",
            header.format_version
        )));
    }

    let payload = &raw[4 + header_len..];
    let actual = Fingerprint::from_bytes(HashAlgorithm::Xxh3, payload);
    if actual != header.checksum {
        return Err(corrupt(&format!(
            "checksum mismatch: expected {}, got {actual}",
            header.checksum
        )));
    }

    bincode::serde::decode_from_slice(payload, bincode::config::standard())
        .map(|(entry, _)| entry)
        .map_err(|e| corrupt(&e.to_string()))
}
