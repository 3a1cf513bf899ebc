//! Error types for cache operations.

use std::path::PathBuf;

/// Errors raised by a storage backend.
///
/// A [`StorageError::Corrupt`] from a read is recoverable: callers treat the
/// entry as missing and rebuild it.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A stored entry failed validation (magic, version, or checksum).
    #[error("corrupt cache entry '{key}': {reason}")]
    Corrupt {
        /// The affected key.
        key: String,
        /// Description of the problem.
        reason: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// The backend name is not recognised.
    #[error("unknown cache backend '{0}' (expected dir, db or memory)")]
    UnknownBackend(String),
}

impl StorageError {
    /// Returns `true` if this error only affects a single unreadable entry.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = StorageError::io(
            "/tmp/.kiln/entries/data.entry",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("cache I/O error"));
        assert!(msg.contains("data.entry"));
        assert!(!err.is_corrupt());
    }

    #[test]
    fn corrupt_display() {
        let err = StorageError::Corrupt {
            key: "model_16".to_string(),
            reason: "checksum mismatch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt cache entry 'model_16': checksum mismatch"
        );
        assert!(err.is_corrupt());
    }
}
