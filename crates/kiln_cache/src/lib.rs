//! Durable storage of target values and their fingerprints.
//!
//! Every backend implements [`Storage`]; the [`Cache`] facade wraps one behind
//! an `Arc` so the scheduler, its workers and the CLI can share it. Three
//! backends ship with kiln:
//!
//! - [`DirStore`]: one file per key, atomic rename per write, many writers.
//! - [`FileDb`]: a single append-only file, one writer at a time.
//! - [`MemoryStore`]: a process-local map.
//!
//! Entries written to disk carry magic bytes, a format version and a checksum.
//! A read that fails validation surfaces as [`StorageError::Corrupt`], which
//! callers treat as a miss.

#![warn(missing_docs)]

pub mod cache;
pub mod db;
pub mod dir;
pub mod entry;
pub mod error;
pub mod memory;
pub mod storage;

pub use cache::{BuildTime, Cache};
pub use db::FileDb;
pub use dir::DirStore;
pub use entry::{BuildMeta, CacheEntry};
pub use error::StorageError;
pub use memory::MemoryStore;
pub use storage::{BackendKind, Storage, WriteConcurrency};
