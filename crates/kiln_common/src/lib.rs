//! Shared foundational types used across the Kiln pipeline engine.
//!
//! This crate provides the fingerprint digest and its configurable hash
//! algorithms, plus the opaque [`Value`] payload that targets produce and the
//! cache stores.

#![warn(missing_docs)]

pub mod hash;
pub mod name;
pub mod value;

pub use hash::{Fingerprint, FingerprintHasher, HashAlgorithm, ParseHashAlgorithmError};
pub use name::{is_ident_char, is_ident_start, is_valid_target_name};
pub use value::{Format, Value, ValueError};
