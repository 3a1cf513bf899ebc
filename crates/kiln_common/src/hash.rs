//! Content fingerprints for staleness detection.
//!
//! A [`Fingerprint`] is a 128-bit digest. The algorithm producing it is
//! configurable: XXH3-128 is the default because staleness only depends on
//! content equality, while SHA-256 (truncated to 128 bits) is available when
//! collision resistance matters more than speed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use xxhash_rust::xxh3::Xxh3;

/// Separator written after every field so adjacent fields cannot run together.
const UNIT_SEPARATOR: u8 = 0x1F;

/// Hash function used to compute fingerprints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// XXH3 with a 128-bit output. Fast, non-cryptographic.
    #[default]
    Xxh3,
    /// SHA-256 truncated to 128 bits.
    Sha256,
}

impl HashAlgorithm {
    /// Returns the lowercase name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Xxh3 => "xxh3",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown hash algorithm name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hash algorithm '{input}' (expected xxh3 or sha256)")]
pub struct ParseHashAlgorithmError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for HashAlgorithm {
    type Err = ParseHashAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xxh3" => Ok(HashAlgorithm::Xxh3),
            "sha256" => Ok(HashAlgorithm::Sha256),
            _ => Err(ParseHashAlgorithmError {
                input: s.to_string(),
            }),
        }
    }
}

/// A 128-bit content fingerprint.
///
/// Two targets with the same `Fingerprint` are considered semantically
/// identical for staleness purposes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    /// Computes the fingerprint of a byte slice with the given algorithm.
    pub fn from_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let mut hasher = FingerprintHasher::new(algorithm);
        hasher.write_bytes(data);
        hasher.finish()
    }

    /// Wraps raw digest bytes.
    pub fn from_raw(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parses the 32-character lowercase hex form produced by `Display`.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 32 || !s.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fingerprint({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

enum HasherState {
    Xxh3(Box<Xxh3>),
    Sha256(Sha256),
}

/// Incremental fingerprint builder.
///
/// Every `write_*` call frames its input with a length prefix and a
/// separator, so `["ab", "c"]` and `["a", "bc"]` hash differently. The
/// algorithm tag is mixed in first, so fingerprints from different algorithms
/// never compare equal.
pub struct FingerprintHasher {
    state: HasherState,
}

impl FingerprintHasher {
    /// Starts a new fingerprint computation.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Xxh3 => HasherState::Xxh3(Box::new(Xxh3::new())),
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
        };
        let mut hasher = Self { state };
        hasher.update(algorithm.name().as_bytes());
        hasher.update(&[UNIT_SEPARATOR]);
        hasher
    }

    fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Xxh3(h) => h.update(data),
            HasherState::Sha256(h) => h.update(data),
        }
    }

    /// Writes a length-prefixed byte field.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.update(&(data.len() as u64).to_le_bytes());
        self.update(data);
        self.update(&[UNIT_SEPARATOR]);
    }

    /// Writes a length-prefixed string field.
    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Writes another fingerprint as a field.
    pub fn write_fingerprint(&mut self, fp: &Fingerprint) {
        self.write_bytes(&fp.0);
    }

    /// Consumes the hasher and returns the fingerprint.
    pub fn finish(self) -> Fingerprint {
        match self.state {
            HasherState::Xxh3(h) => Fingerprint(h.digest128().to_le_bytes()),
            HasherState::Sha256(h) => {
                let digest = h.finalize();
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(&digest[..16]);
                Fingerprint(bytes)
            }
        }
    }
}
