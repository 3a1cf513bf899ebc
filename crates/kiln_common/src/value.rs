//! Opaque target values.
//!
//! A [`Value`] is what a target's command produces and what the cache stores:
//! a byte payload tagged with the [`Format`] it was encoded in. The engine never
//! looks inside; typed helpers encode and decode any serde type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage format hint for a target's value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Compact binary encoding via `bincode`.
    #[default]
    Bincode,
    /// Human-readable JSON via `serde_json`.
    Json,
    /// Uninterpreted bytes (e.g. the stdout of a shell command).
    Raw,
}

impl Format {
    /// Returns the lowercase name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            Format::Bincode => "bincode",
            Format::Json => "json",
            Format::Raw => "raw",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bincode" => Ok(Format::Bincode),
            "json" => Ok(Format::Json),
            "raw" => Ok(Format::Raw),
            other => Err(ValueError::UnknownFormat(other.to_string())),
        }
    }
}

/// Errors produced while encoding or decoding a [`Value`].
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// The value could not be encoded in the requested format.
    #[error("failed to encode value as {format}: {reason}")]
    Encode {
        /// Requested format.
        format: Format,
        /// Description of the failure.
        reason: String,
    },

    /// The stored bytes could not be decoded into the requested type.
    #[error("failed to decode {format} value: {reason}")]
    Decode {
        /// Format of the stored value.
        format: Format,
        /// Description of the failure.
        reason: String,
    },

    /// The format name is not recognised.
    #[error("unknown value format '{0}' (expected bincode, json or raw)")]
    UnknownFormat(String),
}

/// An opaque value produced by a target.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    format: Format,
    bytes: Vec<u8>,
}

impl Value {
    /// Wraps raw bytes without interpretation.
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            format: Format::Raw,
            bytes: bytes.into(),
        }
    }

    /// Wraps UTF-8 text as a raw value.
    pub fn text(text: impl Into<String>) -> Self {
        Self::raw(text.into().into_bytes())
    }

    /// Encodes a serde value with the given format.
    ///
    /// [`Format::Raw`] cannot encode structured data; use [`Value::raw`].
    pub fn encode<T: Serialize + ?Sized>(value: &T, format: Format) -> Result<Self, ValueError> {
        let bytes = match format {
            Format::Bincode => bincode::serde::encode_to_vec(value, bincode::config::standard())
                .map_err(|e| ValueError::Encode {
                    format,
                    reason: e.to_string(),
                })?,
            Format::Json => serde_json::to_vec(value).map_err(|e| ValueError::Encode {
                format,
                reason: e.to_string(),
            })?,
            Format::Raw => {
                return Err(ValueError::Encode {
                    format,
                    reason: "raw values hold bytes, not structured data".to_string(),
                })
            }
        };
        Ok(Self { format, bytes })
    }

    /// Decodes the payload into `T` according to the stored format.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        match self.format {
            Format::Bincode => {
                bincode::serde::decode_from_slice(&self.bytes, bincode::config::standard())
                    .map(|(value, _)| value)
                    .map_err(|e| ValueError::Decode {
                        format: self.format,
                        reason: e.to_string(),
                    })
            }
            Format::Json => serde_json::from_slice(&self.bytes).map_err(|e| ValueError::Decode {
                format: self.format,
                reason: e.to_string(),
            }),
            Format::Raw => Err(ValueError::Decode {
                format: self.format,
                reason: "raw values hold bytes, not structured data".to_string(),
            }),
        }
    }

    /// Returns the storage format of this value.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the encoded payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the payload as text if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({}, {} bytes)", self.format, self.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn bincode_roundtrip() {
        let v = Value::encode(&vec![1u32, 2, 3], Format::Bincode).unwrap();
        assert_eq!(v.format(), Format::Bincode);
        let back: Vec<u32> = v.decode().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn json_is_readable() {
        let mut m = BTreeMap::new();
        m.insert("units", 16);
        let v = Value::encode(&m, Format::Json).unwrap();
        assert_eq!(v.as_text(), Some(r#"{"units":16}"#));
    }

    #[test]
    fn raw_cannot_encode_structured() {
        let err = Value::encode(&1u8, Format::Raw).unwrap_err();
        assert!(matches!(err, ValueError::Encode { .. }));
    }

    #[test]
    fn raw_text_accessors() {
        let v = Value::text("hello");
        assert_eq!(v.format(), Format::Raw);
        assert_eq!(v.as_text(), Some("hello"));
        assert_eq!(v.len(), 5);
        assert!(v.decode::<String>().is_err());
    }

    #[test]
    fn decode_wrong_type_errors() {
        let v = Value::encode("not a number", Format::Json).unwrap();
        assert!(v.decode::<u64>().is_err());
    }

    #[test]
    fn parse_format() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("RAW".parse::<Format>().unwrap(), Format::Raw);
        assert!("rds".parse::<Format>().is_err());
    }

    #[test]
    fn debug_does_not_dump_payload() {
        let v = Value::raw(vec![0u8; 1024]);
        assert_eq!(format!("{v:?}"), "Value(raw, 1024 bytes)");
    }
}
