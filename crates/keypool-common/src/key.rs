//! Endpoint Keys
//!
//! Endpoints are addressed by a 32-byte public key. Keys are decoded from
//! one of their human-readable forms once, when a pool is built, and
//! compared by byte equality from then on:
//!
//! - hex: 64 characters, either case
//! - z-base-32: 52 characters, the alphabet used by hypercore-style key ids

use data_encoding::{Encoding as BaseEncoding, Specification};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length in bytes of a canonical endpoint key.
pub const KEY_LEN: usize = 32;

/// Length of a key in z-base-32 form.
pub const Z32_KEY_LEN: usize = 52;

const Z32_ALPHABET: &str = "ybndrfg8ejkmcpqxot1uwisza345h769";

/// Errors produced while decoding an endpoint key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hex key: {0}")]
    InvalidHex(String),

    #[error("invalid z-base-32 key: {0}")]
    InvalidZ32(String),
}

fn z32() -> Result<BaseEncoding, KeyError> {
    let mut spec = Specification::new();
    spec.symbols.push_str(Z32_ALPHABET);
    spec.encoding().map_err(|e| KeyError::InvalidZ32(e.to_string()))
}

/// Canonical binary identifier of a remote endpoint.
///
/// # Example
///
/// ```
/// use keypool_common::EndpointKey;
///
/// let key: EndpointKey = "ab".repeat(32).parse().unwrap();
/// assert_eq!(key.as_bytes()[0], 0xab);
/// assert_eq!(key.to_string(), "ab".repeat(32));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey([u8; KEY_LEN]);

impl EndpointKey {
    /// Builds a key from exactly [`KEY_LEN`] raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let raw: [u8; KEY_LEN] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(raw))
    }

    /// Decodes a key from hex (64 characters) or z-base-32 (52 characters).
    ///
    /// Surrounding whitespace is ignored and both forms accept either case.
    /// Any other length is treated as hex.
    pub fn decode(encoded: &str) -> Result<Self, KeyError> {
        let encoded = encoded.trim();
        if encoded.len() == Z32_KEY_LEN {
            return Self::decode_z32(encoded);
        }
        let bytes = hex::decode(encoded).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Decodes a z-base-32 key.
    pub fn decode_z32(encoded: &str) -> Result<Self, KeyError> {
        let bytes = z32()?
            .decode(encoded.trim().to_ascii_lowercase().as_bytes())
            .map_err(|e| KeyError::InvalidZ32(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lower-case hex form of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_z32(&self) -> Result<String, KeyError> {
        Ok(z32()?.encode(&self.0))
    }
}

impl From<[u8; KEY_LEN]> for EndpointKey {
    fn from(raw: [u8; KEY_LEN]) -> Self {
        Self(raw)
    }
}

impl FromStr for EndpointKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EndpointKey {
    // Logs only need enough of the key to tell endpoints apart.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointKey({}..)", hex::encode(&self.0[..4]))
    }
}

impl Serialize for EndpointKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EndpointKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::decode(&encoded).map_err(serde::de::Error::custom)
    }
}
