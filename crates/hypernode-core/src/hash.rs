//! Fixed-width content addresses.
//!
//! Job definitions and results live in external content storage. The engine
//! only keeps their 32-byte digests and never fetches or checks the content.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::CoreError;

/// A 32-byte content hash (job definition or result payload).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// The all-zero hash, meaning "unset".
    pub const ZERO: Self = Self([0u8; 32]);

    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hashes a payload locally with blake3.
    ///
    /// Convenient for clients and tests that need a stable digest for a
    /// payload they are about to upload.
    #[must_use]
    pub fn of(payload: &[u8]) -> Self {
        Self(*blake3::hash(payload).as_bytes())
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns true for the unset hash.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

impl FromStr for ContentHash {
    type Err = CoreError;

    /// Parses a 64-character lowercase or uppercase hex string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(CoreError::InvalidHash(format!(
                "expected 64 hex characters, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| CoreError::InvalidHash(format!("{e}: {s}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash_is_zero() {
        assert!(ContentHash::ZERO.is_zero());
        assert!(ContentHash::default().is_zero());
        assert!(!ContentHash::of(b"job").is_zero());
    }

    #[test]
    fn of_is_stable() {
        assert_eq!(ContentHash::of(b"model.onnx"), ContentHash::of(b"model.onnx"));
        assert_ne!(ContentHash::of(b"a"), ContentHash::of(b"b"));
    }

    #[test]
    fn hex_round_trip() {
        let hash = ContentHash::of(b"result");
        let parsed: ContentHash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("abcd".parse::<ContentHash>().is_err());
        assert!("zz".repeat(32).parse::<ContentHash>().is_err());
    }

    #[test]
    fn parse_rejects_sign_prefixed_pairs() {
        let input = "+f".repeat(32);
        assert_eq!(input.len(), 64);
        assert!(input.parse::<ContentHash>().is_err());
        assert!(" f".repeat(32).parse::<ContentHash>().is_err());
    }

    #[test]
    fn parse_accepts_uppercase_and_prints_lowercase() {
        let hash: ContentHash = "AB".repeat(32).parse().unwrap();
        assert_eq!(hash, ContentHash::new([0xab; 32]));
        assert_eq!(hash.to_string(), "ab".repeat(32));
    }

    #[test]
    fn serde_uses_hex() {
        let hash = ContentHash::new([0xab; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
    }
}
