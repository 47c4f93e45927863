//! 32-byte identities.
//!
//! Markets, jobs, clients and nodes are all addressed by a [`Pubkey`]. The
//! engine never derives an identity from a signature; callers hand it an
//! already-authenticated key.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::CoreError;

/// Length of a public key in bytes.
pub const PUBKEY_LEN: usize = 32;

/// A 32-byte identity, displayed and serialized as base58.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pubkey([u8; PUBKEY_LEN]);

impl Pubkey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; PUBKEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Creates a random key. Used for fresh market ids and in tests.
    #[must_use]
    pub fn new_unique() -> Self {
        let mut bytes = [0u8; PUBKEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Deterministically derives a key from a set of seeds.
    ///
    /// Mirrors program-derived addresses: `derive(&[b"vault", market.as_ref()])`
    /// always yields the same vault key for the same market.
    #[must_use]
    pub fn derive(seeds: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for seed in seeds {
            hasher.update(&(seed.len() as u64).to_le_bytes());
            hasher.update(seed);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PUBKEY_LEN] {
        &self.0
    }

    /// Returns a shortened base58 form for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        let full = self.to_string();
        full.chars().take(8).collect()
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({self})")
    }
}

impl FromStr for Pubkey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(s)
            .into_vec()
            .map_err(|e| CoreError::InvalidPubkey(e.to_string()))?;
        let bytes: [u8; PUBKEY_LEN] = decoded.try_into().map_err(|v: Vec<u8>| {
            CoreError::InvalidPubkey(format!("expected {PUBKEY_LEN} bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
