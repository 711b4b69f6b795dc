//! # Entry Digests
//!
//! SHA-256 digests used to chain ledger entries. A digest is always
//! computed over the `serde_json` encoding of a struct whose fields contain
//! only integers, strings and timestamps, so the encoding is stable.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A lowercase-hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryDigest(String);

impl EntryDigest {
    /// The digest that precedes the first entry of a chain.
    pub fn genesis() -> Self {
        Self("0".repeat(64))
    }

    /// Digest an arbitrary serializable value.
    pub fn of(value: &impl Serialize) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self(sha256_hex(&bytes)))
    }

    /// Wrap an existing hex string (e.g. loaded from storage).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
