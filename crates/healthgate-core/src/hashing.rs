//! Identity hashing and document id derivation.
//!
//! Both functions here are committed to consensus-ordered state, so they
//! must be deterministic across every replica that executes the same
//! transaction: no wall-clock reads, no locally generated randomness.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::document::DocKind;
use crate::types::{DocumentId, TransactionId};

/// A 32-byte Blake3 digest of personally identifying input.
///
/// This is the pseudonymization boundary: raw identifying material never
/// reaches the ledger, only its digest does. Persisted as a hex string so
/// predicate queries can match on it as an ordinary JSON field.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityDigest(pub [u8; 32]);

impl Serialize for IdentityDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for IdentityDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        IdentityDigest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl IdentityDigest {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for IdentityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for IdentityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for IdentityDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// One-way hash of a plaintext identifier into its stored pseudonymous form.
pub fn hash_identifier(plaintext: &str) -> IdentityDigest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"healthgate-identity-v0:");
    hasher.update(plaintext.as_bytes());
    IdentityDigest(*hasher.finalize().as_bytes())
}

/// Derive a document key from its kind and the current transaction id.
///
/// Collision-free as long as transaction ids are unique, since the digest
/// covers the full (kind, tx) pair.
pub fn derive_document_id(kind: DocKind, tx_id: &TransactionId) -> DocumentId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"healthgate-document-v0:");
    hasher.update(kind.tag().as_bytes());
    hasher.update(b":");
    hasher.update(tx_id.as_str().as_bytes());
    let digest = hasher.finalize();
    DocumentId::new(format!(
        "{}:{}",
        kind.tag(),
        &hex::encode(digest.as_bytes())[..32]
    ))
}
