//! # Peer Identity
//!
//! A peer is identified by the SHA-256 digest of its DER-encoded
//! SubjectPublicKeyInfo. This is the same value you get from
//! `openssl rsa -pubin -outform der | openssl dgst -sha256`.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::CryptoError;

/// 32-byte peer identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerIdentity([u8; 32]);

impl PeerIdentity {
    /// Identity length in bytes.
    pub const LEN: usize = 32;

    /// Wrap raw digest bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidIdentityLength {
                expected: Self::LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    /// Derive the identity of a SubjectPublicKeyInfo DER document.
    pub fn of_public_key_der(spki_der: &[u8]) -> Self {
        let digest = Sha256::digest(spki_der);
        Self(digest.into())
    }

    /// Parse the lowercase/uppercase hex form.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(hex_str).map_err(|e| CryptoError::InvalidIdentityEncoding(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, used for file names and logs.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerIdentity({}..)", &self.to_hex()[..16])
    }
}
