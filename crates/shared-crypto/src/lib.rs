//! # Shared Crypto - Host Key Identity & Trust
//!
//! Cryptographic building blocks of the gossip node.
//!
//! ## Components
//!
//! | Module | Contents |
//! |--------|----------|
//! | `identity` | [`PeerIdentity`] = SHA-256 of the SPKI-encoded public key |
//! | `host_key` | RSA [`HostKey`], [`PeerPublicKey`], PKCS#1 v1.5 signatures |
//! | `certificates` | Short-lived certificates rooted in the host key |
//! | `trust` | Chain verification with optional identity pinning |
//!
//! ## Trust Model
//!
//! There is no PKI. A peer is trusted because its certificate root is signed
//! by a key whose hash is a known identity, and because the chain is fresh.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod certificates;
pub mod errors;
pub mod host_key;
pub mod identity;
pub mod trust;

/// Key fixtures for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use certificates::{CertificateKind, HostKeyCertificate, NOT_AFTER_THRESHOLD};
pub use errors::{CryptoError, TrustError};
pub use host_key::{HostKey, PeerPublicKey, HOST_KEY_BITS};
pub use identity::PeerIdentity;
pub use trust::{inspect_chain, root_signed_by, verify_chain, PeerCertificateInfo};
