//! Crypto error types.

use thiserror::Error;

/// Key handling and certificate issuance errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid identity length
    #[error("Invalid identity length: expected {expected}, got {actual}")]
    InvalidIdentityLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Identity is not valid hex
    #[error("Invalid identity encoding: {0}")]
    InvalidIdentityEncoding(String),

    /// Invalid public key
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid private key
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Certificate generation failed
    #[error("Certificate generation failed: {0}")]
    CertificateGeneration(String),

    /// Reading or writing key material failed
    #[error("Key file {path}: {reason}")]
    KeyFile {
        /// File that was accessed
        path: String,
        /// Underlying cause
        reason: String,
    },
}

/// Reasons a presented certificate chain is not trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustError {
    /// Chain does not have the length of the configured certificate kind
    #[error("Illegal certificate chain length: expected {expected}, got {actual}")]
    ChainLength {
        /// Expected chain length
        expected: usize,
        /// Presented chain length
        actual: usize,
    },

    /// A certificate could not be decoded
    #[error("Malformed certificate: {0}")]
    Malformed(String),

    /// Root issuer and subject differ
    #[error("Root certificate is not self-signed")]
    NotSelfSigned,

    /// Root lacks the CA basic constraint
    #[error("Root certificate is not a certificate authority")]
    NotCertificateAuthority,

    /// Root is not keyed with the RSA host key
    #[error("Root certificate key is not an RSA key")]
    NotRsaRoot,

    /// A signature in the chain does not verify
    #[error("Certificate signature verification failed at position {0}")]
    BadSignature(usize),

    /// Outside of validity period
    #[error("Certificate at position {0} is outside of its validity period")]
    NotValidNow(usize),

    /// `notAfter` lies too far in the future
    #[error("Certificate at position {0} is valid for too long")]
    TooLongLived(usize),

    /// Pinned identity does not match the root key
    #[error("Certificate identity does not match the expected peer")]
    IdentityMismatch,
}
