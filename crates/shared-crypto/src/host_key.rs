//! # RSA Host Key
//!
//! Every node owns exactly one RSA key pair. Its public half determines the
//! node's [`PeerIdentity`]; its private half signs the short-lived TLS
//! certificates issued in [`crate::certificates`].
//!
//! ## Encodings
//!
//! - Host key files: PKCS#1 PEM (`RSA PRIVATE KEY`), PKCS#8 accepted on read
//! - Public keys: SubjectPublicKeyInfo DER / PEM (`PUBLIC KEY`)
//! - Signatures: PKCS#1 v1.5 over SHA-512

use std::fmt;
use std::fs;
use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha512;

use crate::{CryptoError, PeerIdentity};

/// Production host key size.
pub const HOST_KEY_BITS: usize = 4096;

/// An RSA public key together with its SPKI encoding.
///
/// Equality compares the DER encoding.
#[derive(Clone)]
pub struct PeerPublicKey {
    key: RsaPublicKey,
    der: Vec<u8>,
}

impl PeerPublicKey {
    /// Wrap an RSA public key.
    pub fn new(key: RsaPublicKey) -> Result<Self, CryptoError> {
        let der = key
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?
            .as_bytes()
            .to_vec();
        Ok(Self { key, der })
    }

    /// Decode a SubjectPublicKeyInfo DER document.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Self::new(key)
    }

    /// Decode a `PUBLIC KEY` PEM block.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Self::new(key)
    }

    /// Encode as a `PUBLIC KEY` PEM block.
    pub fn to_pem(&self) -> Result<String, CryptoError> {
        self.key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    /// SubjectPublicKeyInfo DER.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Identity derived from this key.
    pub fn identity(&self) -> PeerIdentity {
        PeerIdentity::of_public_key_der(&self.der)
    }

    /// Verify a PKCS#1 v1.5 / SHA-512 signature.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        VerifyingKey::<Sha512>::new(self.key.clone())
            .verify(data, &signature)
            .is_ok()
    }
}

impl PartialEq for PeerPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for PeerPublicKey {}

impl fmt::Debug for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerPublicKey")
            .field("identity", &self.identity())
            .finish()
    }
}

/// The node's own RSA key pair.
#[derive(Clone)]
pub struct HostKey {
    private_key: RsaPrivateKey,
    public_key: PeerPublicKey,
    identity: PeerIdentity,
}

impl HostKey {
    /// Generate a fresh production-sized key.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::generate_with_bits(HOST_KEY_BITS)
    }

    /// Generate a key with a custom modulus size.
    pub fn generate_with_bits(bits: usize) -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    /// Build from an existing private key.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, CryptoError> {
        let public_key = PeerPublicKey::new(RsaPublicKey::from(&private_key))?;
        let identity = public_key.identity();
        Ok(Self {
            private_key,
            public_key,
            identity,
        })
    }

    /// Parse a PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) PEM block.
    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    /// Read a host key file.
    pub fn read_pem_file(path: &Path) -> Result<Self, CryptoError> {
        let pem = fs::read_to_string(path).map_err(|e| CryptoError::KeyFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_pem(&pem)
    }

    /// Write the key as PKCS#1 PEM.
    pub fn write_pem_file(&self, path: &Path) -> Result<(), CryptoError> {
        let pem = self
            .private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        fs::write(path, pem.as_bytes()).map_err(|e| CryptoError::KeyFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// The node identity.
    pub fn identity(&self) -> PeerIdentity {
        self.identity
    }

    /// Public half.
    pub fn public_key(&self) -> &PeerPublicKey {
        &self.public_key
    }

    /// Sign with PKCS#1 v1.5 / SHA-512.
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        SigningKey::<Sha512>::new(self.private_key.clone())
            .sign(data)
            .to_vec()
    }

    /// PKCS#8 PEM of the private key, as needed by the certificate builder.
    pub(crate) fn pkcs8_pem(&self) -> Result<String, CryptoError> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.as_str().to_owned())
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
    }

    /// PKCS#8 DER of the private key, used as the TLS key for single-RSA certificates.
    pub(crate) fn pkcs8_der(&self) -> Result<Vec<u8>, CryptoError> {
        self.private_key
            .to_pkcs8_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
    }
}

impl fmt::Debug for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostKey")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
