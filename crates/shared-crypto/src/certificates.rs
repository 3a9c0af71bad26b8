//! # Host-Key Certificates
//!
//! Short-lived, self-signed X.509 certificates whose trust anchor is the RSA
//! host key itself. No external CA is involved: a peer trusts a certificate
//! because its root key hashes to a known [`crate::PeerIdentity`].
//!
//! ## Kinds
//!
//! | Kind | Chain | TLS key |
//! |------|-------|---------|
//! | `Chained` | `[EC P-384 leaf, RSA root]` | leaf key |
//! | `SingleRsa` | `[RSA root]` | host key |
//!
//! ## Fingerprinting
//!
//! Serial numbers are fixed to 0 and validity bounds are jittered by a few
//! minutes so certificates carry as little linkable information as possible.

use rand::Rng;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, SerialNumber,
    PKCS_ECDSA_P384_SHA384, PKCS_RSA_SHA256,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;

use crate::{CryptoError, HostKey};

/// Issuer (and root subject) common name.
pub const GOSSIP_ISSUER: &str = "GOSSIP_PEER";

/// Leaf subject common name.
pub const GOSSIP_SUBJECT: &str = "GOSSIP";

/// Certificates valid for longer than this (measured from now) are rejected.
pub const NOT_AFTER_THRESHOLD: Duration = Duration::from_secs(30 * 60);

/// Which certificate layout a node presents and expects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CertificateKind {
    /// Intermediate ECDSA leaf chained under the RSA root.
    #[default]
    Chained,
    /// Single RSA root.
    SingleRsa,
}

impl CertificateKind {
    /// Number of certificates a peer must present.
    pub fn chain_length(self) -> usize {
        match self {
            Self::Chained => 2,
            Self::SingleRsa => 1,
        }
    }
}

/// A freshly issued certificate chain with the matching TLS private key.
pub struct HostKeyCertificate {
    chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
}

impl HostKeyCertificate {
    /// Issue a certificate with jittered validity around now.
    pub fn issue(host_key: &HostKey, kind: CertificateKind) -> Result<Self, CryptoError> {
        let now = unix_now_secs();
        let mut rng = rand::thread_rng();

        let not_before = now - rng.gen_range(0..6) * 60 - rng.gen_range(0..60);
        let not_after = now + (10 + (rng.gen_range(0..5) - 2)) * 60 + rng.gen_range(0..60);

        Self::issue_with_validity(host_key, kind, not_before, not_after)
    }

    /// Issue a certificate with explicit validity bounds (unix seconds).
    pub fn issue_with_validity(
        host_key: &HostKey,
        kind: CertificateKind,
        not_before: i64,
        not_after: i64,
    ) -> Result<Self, CryptoError> {
        let host_signer = KeyPair::from_pem_and_sign_algo(&host_key.pkcs8_pem()?, &PKCS_RSA_SHA256)
            .map_err(cert_error)?;

        let mut root_params = base_params(GOSSIP_ISSUER, not_before, not_after)?;
        root_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let root = root_params.self_signed(&host_signer).map_err(cert_error)?;

        match kind {
            CertificateKind::SingleRsa => Ok(Self {
                chain: vec![root.der().clone()],
                private_key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(host_key.pkcs8_der()?)),
            }),
            CertificateKind::Chained => {
                let leaf_key = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384).map_err(cert_error)?;
                let leaf_params = base_params(GOSSIP_SUBJECT, not_before, not_after)?;
                let leaf = leaf_params
                    .signed_by(&leaf_key, &root, &host_signer)
                    .map_err(cert_error)?;

                Ok(Self {
                    chain: vec![leaf.der().clone(), root.der().clone()],
                    private_key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
                        leaf_key.serialize_der(),
                    )),
                })
            }
        }
    }

    /// The chain, leaf first.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Split into the parts a TLS config needs.
    pub fn into_parts(self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.chain, self.private_key)
    }
}

fn base_params(
    common_name: &str,
    not_before: i64,
    not_after: i64,
) -> Result<CertificateParams, CryptoError> {
    let mut params = CertificateParams::default();

    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    params.distinguished_name = name;

    params.serial_number = Some(SerialNumber::from(vec![0u8]));
    params.not_before = OffsetDateTime::from_unix_timestamp(not_before)
        .map_err(|e| CryptoError::CertificateGeneration(e.to_string()))?;
    params.not_after = OffsetDateTime::from_unix_timestamp(not_after)
        .map_err(|e| CryptoError::CertificateGeneration(e.to_string()))?;

    Ok(params)
}

fn cert_error(err: rcgen::Error) -> CryptoError {
    CryptoError::CertificateGeneration(err.to_string())
}

pub(crate) fn unix_now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
