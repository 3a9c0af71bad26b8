//! # Certificate Chain Trust
//!
//! Verification of the host-key certificate chains presented during TLS.
//! A chain is trusted when:
//!
//! 1. it has the length of the configured [`CertificateKind`];
//! 2. its root is self-signed, a CA, and signed under its own (RSA) key;
//! 3. every other certificate is signed by the root;
//! 4. every certificate is currently valid and expires within
//!    [`NOT_AFTER_THRESHOLD`] from now;
//! 5. when an identity is pinned (client side), the root key hashes to it.
//!
//! The functions take plain DER slices so they can be driven by any TLS stack.

use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::certificates::{unix_now_secs, CertificateKind, NOT_AFTER_THRESHOLD};
use crate::{PeerIdentity, PeerPublicKey, TrustError};

/// What a verified chain tells us about the remote peer.
#[derive(Debug, Clone)]
pub struct PeerCertificateInfo {
    /// Identity derived from the root key.
    pub identity: PeerIdentity,
    /// SubjectPublicKeyInfo DER of the root key.
    pub root_public_key_der: Vec<u8>,
    /// Whether the root key is an RSA key.
    pub root_is_rsa: bool,
}

impl PeerCertificateInfo {
    /// Decode the root key as an RSA host key.
    pub fn root_public_key(&self) -> Option<PeerPublicKey> {
        if !self.root_is_rsa {
            return None;
        }
        PeerPublicKey::from_der(&self.root_public_key_der).ok()
    }
}

/// Verify a chain (leaf first) at the current time.
pub fn verify_chain<C: AsRef<[u8]>>(
    chain: &[C],
    kind: CertificateKind,
    expected: Option<&PeerIdentity>,
) -> Result<PeerCertificateInfo, TrustError> {
    verify_chain_at(chain, kind, expected, unix_now_secs())
}

/// Verify a chain (leaf first) at the given unix time.
pub fn verify_chain_at<C: AsRef<[u8]>>(
    chain: &[C],
    kind: CertificateKind,
    expected: Option<&PeerIdentity>,
    now: i64,
) -> Result<PeerCertificateInfo, TrustError> {
    if chain.len() != kind.chain_length() {
        return Err(TrustError::ChainLength {
            expected: kind.chain_length(),
            actual: chain.len(),
        });
    }

    let certificates = parse_all(chain)?;
    let root_index = certificates.len() - 1;
    let root = &certificates[root_index];

    if root.subject().as_raw() != root.issuer().as_raw() {
        return Err(TrustError::NotSelfSigned);
    }
    if !root.is_ca() {
        return Err(TrustError::NotCertificateAuthority);
    }
    if !matches!(root.public_key().parsed(), Ok(PublicKey::RSA(_))) {
        return Err(TrustError::NotRsaRoot);
    }
    if root.verify_signature(None).is_err() {
        return Err(TrustError::BadSignature(root_index));
    }

    for (index, certificate) in certificates.iter().enumerate().take(root_index) {
        if certificate
            .verify_signature(Some(root.public_key()))
            .is_err()
        {
            return Err(TrustError::BadSignature(index));
        }
    }

    let threshold = NOT_AFTER_THRESHOLD.as_secs() as i64;
    for (index, certificate) in certificates.iter().enumerate() {
        let validity = certificate.validity();
        if now < validity.not_before.timestamp() || now > validity.not_after.timestamp() {
            return Err(TrustError::NotValidNow(index));
        }
        if validity.not_after.timestamp() - now > threshold {
            return Err(TrustError::TooLongLived(index));
        }
    }

    let info = PeerCertificateInfo {
        identity: PeerIdentity::of_public_key_der(root.public_key().raw),
        root_public_key_der: root.public_key().raw.to_vec(),
        root_is_rsa: true,
    };

    if let Some(expected) = expected {
        if &info.identity != expected {
            return Err(TrustError::IdentityMismatch);
        }
    }

    Ok(info)
}

/// Extract the root key of an already trusted chain without re-verifying it.
pub fn inspect_chain<C: AsRef<[u8]>>(chain: &[C]) -> Result<PeerCertificateInfo, TrustError> {
    let root_der = chain
        .last()
        .ok_or(TrustError::ChainLength {
            expected: 1,
            actual: 0,
        })?;
    let (_, root) = X509Certificate::from_der(root_der.as_ref())
        .map_err(|e| TrustError::Malformed(e.to_string()))?;

    Ok(PeerCertificateInfo {
        identity: PeerIdentity::of_public_key_der(root.public_key().raw),
        root_public_key_der: root.public_key().raw.to_vec(),
        root_is_rsa: matches!(root.public_key().parsed(), Ok(PublicKey::RSA(_))),
    })
}

/// Check that the chain root carries a signature made by `public_key`.
///
/// Binds the certificate to a stored host key independently of the key the
/// certificate itself announces.
pub fn root_signed_by<C: AsRef<[u8]>>(chain: &[C], public_key: &PeerPublicKey) -> bool {
    let Some(root_der) = chain.last() else {
        return false;
    };
    let Ok((_, root)) = X509Certificate::from_der(root_der.as_ref()) else {
        return false;
    };
    let Ok((_, spki)) = SubjectPublicKeyInfo::from_der(public_key.der()) else {
        return false;
    };
    root.verify_signature(Some(&spki)).is_ok()
}

fn parse_all<C: AsRef<[u8]>>(chain: &[C]) -> Result<Vec<X509Certificate<'_>>, TrustError> {
    chain
        .iter()
        .map(|der| {
            X509Certificate::from_der(der.as_ref())
                .map(|(_, certificate)| certificate)
                .map_err(|e| TrustError::Malformed(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificates::HostKeyCertificate;
    use crate::testing::test_host_key;

    fn issue(index: usize, kind: CertificateKind) -> Vec<Vec<u8>> {
        HostKeyCertificate::issue(&test_host_key(index), kind)
            .unwrap()
            .chain()
            .iter()
            .map(|c| c.as_ref().to_vec())
            .collect()
    }

    // =========================================================================
    // TEST GROUP 1: Accepted chains
    // =========================================================================

    #[test]
    fn test_fresh_chain_is_trusted() {
        let chain = issue(0, CertificateKind::Chained);
        let info = verify_chain(&chain, CertificateKind::Chained, None).unwrap();

        assert_eq!(info.identity, test_host_key(0).identity());
        assert!(info.root_is_rsa);
    }

    #[test]
    fn test_single_rsa_chain_is_trusted() {
        let chain = issue(0, CertificateKind::SingleRsa);
        assert!(verify_chain(&chain, CertificateKind::SingleRsa, None).is_ok());
    }

    #[test]
    fn test_pinned_identity_matches() {
        let chain = issue(1, CertificateKind::Chained);
        let expected = test_host_key(1).identity();

        assert!(verify_chain(&chain, CertificateKind::Chained, Some(&expected)).is_ok());
    }

    // =========================================================================
    // TEST GROUP 2: Rejected chains
    // =========================================================================

    #[test]
    fn test_pinned_identity_mismatch() {
        let chain = issue(0, CertificateKind::Chained);
        let other = test_host_key(1).identity();

        assert_eq!(
            verify_chain(&chain, CertificateKind::Chained, Some(&other)).unwrap_err(),
            TrustError::IdentityMismatch
        );
    }

    #[test]
    fn test_wrong_chain_length() {
        let chain = issue(0, CertificateKind::SingleRsa);
        assert_eq!(
            verify_chain(&chain, CertificateKind::Chained, None).unwrap_err(),
            TrustError::ChainLength {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_long_lived_certificate_rejected() {
        let now = unix_now_secs();
        let chain: Vec<Vec<u8>> = HostKeyCertificate::issue_with_validity(
            &test_host_key(0),
            CertificateKind::Chained,
            now - 60,
            now + 24 * 60 * 60,
        )
        .unwrap()
        .chain()
        .iter()
        .map(|c| c.as_ref().to_vec())
        .collect();

        assert!(matches!(
            verify_chain(&chain, CertificateKind::Chained, None),
            Err(TrustError::TooLongLived(_))
        ));
    }

    #[test]
    fn test_expired_certificate_rejected() {
        let chain = issue(0, CertificateKind::Chained);
        let later = unix_now_secs() + 60 * 60;

        assert!(matches!(
            verify_chain_at(&chain, CertificateKind::Chained, None, later),
            Err(TrustError::NotValidNow(_))
        ));
    }

    #[test]
    fn test_mixed_chain_rejected() {
        // leaf of peer 0 under root of peer 1
        let a = issue(0, CertificateKind::Chained);
        let b = issue(1, CertificateKind::Chained);
        let mixed = vec![a[0].clone(), b[1].clone()];

        assert_eq!(
            verify_chain(&mixed, CertificateKind::Chained, None).unwrap_err(),
            TrustError::BadSignature(0)
        );
    }

    #[test]
    fn test_garbage_rejected() {
        let chain = vec![vec![1u8, 2, 3]];
        assert!(matches!(
            verify_chain(&chain, CertificateKind::SingleRsa, None),
            Err(TrustError::Malformed(_))
        ));
    }

    // =========================================================================
    // TEST GROUP 3: Key binding
    // =========================================================================

    #[test]
    fn test_root_signed_by_host_key() {
        let chain = issue(0, CertificateKind::Chained);

        assert!(root_signed_by(&chain, test_host_key(0).public_key()));
        assert!(!root_signed_by(&chain, test_host_key(1).public_key()));
    }

    #[test]
    fn test_inspect_chain_reports_root_identity() {
        let chain = issue(1, CertificateKind::Chained);
        let info = inspect_chain(&chain).unwrap();

        assert_eq!(info.identity, test_host_key(1).identity());
        assert_eq!(
            info.root_public_key().unwrap(),
            *test_host_key(1).public_key()
        );
    }
}
