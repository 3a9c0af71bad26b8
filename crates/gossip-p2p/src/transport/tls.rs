//! # TLS Configuration
//!
//! Mutually authenticated TLS 1.3 over TCP. There is no CA: each side
//! presents a fresh [`HostKeyCertificate`] chain rooted at its host key and
//! the custom verifiers below check it with [`shared_crypto::verify_chain`].
//!
//! - Server side: any chain that is well formed is accepted here; binding it
//!   to a trust-stored identity is the job of the application handshake.
//! - Client side: the root key must also hash to the identity we dialed.
//!
//! The `dangerous()` rustls APIs are used on purpose; all checks live in the
//! verifiers.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{CertificateError, DigitallySignedStruct, DistinguishedName, SignatureScheme};
use shared_crypto::{
    verify_chain, CertificateKind, HostKey, HostKeyCertificate, PeerIdentity, TrustError,
};
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tracing::debug;

use super::TransportError;

/// Server name sent by dialing peers; never checked.
const PEER_SERVER_NAME: &str = "gossip-peer";

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn trust_failure(err: TrustError) -> rustls::Error {
    debug!(error = %err, "rejecting peer certificate chain");
    let cause = match err {
        TrustError::NotValidNow(_) => CertificateError::Expired,
        TrustError::BadSignature(_) => CertificateError::BadSignature,
        TrustError::Malformed(_) => CertificateError::BadEncoding,
        TrustError::IdentityMismatch => CertificateError::NotValidForName,
        _ => CertificateError::ApplicationVerificationFailure,
    };
    rustls::Error::InvalidCertificate(cause)
}

fn full_chain<'a>(
    end_entity: &'a CertificateDer<'a>,
    intermediates: &'a [CertificateDer<'a>],
) -> Vec<&'a [u8]> {
    std::iter::once(end_entity.as_ref())
        .chain(intermediates.iter().map(|c| c.as_ref()))
        .collect()
}

/// Checks the chain a dialed server presents, pinned to the expected identity.
#[derive(Debug)]
struct PinnedServerVerifier {
    kind: CertificateKind,
    expected: PeerIdentity,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for PinnedServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        verify_chain(
            &full_chain(end_entity, intermediates),
            self.kind,
            Some(&self.expected),
        )
        .map_err(trust_failure)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Checks the chain a connecting client presents.
#[derive(Debug)]
struct HostKeyClientVerifier {
    kind: CertificateKind,
    provider: Arc<CryptoProvider>,
}

impl ClientCertVerifier for HostKeyClientVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        verify_chain(&full_chain(end_entity, intermediates), self.kind, None)
            .map_err(trust_failure)?;
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }
}

fn tls_error(err: rustls::Error) -> TransportError {
    TransportError::TlsError {
        reason: err.to_string(),
    }
}

fn issue(host_key: &HostKey, kind: CertificateKind) -> Result<HostKeyCertificate, TransportError> {
    HostKeyCertificate::issue(host_key, kind).map_err(|e| TransportError::CertificateError {
        reason: e.to_string(),
    })
}

/// Builds TLS endpoints for the node's host key.
///
/// Every call issues a new certificate so no two connections share one.
#[derive(Debug, Clone)]
pub struct TlsContext {
    host_key: Arc<HostKey>,
    kind: CertificateKind,
}

impl TlsContext {
    /// Context presenting and expecting `kind` chains.
    pub fn new(host_key: Arc<HostKey>, kind: CertificateKind) -> Self {
        Self { host_key, kind }
    }

    /// Certificate layout in use.
    pub fn kind(&self) -> CertificateKind {
        self.kind
    }

    /// Acceptor for one incoming connection.
    pub fn acceptor(&self) -> Result<TlsAcceptor, TransportError> {
        let (chain, key) = issue(&self.host_key, self.kind)?.into_parts();
        let provider = provider();
        let verifier = HostKeyClientVerifier {
            kind: self.kind,
            provider: provider.clone(),
        };

        let config = rustls::ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(tls_error)?
            .with_client_cert_verifier(Arc::new(verifier))
            .with_single_cert(chain, key)
            .map_err(tls_error)?;

        Ok(TlsAcceptor::from(Arc::new(config)))
    }

    /// Connector for one outgoing connection to `expected`.
    pub fn connector(&self, expected: PeerIdentity) -> Result<TlsConnector, TransportError> {
        let (chain, key) = issue(&self.host_key, self.kind)?.into_parts();
        let provider = provider();
        let verifier = PinnedServerVerifier {
            kind: self.kind,
            expected,
            provider: provider.clone(),
        };

        let mut config = rustls::ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(tls_error)?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_client_auth_cert(chain, key)
            .map_err(tls_error)?;
        config.enable_sni = false;

        Ok(TlsConnector::from(Arc::new(config)))
    }

    /// Server name passed to the connector.
    pub fn server_name() -> Result<ServerName<'static>, TransportError> {
        ServerName::try_from(PEER_SERVER_NAME).map_err(|e| TransportError::TlsError {
            reason: e.to_string(),
        })
    }
}
