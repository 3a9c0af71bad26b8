//! Listening side of the application handshake.
//!
//! ```text
//! AWAITING_HELLO --Hello, checks pass, admitted--> VERIFIED
//! ```
//!
//! Checks run in this order, the first failure closes the channel:
//!
//! | check | reason |
//! |-------|--------|
//! | Hello already processed | CANCELLED |
//! | no TLS peer chain | UNEXPECTED_FAILURE |
//! | unsupported version | UNSUPPORTED |
//! | root key is not RSA | AUTHENTICATION |
//! | identity not in trust store | CANCELLED |
//! | stored key differs | AUTHENTICATION |
//! | root not signed by stored key | AUTHENTICATION |
//! | source IP differs from last-seen host | AUTHENTICATION |

use rustls::pki_types::CertificateDer;
use shared_crypto::{inspect_chain, root_signed_by};
use std::net::IpAddr;
use tracing::{info, warn};

use super::session::EstablishedSession;
use crate::domain::{CloseReason, DisconnectReason, GossipPeerInfo, SessionDirection};
use crate::service::GossipService;
use crate::transport::{ChannelHandle, P2pPacket, PROTOCOL_VERSION};

/// Server-side handshake state.
#[derive(Debug)]
pub struct ServerHandshake {
    peer_chain: Option<Vec<CertificateDer<'static>>>,
    hello_processed: bool,
}

impl ServerHandshake {
    /// State right after TLS completed with the given client chain.
    pub fn new(peer_chain: Option<Vec<CertificateDer<'static>>>) -> Self {
        Self {
            peer_chain,
            hello_processed: false,
        }
    }

    /// Handle one packet; `Some` carries the admitted session.
    pub(crate) fn on_packet(
        &mut self,
        service: &GossipService,
        packet: P2pPacket,
        channel: &ChannelHandle<P2pPacket>,
    ) -> Result<Option<EstablishedSession>, CloseReason> {
        match packet {
            P2pPacket::Hello { version } => {
                let remote_ip = channel.remote().ip().to_canonical();
                let peer = self
                    .verify_hello(service, version, remote_ip)
                    .map_err(CloseReason::Local)?;

                let session =
                    EstablishedSession::new(peer, SessionDirection::ServerBound, channel.clone());
                service
                    .adopt_session(&session)
                    .map_err(CloseReason::Local)?;

                info!(
                    peer = %session.identity(),
                    remote = %channel.remote(),
                    "Completed handshake with client"
                );
                Ok(Some(session))
            }
            P2pPacket::Disconnect { reason } => Err(CloseReason::Remote(reason)),
            _ => Err(CloseReason::Local(DisconnectReason::Cancelled)),
        }
    }

    fn verify_hello(
        &mut self,
        service: &GossipService,
        version: u8,
        remote_ip: IpAddr,
    ) -> Result<GossipPeerInfo, DisconnectReason> {
        if self.hello_processed {
            return Err(DisconnectReason::Cancelled);
        }
        self.hello_processed = true;

        let chain = self
            .peer_chain
            .as_deref()
            .ok_or(DisconnectReason::UnexpectedFailure)?;

        if version != PROTOCOL_VERSION {
            warn!(version, "Client speaks unsupported protocol version");
            return Err(DisconnectReason::Unsupported);
        }

        let info = inspect_chain(chain).map_err(|_| DisconnectReason::Authentication)?;
        let presented = info
            .root_public_key()
            .ok_or(DisconnectReason::Authentication)?;

        let stored = match service.retrieve_identity(&info.identity) {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                warn!(peer = %info.identity, "Connecting peer is not in the identity storage");
                return Err(DisconnectReason::Cancelled);
            }
            Err(e) => {
                warn!(peer = %info.identity, error = %e, "Identity storage lookup failed");
                return Err(DisconnectReason::UnexpectedFailure);
            }
        };

        if stored.public_key != presented {
            return Err(DisconnectReason::Authentication);
        }
        if !root_signed_by(chain, &stored.public_key) {
            return Err(DisconnectReason::Authentication);
        }

        let expected_ip = stored
            .last_seen_hostname
            .as_deref()
            .and_then(|host| host.parse::<IpAddr>().ok())
            .map(|ip| ip.to_canonical());
        if expected_ip != Some(remote_ip) {
            warn!(
                peer = %info.identity,
                remote = %remote_ip,
                expected = ?stored.last_seen_hostname,
                "Unknown host address for peer"
            );
            return Err(DisconnectReason::Authentication);
        }

        Ok(stored.peer_info())
    }
}
