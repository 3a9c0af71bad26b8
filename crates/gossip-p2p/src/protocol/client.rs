//! Dialing side of the application handshake.
//!
//! ```text
//! AWAITING_TLS --TLS done, send Hello--> AWAITING_COMPLETE --HandshakeComplete, admitted--> VERIFIED
//! ```
//!
//! The TLS layer already pinned the server to the dialed identity, so
//! HandshakeComplete is all that is left to wait for.

use tokio::sync::oneshot;
use tracing::info;

use super::session::EstablishedSession;
use crate::domain::{CloseReason, DisconnectReason, GossipPeerInfo, SessionDirection};
use crate::service::GossipService;
use crate::transport::{ChannelHandle, P2pPacket};

/// Outcome of a dial: `Ok` once the session is admitted locally.
pub type HandshakeResult = Result<(), CloseReason>;

/// Client-side handshake state.
#[derive(Debug)]
pub struct ClientHandshake {
    server: GossipPeerInfo,
    completion: Option<oneshot::Sender<HandshakeResult>>,
}

impl ClientHandshake {
    /// State after TLS completed and Hello was queued.
    pub fn new(server: GossipPeerInfo, completion: oneshot::Sender<HandshakeResult>) -> Self {
        Self {
            server,
            completion: Some(completion),
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
            P2pPacket::HandshakeComplete => {
                let session = EstablishedSession::new(
                    self.server.clone(),
                    SessionDirection::ClientBound,
                    channel.clone(),
                );
                service
                    .adopt_session(&session)
                    .map_err(CloseReason::Local)?;

                info!(
                    peer = %session.identity(),
                    remote = %channel.remote(),
                    "Completed handshake with server"
                );
                self.complete(Ok(()));
                Ok(Some(session))
            }
            P2pPacket::Disconnect { reason } => Err(CloseReason::Remote(reason)),
            _ => Err(CloseReason::Local(DisconnectReason::Cancelled)),
        }
    }

    /// Resolve the dial result; later calls are ignored.
    pub(crate) fn complete(&mut self, result: HandshakeResult) {
        if let Some(completion) = self.completion.take() {
            let _ = completion.send(result);
        }
    }
}
