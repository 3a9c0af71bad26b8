//! # P2P Protocol
//!
//! Each connection runs a small state machine with one handler per state:
//!
//! | state | role | leaves on |
//! |-------|------|-----------|
//! | [`ServerHandshake`] | listener | Hello |
//! | [`ClientHandshake`] | dialer | HandshakeComplete |
//! | [`EstablishedSession`] | both | close |
//!
//! The handshake deadline applies until the session is verified.

pub mod client;
pub mod server;
pub mod session;

pub use client::{ClientHandshake, HandshakeResult};
pub use server::ServerHandshake;
pub use session::EstablishedSession;

use std::sync::Arc;
use tracing::warn;

use crate::domain::{CloseReason, DisconnectReason, GossipError};
use crate::service::GossipService;
use crate::transport::{ChannelHandle, P2pPacket, PacketHandler};

/// Active handler of a P2P connection.
#[derive(Debug)]
enum ProtocolState {
    AwaitingHello(ServerHandshake),
    AwaitingComplete(ClientHandshake),
    Verified(EstablishedSession),
}

/// Drives the handshake, then the established session, of one connection.
#[derive(Debug)]
pub struct P2pHandler {
    service: Arc<GossipService>,
    state: ProtocolState,
}

impl P2pHandler {
    /// Handler for an accepted connection.
    pub fn server(service: Arc<GossipService>, handshake: ServerHandshake) -> Self {
        Self {
            service,
            state: ProtocolState::AwaitingHello(handshake),
        }
    }

    /// Handler for a dialed connection. Hello must already be queued.
    pub fn client(service: Arc<GossipService>, handshake: ClientHandshake) -> Self {
        Self {
            service,
            state: ProtocolState::AwaitingComplete(handshake),
        }
    }
}

fn on_session_packet(
    service: &GossipService,
    session: &EstablishedSession,
    packet: P2pPacket,
) -> Result<(), CloseReason> {
    match packet {
        P2pPacket::SpreadKnowledge {
            id,
            ttl,
            data_type,
            data,
        } => match service.handle_incoming_knowledge_spread(session, id, ttl, data_type, data) {
            Ok(()) => Ok(()),
            Err(GossipError::RateLimit(peer)) => {
                warn!(%peer, "Peer exceeded the knowledge spread rate limit");
                Err(CloseReason::Local(DisconnectReason::NotAllowed))
            }
            Err(e) => {
                warn!(peer = %session.identity(), error = %e, "Dropping knowledge spread");
                Ok(())
            }
        },
        P2pPacket::Disconnect { reason } => Err(CloseReason::Remote(reason)),
        P2pPacket::Hello { .. } | P2pPacket::HandshakeComplete => {
            Err(CloseReason::Local(DisconnectReason::Cancelled))
        }
    }
}

impl PacketHandler<P2pPacket> for P2pHandler {
    fn on_packet(
        &mut self,
        packet: P2pPacket,
        channel: &ChannelHandle<P2pPacket>,
    ) -> Result<(), CloseReason> {
        let verified = match &mut self.state {
            ProtocolState::AwaitingHello(handshake) => {
                handshake.on_packet(&self.service, packet, channel)?
            }
            ProtocolState::AwaitingComplete(handshake) => {
                handshake.on_packet(&self.service, packet, channel)?
            }
            ProtocolState::Verified(session) => {
                on_session_packet(&self.service, session, packet)?;
                None
            }
        };

        if let Some(session) = verified {
            self.state = ProtocolState::Verified(session);
        }
        Ok(())
    }

    fn awaiting_handshake(&self) -> bool {
        !matches!(self.state, ProtocolState::Verified(_))
    }

    fn farewell(&self, reason: DisconnectReason) -> Option<P2pPacket> {
        Some(P2pPacket::Disconnect { reason })
    }

    fn on_closed(&mut self, reason: &CloseReason, _channel: &ChannelHandle<P2pPacket>) {
        match &mut self.state {
            ProtocolState::Verified(session) => self.service.handle_session_disconnect(session),
            ProtocolState::AwaitingComplete(handshake) => handshake.complete(Err(reason.clone())),
            ProtocolState::AwaitingHello(_) => {}
        }
    }
}
