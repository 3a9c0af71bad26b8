//! Established, authenticated session with one remote peer.

use shared_crypto::PeerIdentity;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};

use crate::domain::{CloseReason, DisconnectReason, GossipPeerInfo, SessionDirection};
use crate::transport::{ChannelHandle, P2pPacket};

/// The active channel of one authenticated remote peer.
///
/// Cloning shares the underlying connection. Equality and hashing use the
/// remote identity only.
#[derive(Clone, Debug)]
pub struct EstablishedSession {
    peer: GossipPeerInfo,
    direction: SessionDirection,
    channel: ChannelHandle<P2pPacket>,
}

impl EstablishedSession {
    /// Wrap an authenticated channel.
    pub fn new(
        peer: GossipPeerInfo,
        direction: SessionDirection,
        channel: ChannelHandle<P2pPacket>,
    ) -> Self {
        Self {
            peer,
            direction,
            channel,
        }
    }

    /// Remote identity.
    pub fn identity(&self) -> PeerIdentity {
        self.peer.identity()
    }

    /// Remote peer info.
    pub fn peer(&self) -> &GossipPeerInfo {
        &self.peer
    }

    /// Which side dialed.
    pub fn direction(&self) -> SessionDirection {
        self.direction
    }

    /// Whether the remote dialed us.
    pub fn is_server_bound(&self) -> bool {
        self.direction == SessionDirection::ServerBound
    }

    /// Remote socket address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.channel.remote()
    }

    /// Remote IP, IPv4-mapped addresses unwrapped.
    pub fn remote_ip(&self) -> IpAddr {
        self.channel.remote().ip().to_canonical()
    }

    /// Connection this session runs on.
    pub fn connection_id(&self) -> u64 {
        self.channel.connection_id()
    }

    /// Whether both values wrap the same connection.
    pub fn same_connection(&self, other: &Self) -> bool {
        self.connection_id() == other.connection_id()
    }

    /// Queue a packet. Returns `false` if the connection is already gone.
    pub fn send(&self, packet: P2pPacket) -> bool {
        self.channel.send(packet)
    }

    /// Close with a locally decided reason; the remote is told.
    pub fn disconnect(&self, reason: DisconnectReason) {
        self.channel.close(CloseReason::Local(reason));
    }
}

impl PartialEq for EstablishedSession {
    fn eq(&self, other: &Self) -> bool {
        self.peer == other.peer
    }
}

impl Eq for EstablishedSession {}

impl Hash for EstablishedSession {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.peer.hash(state);
    }
}
