//! # Transport Layer
//!
//! Length-prefixed frames over TLS 1.3 on TCP.
//!
//! ```text
//! | length: u16 | packet id: u16 | payload |
//! ```
//!
//! - `packets` / `codec` / `registry` - wire format and per-role id checks
//! - `channel` - per-connection reader and driver tasks
//! - `tls` - host-key certificates and chain verification in rustls
//! - `server` / `client` - P2P accept loop and outbound dialing

pub mod channel;
pub mod client;
pub mod codec;
pub mod error;
pub mod packets;
pub mod registry;
pub mod server;
pub mod tls;

pub use channel::{spawn_channel, ChannelHandle, Outbound, PacketHandler};
pub use client::{dial, TlsClientConnector};
pub use codec::{encode_frame, read_packet, write_packet};
pub use error::TransportError;
pub use packets::{
    api_ids, p2p_ids, ApiPacket, P2pPacket, Packet, MAX_FRAME_LEN, MAX_KNOWLEDGE_PAYLOAD,
    PROTOCOL_VERSION,
};
pub use registry::ProtocolRegistry;
pub use server::P2pListener;
pub use tls::TlsContext;
