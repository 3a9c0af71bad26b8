//! # Wire Packets
//!
//! Every frame is `u16 length (including itself) | u16 packet id | payload`,
//! big-endian. This module encodes and decodes payloads; framing lives in
//! [`super::codec`].
//!
//! ## P2P
//!
//! | id | packet | payload |
//! |----|--------|---------|
//! | 1 | Hello | u8 version, 3 reserved |
//! | 15 | HandshakeComplete | empty |
//! | 16 | SpreadKnowledge | 8-byte id, u16 ttl, u16 type, 4 reserved, data |
//! | 126 | Disconnect | u8 reason, 3 reserved |
//!
//! ## Local API
//!
//! | id | packet | payload |
//! |----|--------|---------|
//! | 500 | Announce | u8 ttl, 1 reserved, u16 type, data |
//! | 501 | Notify | 2 reserved, u16 type |
//! | 502 | Notification | u16 notification id, u16 type, data |
//! | 503 | Validation | u16 notification id, u16 flags (bit 0 = valid) |

use crate::domain::{DataType, DisconnectReason, GossipMessageId, MessageNotificationId};

use super::TransportError;

/// Frame header: length and packet id.
pub const HEADER_LEN: usize = 4;

/// Largest frame, header included.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Application protocol version spoken in Hello.
pub const PROTOCOL_VERSION: u8 = 1;

const SPREAD_HEADER_LEN: usize = GossipMessageId::LEN + 2 + 2 + 4;

/// Largest payload a SpreadKnowledge packet can carry.
pub const MAX_KNOWLEDGE_PAYLOAD: usize = MAX_FRAME_LEN - HEADER_LEN - SPREAD_HEADER_LEN;

/// P2P packet ids.
pub mod p2p_ids {
    /// Hello
    pub const HELLO: u16 = 1;
    /// HandshakeComplete
    pub const HANDSHAKE_COMPLETE: u16 = 15;
    /// SpreadKnowledge
    pub const SPREAD_KNOWLEDGE: u16 = 16;
    /// Disconnect
    pub const DISCONNECT: u16 = 126;
}

/// API packet ids.
pub mod api_ids {
    /// Announce (module to node)
    pub const ANNOUNCE: u16 = 500;
    /// Notify (module to node)
    pub const NOTIFY: u16 = 501;
    /// Notification (node to module)
    pub const NOTIFICATION: u16 = 502;
    /// Validation (module to node)
    pub const VALIDATION: u16 = 503;
}

/// A packet that can be carried in a frame.
pub trait Packet: Sized + Send + 'static {
    /// Packet id written after the length.
    fn packet_id(&self) -> u16;

    /// Append the payload.
    fn encode_payload(&self, buf: &mut Vec<u8>);

    /// Decode the payload of packet `id`.
    fn decode(id: u16, payload: &[u8]) -> Result<Self, TransportError>;
}

/// Packets exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum P2pPacket {
    /// First application packet of the dialing side.
    Hello {
        /// Protocol version.
        version: u8,
    },
    /// The listening side admitted the session.
    HandshakeComplete,
    /// One gossip item.
    SpreadKnowledge {
        /// Network-wide item id.
        id: GossipMessageId,
        /// Hop budget at the receiver (0 = unlimited).
        ttl: u16,
        /// Data type tag.
        data_type: DataType,
        /// Opaque payload.
        data: Vec<u8>,
    },
    /// Farewell carrying the close reason.
    Disconnect {
        /// Reason code.
        reason: DisconnectReason,
    },
}

impl Packet for P2pPacket {
    fn packet_id(&self) -> u16 {
        match self {
            Self::Hello { .. } => p2p_ids::HELLO,
            Self::HandshakeComplete => p2p_ids::HANDSHAKE_COMPLETE,
            Self::SpreadKnowledge { .. } => p2p_ids::SPREAD_KNOWLEDGE,
            Self::Disconnect { .. } => p2p_ids::DISCONNECT,
        }
    }

    fn encode_payload(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Hello { version } => {
                buf.push(*version);
                buf.extend_from_slice(&[0; 3]);
            }
            Self::HandshakeComplete => {}
            Self::SpreadKnowledge {
                id,
                ttl,
                data_type,
                data,
            } => {
                buf.extend_from_slice(id.as_bytes());
                buf.extend_from_slice(&ttl.to_be_bytes());
                buf.extend_from_slice(&data_type.0.to_be_bytes());
                buf.extend_from_slice(&[0; 4]);
                buf.extend_from_slice(data);
            }
            Self::Disconnect { reason } => {
                buf.push(reason.code());
                buf.extend_from_slice(&[0; 3]);
            }
        }
    }

    fn decode(id: u16, payload: &[u8]) -> Result<Self, TransportError> {
        let mut reader = PayloadReader::new(payload);
        let packet = match id {
            p2p_ids::HELLO => {
                let version = reader.u8()?;
                reader.skip(3)?;
                Self::Hello { version }
            }
            p2p_ids::HANDSHAKE_COMPLETE => Self::HandshakeComplete,
            p2p_ids::SPREAD_KNOWLEDGE => {
                let id = GossipMessageId::new(reader.array()?);
                let ttl = reader.u16()?;
                let data_type = DataType(reader.u16()?);
                reader.skip(4)?;
                Self::SpreadKnowledge {
                    id,
                    ttl,
                    data_type,
                    data: reader.rest(),
                }
            }
            p2p_ids::DISCONNECT => {
                let code = reader.u8()?;
                reader.skip(3)?;
                let reason = DisconnectReason::from_code(code).ok_or_else(|| {
                    TransportError::violation(format!("unknown disconnect reason {code}"))
                })?;
                Self::Disconnect { reason }
            }
            other => {
                return Err(TransportError::violation(format!(
                    "unknown p2p packet id {other}"
                )))
            }
        };
        reader.finish(id)?;
        Ok(packet)
    }
}

/// Packets exchanged with local modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiPacket {
    /// Spread an item into the network.
    Announce {
        /// Requested hop limit (0 = unlimited).
        ttl: u8,
        /// Data type tag.
        data_type: DataType,
        /// Opaque payload.
        data: Vec<u8>,
    },
    /// Subscribe to a data type.
    Notify {
        /// Data type tag.
        data_type: DataType,
    },
    /// An item to validate.
    Notification {
        /// Validation round handle.
        notification: MessageNotificationId,
        /// Data type tag.
        data_type: DataType,
        /// Opaque payload.
        data: Vec<u8>,
    },
    /// Verdict on a notified item.
    Validation {
        /// Validation round handle.
        notification: MessageNotificationId,
        /// Whether the item is valid.
        valid: bool,
    },
}

const VALIDATION_FLAG_VALID: u16 = 0x0001;

impl Packet for ApiPacket {
    fn packet_id(&self) -> u16 {
        match self {
            Self::Announce { .. } => api_ids::ANNOUNCE,
            Self::Notify { .. } => api_ids::NOTIFY,
            Self::Notification { .. } => api_ids::NOTIFICATION,
            Self::Validation { .. } => api_ids::VALIDATION,
        }
    }

    fn encode_payload(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Announce {
                ttl,
                data_type,
                data,
            } => {
                buf.push(*ttl);
                buf.push(0);
                buf.extend_from_slice(&data_type.0.to_be_bytes());
                buf.extend_from_slice(data);
            }
            Self::Notify { data_type } => {
                buf.extend_from_slice(&[0; 2]);
                buf.extend_from_slice(&data_type.0.to_be_bytes());
            }
            Self::Notification {
                notification,
                data_type,
                data,
            } => {
                buf.extend_from_slice(&notification.value().to_be_bytes());
                buf.extend_from_slice(&data_type.0.to_be_bytes());
                buf.extend_from_slice(data);
            }
            Self::Validation {
                notification,
                valid,
            } => {
                let flags = if *valid { VALIDATION_FLAG_VALID } else { 0 };
                buf.extend_from_slice(&notification.value().to_be_bytes());
                buf.extend_from_slice(&flags.to_be_bytes());
            }
        }
    }

    fn decode(id: u16, payload: &[u8]) -> Result<Self, TransportError> {
        let mut reader = PayloadReader::new(payload);
        let packet = match id {
            api_ids::ANNOUNCE => {
                let ttl = reader.u8()?;
                reader.skip(1)?;
                let data_type = DataType(reader.u16()?);
                Self::Announce {
                    ttl,
                    data_type,
                    data: reader.rest(),
                }
            }
            api_ids::NOTIFY => {
                reader.skip(2)?;
                Self::Notify {
                    data_type: DataType(reader.u16()?),
                }
            }
            api_ids::NOTIFICATION => {
                let notification = MessageNotificationId::new(reader.u16()?);
                let data_type = DataType(reader.u16()?);
                Self::Notification {
                    notification,
                    data_type,
                    data: reader.rest(),
                }
            }
            api_ids::VALIDATION => {
                let notification = MessageNotificationId::new(reader.u16()?);
                let flags = reader.u16()?;
                Self::Validation {
                    notification,
                    valid: flags & VALIDATION_FLAG_VALID != 0,
                }
            }
            other => {
                return Err(TransportError::violation(format!(
                    "unknown api packet id {other}"
                )))
            }
        };
        reader.finish(id)?;
        Ok(packet)
    }
}

struct PayloadReader<'a> {
    data: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], TransportError> {
        if self.data.len() < len {
            return Err(TransportError::violation("truncated packet"));
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn skip(&mut self, len: usize) -> Result<(), TransportError> {
        self.take(len).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, TransportError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, TransportError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], TransportError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn rest(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data).to_vec()
    }

    fn finish(self, id: u16) -> Result<(), TransportError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(TransportError::violation(format!(
                "{} trailing bytes in packet {id}",
                self.data.len()
            )))
        }
    }
}
