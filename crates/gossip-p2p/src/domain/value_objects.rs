//! Value objects shared by the engine, the wire codec and the API.

use rand::RngCore;
use std::fmt;
use uuid::Uuid;

/// 8 random bytes naming one gossip item network-wide.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GossipMessageId([u8; 8]);

impl GossipMessageId {
    /// Identifier length on the wire.
    pub const LEN: usize = 8;

    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Draw a random identifier.
    pub fn random() -> Self {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for GossipMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GossipMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GossipMessageId({self})")
    }
}

/// Short-lived handle of one local validation round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageNotificationId(u16);

impl MessageNotificationId {
    /// Wrap a raw value.
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Draw a random identifier.
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Raw value.
    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for MessageNotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

/// Application data-type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataType(pub u16);

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remaining hop budget after the local hop has been accounted for.
///
/// | received TTL | next TTL | meaning |
/// |---|---|---|
/// | 1 | -1 | expired here, never forwarded |
/// | 0 | 0 | unlimited |
/// | N | N-1 | hops remaining |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NextTtl(i32);

impl NextTtl {
    /// Expired at this hop.
    pub const EXPIRED: Self = Self(-1);

    /// Unlimited hop budget.
    pub const UNLIMITED: Self = Self(0);

    /// Apply the local hop to a received (or locally requested) TTL.
    pub fn from_received(ttl: u16) -> Self {
        match ttl {
            1 => Self::EXPIRED,
            0 => Self::UNLIMITED,
            n => Self(i32::from(n) - 1),
        }
    }

    /// Whether the item may still travel further.
    pub fn may_forward(self) -> bool {
        self.0 >= 0
    }

    /// Value carried in the TTL field of a forwarded packet.
    pub fn wire_value(self) -> u16 {
        u16::try_from(self.0).unwrap_or(0)
    }

    /// Raw value (-1, 0 or hops remaining).
    pub fn value(self) -> i32 {
        self.0
    }
}

/// Which side opened the TCP connection underlying a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionDirection {
    /// The remote dialed us.
    ServerBound,
    /// We dialed the remote.
    ClientBound,
}

impl fmt::Display for SessionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerBound => f.write_str("server-bound"),
            Self::ClientBound => f.write_str("client-bound"),
        }
    }
}

/// Identifier of one locally attached API module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
