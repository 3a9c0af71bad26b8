//! Domain entities: remote peers, stored identities and gossip messages.

use parking_lot::Mutex;
use shared_crypto::{PeerIdentity, PeerPublicKey};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI32, Ordering};

use super::value_objects::{DataType, GossipMessageId, NextTtl};

/// Identity and public key of a remote peer.
///
/// Equality and hashing use the identity only.
#[derive(Clone, Debug)]
pub struct GossipPeerInfo {
    identity: PeerIdentity,
    public_key: PeerPublicKey,
}

impl GossipPeerInfo {
    /// Build from a public key; the identity is derived.
    pub fn new(public_key: PeerPublicKey) -> Self {
        Self {
            identity: public_key.identity(),
            public_key,
        }
    }

    /// Peer identity.
    pub fn identity(&self) -> PeerIdentity {
        self.identity
    }

    /// Peer host key.
    pub fn public_key(&self) -> &PeerPublicKey {
        &self.public_key
    }
}

impl PartialEq for GossipPeerInfo {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for GossipPeerInfo {}

impl Hash for GossipPeerInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

/// Persisted trust record of one peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredIdentity {
    /// Last known hostname or IP literal
    pub last_seen_hostname: Option<String>,
    /// Last known P2P port
    pub last_seen_port: Option<u16>,
    /// Host key of the peer
    pub public_key: PeerPublicKey,
}

impl StoredIdentity {
    /// Record without a known address.
    pub fn new(public_key: PeerPublicKey) -> Self {
        Self {
            last_seen_hostname: None,
            last_seen_port: None,
            public_key,
        }
    }

    /// Record with a known address.
    pub fn with_address(public_key: PeerPublicKey, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            last_seen_hostname: Some(hostname.into()),
            last_seen_port: Some(port),
            public_key,
        }
    }

    /// Identity the record is filed under.
    pub fn identity(&self) -> PeerIdentity {
        self.public_key.identity()
    }

    /// Dialable address, when both parts are known.
    pub fn address(&self) -> Option<(&str, u16)> {
        match (&self.last_seen_hostname, self.last_seen_port) {
            (Some(host), Some(port)) => Some((host.as_str(), port)),
            _ => None,
        }
    }

    /// Remote peer view of this record.
    pub fn peer_info(&self) -> GossipPeerInfo {
        GossipPeerInfo::new(self.public_key.clone())
    }
}

/// Marker for "not awaiting validation".
const NOT_AWAITING: i32 = -1;

/// One cached gossip item.
///
/// The payload and routing data are immutable; the completed-transmission
/// set and the pending-validation counter are updated concurrently.
#[derive(Debug)]
pub struct GossipMessage {
    id: GossipMessageId,
    next_ttl: NextTtl,
    data_type: DataType,
    data: Vec<u8>,
    origin: Option<PeerIdentity>,
    completed: Mutex<HashSet<PeerIdentity>>,
    pending_validations: AtomicI32,
}

impl GossipMessage {
    /// Message originated by a local module.
    pub fn local(id: GossipMessageId, next_ttl: NextTtl, data_type: DataType, data: Vec<u8>) -> Self {
        Self {
            id,
            next_ttl,
            data_type,
            data,
            origin: None,
            completed: Mutex::new(HashSet::new()),
            pending_validations: AtomicI32::new(NOT_AWAITING),
        }
    }

    /// Message received from `origin`; the origin counts as already served.
    pub fn received(
        id: GossipMessageId,
        origin: PeerIdentity,
        next_ttl: NextTtl,
        data_type: DataType,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id,
            next_ttl,
            data_type,
            data,
            origin: Some(origin),
            completed: Mutex::new(HashSet::from([origin])),
            pending_validations: AtomicI32::new(NOT_AWAITING),
        }
    }

    /// Message id.
    pub fn id(&self) -> GossipMessageId {
        self.id
    }

    /// Hop budget after this node.
    pub fn next_ttl(&self) -> NextTtl {
        self.next_ttl
    }

    /// Data type tag.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Opaque payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Session the message arrived on, `None` when originated locally.
    pub fn origin(&self) -> Option<PeerIdentity> {
        self.origin
    }

    /// Start awaiting `count` validations.
    pub fn await_validations(&self, count: usize) {
        let count = i32::try_from(count).unwrap_or(i32::MAX);
        self.pending_validations.store(count, Ordering::SeqCst);
    }

    /// Whether reports are still outstanding.
    pub fn is_awaiting_validation(&self) -> bool {
        self.pending_validations.load(Ordering::SeqCst) > 0
    }

    /// Record one positive report.
    ///
    /// Returns `true` for exactly one caller: the one whose report brings the
    /// counter to zero. A message that is not awaiting never returns `true`.
    pub fn report_valid(&self) -> bool {
        self.pending_validations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                (pending > 0).then(|| pending - 1)
            })
            .map(|previous| previous == 1)
            .unwrap_or(false)
    }

    /// Mark `peer` as served. Returns `false` if it already was.
    pub fn mark_transmitted(&self, peer: PeerIdentity) -> bool {
        self.completed.lock().insert(peer)
    }

    /// Whether `peer` has been served (or is the origin).
    pub fn was_transmitted_to(&self, peer: &PeerIdentity) -> bool {
        self.completed.lock().contains(peer)
    }
}
