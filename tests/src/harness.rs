//! # Test Harness
//!
//! Nodes on loopback with their own in-memory identity storage, and a
//! minimal module client for the local API.
//!
//! Nodes bind port 0, so trust is introduced after start: [`TestNode::trust`]
//! stores the other node's record (with its real P2P port) and rebuilds the
//! outbound peer list.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gossip_p2p::domain::{DataType, MessageNotificationId};
use gossip_p2p::ports::SystemTimeSource;
use gossip_p2p::protocol::HandshakeResult;
use gossip_p2p::transport::{read_packet, write_packet, TlsContext};
use gossip_p2p::{
    ApiPacket, GossipConfig, GossipNode, InMemoryPeerIdentityStorage, PeerIdentityStorage,
    ProtocolRegistry, StoredIdentity,
};
use shared_crypto::testing::test_host_key;
use shared_crypto::{CertificateKind, HostKey, PeerIdentity};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};

/// How long cluster conditions may take to settle.
pub const SETTLE: Duration = Duration::from_secs(5);

/// Loopback address every node binds and records.
pub const LOOPBACK: &str = "127.0.0.1";

// =============================================================================
// NODES
// =============================================================================

/// A running node plus the storage it trusts.
pub struct TestNode {
    pub node: GossipNode,
    pub storage: Arc<InMemoryPeerIdentityStorage>,
    pub host_key: Arc<HostKey>,
}

impl TestNode {
    /// Start a node with the fixture key of `slot`.
    pub async fn start(slot: usize, config: GossipConfig) -> Self {
        let host_key = Arc::new(test_host_key(slot));
        let storage = Arc::new(InMemoryPeerIdentityStorage::new());
        let loopback: SocketAddr = format!("{LOOPBACK}:0").parse().expect("loopback address");
        let node = GossipNode::start_with(
            config,
            host_key.clone(),
            storage.clone(),
            Arc::new(SystemTimeSource),
            loopback,
            loopback,
        )
        .await
        .expect("node start");
        Self {
            node,
            storage,
            host_key,
        }
    }

    /// Identity of this node.
    pub fn identity(&self) -> PeerIdentity {
        self.node.identity()
    }

    /// How other nodes should record this one.
    pub fn record(&self) -> StoredIdentity {
        StoredIdentity::with_address(
            self.host_key.public_key().clone(),
            LOOPBACK,
            self.node.p2p_addr().port(),
        )
    }

    /// Trust `record` and refresh the outbound peer list.
    pub fn trust_record(&self, record: StoredIdentity) {
        self.storage.store(record).expect("store identity");
        self.node
            .service()
            .populate_clients()
            .expect("populate clients");
    }

    /// Trust another node at its loopback address.
    pub fn trust(&self, other: &TestNode) {
        self.trust_record(other.record());
    }

    /// Dial `other` and wait for the handshake outcome.
    pub async fn connect(&self, other: &TestNode) -> HandshakeResult {
        self.node.connect(&other.identity()).await
    }

    /// Whether a session with `other` is registered here.
    pub fn is_connected(&self, other: &TestNode) -> bool {
        self.node.service().is_connected(&other.identity())
    }

    /// Number of registered sessions.
    pub fn sessions(&self) -> usize {
        self.node.service().session_count()
    }

    /// TLS context presenting this node's key, for hand-rolled peers.
    pub fn tls(&self) -> TlsContext {
        TlsContext::new(self.host_key.clone(), CertificateKind::Chained)
    }
}

/// Make every node trust every other node.
pub fn mesh(nodes: &[&TestNode]) {
    for node in nodes {
        for other in nodes {
            if node.identity() != other.identity() {
                node.trust(other);
            }
        }
    }
}

/// Connect `a` to `b` and wait until both sides registered the session.
pub async fn link(a: &TestNode, b: &TestNode) {
    a.connect(b).await.expect("handshake");
    eventually("session registered on both sides", || {
        a.is_connected(b) && b.is_connected(a)
    })
    .await;
}

/// Poll `condition` until it holds, panicking after [`SETTLE`].
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + SETTLE;
    while !condition() {
        if Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// MODULE CLIENT
// =============================================================================

/// A local module attached over the API socket.
pub struct ModuleClient {
    stream: TcpStream,
    registry: ProtocolRegistry,
}

impl ModuleClient {
    /// Attach to a node's API socket.
    pub async fn attach(node: &TestNode) -> Self {
        let stream = TcpStream::connect(node.node.api_addr())
            .await
            .expect("api connect");
        Self {
            stream,
            registry: ProtocolRegistry::api_client(),
        }
    }

    /// Send any packet allowed for modules.
    pub async fn send(&mut self, packet: ApiPacket) {
        write_packet(&mut self.stream, &self.registry, &packet)
            .await
            .expect("api write");
    }

    /// Send a packet with the node-side table, bypassing the module checks.
    pub async fn send_forbidden(&mut self, packet: ApiPacket) {
        write_packet(&mut self.stream, &ProtocolRegistry::api_server(), &packet)
            .await
            .expect("api write");
    }

    /// Subscribe to `data_type` and wait until the node registered it.
    pub async fn subscribe(&mut self, node: &TestNode, data_type: DataType) {
        let before = node.node.service().subscribed_modules();
        self.send(ApiPacket::Notify { data_type }).await;
        eventually("subscription registered", || {
            node.node.service().subscribed_modules() > before
        })
        .await;
    }

    /// Announce an item.
    pub async fn announce(&mut self, ttl: u8, data_type: DataType, data: &[u8]) {
        self.send(ApiPacket::Announce {
            ttl,
            data_type,
            data: data.to_vec(),
        })
        .await;
    }

    /// Report a verdict.
    pub async fn validate(&mut self, notification: MessageNotificationId, valid: bool) {
        self.send(ApiPacket::Validation {
            notification,
            valid,
        })
        .await;
    }

    /// Next packet within `wait`; `None` on timeout or end of stream.
    pub async fn next_within(&mut self, wait: Duration) -> Option<ApiPacket> {
        match timeout(wait, read_packet::<ApiPacket, _>(&mut self.stream, &self.registry)).await {
            Ok(Ok(packet)) => packet,
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Next notification, panicking if none arrives.
    pub async fn expect_notification(&mut self) -> (MessageNotificationId, DataType, Vec<u8>) {
        match self.next_within(SETTLE).await {
            Some(ApiPacket::Notification {
                notification,
                data_type,
                data,
            }) => (notification, data_type, data),
            other => panic!("expected a notification, got {other:?}"),
        }
    }

    /// Assert nothing arrives for a while.
    pub async fn expect_silence(&mut self) {
        if let Some(packet) = self.next_within(Duration::from_millis(300)).await {
            panic!("expected silence, got {packet:?}");
        }
    }

    /// Whether the node closed the connection within [`SETTLE`].
    pub async fn closed_by_node(&mut self) -> bool {
        let deadline = Instant::now() + SETTLE;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            match timeout(left, read_packet::<ApiPacket, _>(&mut self.stream, &self.registry)).await
            {
                Ok(Ok(Some(_))) => continue,
                Ok(Ok(None)) | Ok(Err(_)) => return true,
                Err(_) => return false,
            }
        }
    }
}
