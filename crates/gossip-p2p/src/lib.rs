//! # Gossip P2P - Authenticated Knowledge Dissemination
//!
//! A node keeps a bounded set of mutually authenticated TLS sessions with
//! known peers and floods opaque knowledge items through them. Local modules
//! attach over a small TCP API: they announce items, subscribe to data
//! types, and validate every received item before it is forwarded.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** sessions, backoff, rate limits, the knowledge cache
//! - **Ports Layer:** knowledge API, identity storage, clock, connector
//! - **Service Layer:** the gossip engine wiring domain to ports
//! - **Protocol Layer:** handshake state machines and established sessions
//! - **Transport Layer:** frames, TLS, per-connection tasks
//! - **Adapters Layer:** identity files, TOML config, local API server
//!
//! ## Example
//!
//! ```rust,ignore
//! use gossip_p2p::{GossipNode, TomlConfigProvider};
//!
//! let config = TomlConfigProvider::load("gossip.toml")?;
//! let node = GossipNode::start(config).await?;
//! tokio::signal::ctrl_c().await?;
//! node.shutdown().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod domain;
pub mod ports;
pub mod service;

// =============================================================================
// NETWORKING
// =============================================================================

pub mod protocol;
pub mod scheduler;
pub mod transport;

// =============================================================================
// ADAPTERS & WIRING
// =============================================================================

pub mod adapters;
pub mod node;

// Re-exports
pub use adapters::{
    ConfigError, FilePeerIdentityStorage, InMemoryPeerIdentityStorage, NodeConfig,
    TomlConfigProvider,
};
pub use domain::{
    CloseReason, DataType, DisconnectReason, GossipConfig, GossipError, GossipMessageId,
    MessageNotificationId, StorageError, StoredIdentity, SubscriberId,
};
pub use node::{GossipNode, NodeError};
pub use ports::{ApiSubscriber, KnowledgeApi, PeerIdentityStorage, TimeSource};
pub use service::GossipService;
pub use transport::{ApiPacket, P2pPacket, ProtocolRegistry, TransportError};
