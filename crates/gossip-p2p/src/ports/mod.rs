//! # Ports Layer
//!
//! - **Driving port (inbound):** [`KnowledgeApi`], the operations local
//!   modules invoke through the API transport.
//! - **Driven ports (outbound):** what the engine needs from its adapters:
//!   API subscribers, identity storage, a clock and an outbound connector.

pub mod inbound;
pub mod outbound;

pub use inbound::KnowledgeApi;
pub use outbound::{ApiSubscriber, Connector, PeerIdentityStorage, SystemTimeSource, TimeSource};

#[cfg(any(test, feature = "test-utils"))]
pub use outbound::FixedTimeSource;
