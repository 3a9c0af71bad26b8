//! # Domain Layer
//!
//! Pure gossip logic: message identifiers, the knowledge cache, the session
//! registry, retry backoff and fixed-window rate limiting. Nothing in here
//! performs I/O or reads the clock; callers pass `now` in.

pub mod close_reason;
pub mod config;
pub mod entities;
pub mod errors;
pub mod knowledge_cache;
pub mod rate_limit;
pub mod retry;
pub mod session_registry;
pub mod value_objects;

pub use close_reason::{CloseReason, DisconnectReason};
pub use config::GossipConfig;
pub use entities::{GossipMessage, GossipPeerInfo, StoredIdentity};
pub use errors::{GossipError, StorageError};
pub use knowledge_cache::{KnowledgeCache, NotificationAllocation};
pub use rate_limit::{RateLimitPolicy, RateLimiterCache, WindowLimit, RATE_LIMITER_CAPACITY};
pub use retry::{RetryState, SERVER_BOUND_REARM_MILLIS};
pub use session_registry::{AdmitOutcome, SessionRegistry};
pub use value_objects::{
    DataType, GossipMessageId, MessageNotificationId, NextTtl, SessionDirection, SubscriberId,
};
