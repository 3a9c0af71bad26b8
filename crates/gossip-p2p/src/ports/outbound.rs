//! # Driven Ports
//!
//! Interfaces the engine requires from its environment.

use shared_crypto::PeerIdentity;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::{DataType, MessageNotificationId, StorageError, StoredIdentity, SubscriberId};
use crate::scheduler::GossipClientContext;

/// A locally attached module receiving notifications.
///
/// `notify` is called while engine locks may be held and must not block.
pub trait ApiSubscriber: Send + Sync {
    /// Stable identifier of this module.
    fn subscriber_id(&self) -> SubscriberId;

    /// Deliver one item for validation (or information, if the id is untracked).
    fn notify(&self, notification: MessageNotificationId, data_type: DataType, data: &[u8]);
}

/// Persistent trust store.
pub trait PeerIdentityStorage: Send + Sync {
    /// Record of `identity`, `None` if unknown.
    fn retrieve(&self, identity: &PeerIdentity) -> Result<Option<StoredIdentity>, StorageError>;

    /// Insert or replace a record.
    fn store(&self, record: StoredIdentity) -> Result<(), StorageError>;

    /// Every readable record.
    fn load_all(&self) -> Result<Vec<StoredIdentity>, StorageError>;
}

/// Wall clock in epoch milliseconds.
pub trait TimeSource: Send + Sync {
    /// Current time.
    fn now_millis(&self) -> u64;
}

/// System clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for deterministic tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct FixedTimeSource(std::sync::atomic::AtomicU64);

#[cfg(any(test, feature = "test-utils"))]
impl FixedTimeSource {
    /// Clock frozen at `millis`.
    pub fn new(millis: u64) -> Self {
        Self(std::sync::atomic::AtomicU64::new(millis))
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.0
            .fetch_add(millis, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl TimeSource for FixedTimeSource {
    fn now_millis(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Starts an outbound connection attempt for a client context.
///
/// Implementations must return immediately; the attempt runs in the
/// background and reports back through the context.
pub trait Connector: Send + Sync {
    /// Dial the peer of `context`.
    fn connect(&self, context: Arc<GossipClientContext>);
}
