//! Domain errors for the gossip engine and identity storage.

use shared_crypto::PeerIdentity;
use thiserror::Error;

use super::value_objects::{DataType, MessageNotificationId};

/// Request errors returned to the caller of an engine operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GossipError {
    /// Originator is not subscribed to the data type it tries to spread
    #[error("Module is not subscribed to data type {0}")]
    UnsubscribedSpread(DataType),

    /// No validation round is pending under this notification id
    #[error("No pending validation for notification {0}")]
    InvalidMessageId(MessageNotificationId),

    /// Peer exceeded its knowledge-spread allowance
    #[error("Spread rate limit exceeded by {0}")]
    RateLimit(PeerIdentity),

    /// Payload does not fit into one frame
    #[error("Payload of {size} bytes exceeds the maximum of {max}")]
    PayloadTooLarge {
        /// Offered payload size
        size: usize,
        /// Largest payload a frame can carry
        max: usize,
    },

    /// Too many messages are awaiting local validation
    #[error("Validation backlog is full")]
    ValidationBacklogFull,
}

/// Identity storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing store failed
    #[error("Storage I/O error on {path}: {source}")]
    Io {
        /// File or folder involved
        path: String,
        /// Underlying cause
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be decoded
    #[error("Corrupt identity record {path}: {reason}")]
    Corrupt {
        /// File involved
        path: String,
        /// What was wrong
        reason: String,
    },

    /// The stored key does not hash to the identity it is filed under
    #[error("Stored key for {0} does not match its identity")]
    IdentityMismatch(PeerIdentity),
}
