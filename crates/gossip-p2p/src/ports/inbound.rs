//! # Driving Port
//!
//! The knowledge API exposed to locally attached modules.

use std::sync::Arc;

use crate::domain::{DataType, GossipError, MessageNotificationId, SubscriberId};
use crate::ports::ApiSubscriber;

/// Operations available to local modules.
///
/// # Example
///
/// ```rust,ignore
/// fn announce<A: KnowledgeApi>(api: &A, me: SubscriberId) -> Result<(), GossipError> {
///     api.spread_information(me, 64, DataType(7), b"hello".to_vec())
/// }
/// ```
pub trait KnowledgeApi: Send + Sync {
    /// Subscribe `subscriber` to items of `data_type`.
    fn register_notification(&self, subscriber: Arc<dyn ApiSubscriber>, data_type: DataType);

    /// Inject a locally originated item.
    ///
    /// The originator must be subscribed to `data_type`. Other subscribers
    /// validate the item before it enters the network.
    fn spread_information(
        &self,
        originator: SubscriberId,
        ttl: u16,
        data_type: DataType,
        data: Vec<u8>,
    ) -> Result<(), GossipError>;

    /// Report the verdict of one subscriber on a notified item.
    fn receive_message_validation(
        &self,
        notification: MessageNotificationId,
        valid: bool,
    ) -> Result<(), GossipError>;

    /// Drop every subscription of a module that went away.
    fn handle_disconnected_api_client(&self, subscriber: SubscriberId);
}
