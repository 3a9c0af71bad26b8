use std::sync::Arc;
use tracing::debug;

use super::GossipService;
use crate::domain::{DataType, GossipError, MessageNotificationId, SubscriberId};
use crate::ports::{ApiSubscriber, KnowledgeApi};

impl KnowledgeApi for GossipService {
    fn register_notification(&self, subscriber: Arc<dyn ApiSubscriber>, data_type: DataType) {
        debug!(subscriber = %subscriber.subscriber_id(), %data_type, "Module subscribed");
        self.subscriptions.write().register(subscriber, data_type);
    }

    fn spread_information(
        &self,
        originator: SubscriberId,
        ttl: u16,
        data_type: DataType,
        data: Vec<u8>,
    ) -> Result<(), GossipError> {
        self.originate(originator, ttl, data_type, data)
    }

    fn receive_message_validation(
        &self,
        notification: MessageNotificationId,
        valid: bool,
    ) -> Result<(), GossipError> {
        self.apply_validation(notification, valid)
    }

    fn handle_disconnected_api_client(&self, subscriber: SubscriberId) {
        let removed = self.subscriptions.write().remove_subscriber(subscriber);
        debug!(%subscriber, subscriptions = removed, "Module disconnected");
    }
}
