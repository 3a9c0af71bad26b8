//! Knowledge items from local modules and from peers.
//!
//! ```text
//! received/originated --> cached --> [validation round] --> spread to sessions
//! ```
//!
//! An item is forwarded only when its next TTL is non-negative, at least one
//! local module is subscribed to its type, and every notified subscriber
//! reported it valid. A single invalid verdict drops it.

use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::GossipService;
use crate::domain::{
    DataType, GossipError, GossipMessage, GossipMessageId, MessageNotificationId, NextTtl,
    NotificationAllocation, SubscriberId,
};
use crate::ports::ApiSubscriber;
use crate::protocol::EstablishedSession;
use crate::transport::{P2pPacket, MAX_KNOWLEDGE_PAYLOAD};

impl GossipService {
    /// Accept an item announced by a local module.
    pub(super) fn originate(
        &self,
        originator: SubscriberId,
        ttl: u16,
        data_type: DataType,
        data: Vec<u8>,
    ) -> Result<(), GossipError> {
        let validators = {
            let subscriptions = self.subscriptions.read();
            if !subscriptions.is_subscribed(originator, data_type) {
                return Err(GossipError::UnsubscribedSpread(data_type));
            }
            subscriptions.subscribers(data_type, Some(originator))
        };

        if data.len() > MAX_KNOWLEDGE_PAYLOAD {
            return Err(GossipError::PayloadTooLarge {
                size: data.len(),
                max: MAX_KNOWLEDGE_PAYLOAD,
            });
        }

        let next_ttl = NextTtl::from_received(ttl);
        let message = self
            .knowledge
            .create_unique(|id| GossipMessage::local(id, next_ttl, data_type, data));
        debug!(
            id = %message.id(),
            %data_type,
            %originator,
            validators = validators.len(),
            "Local module announced knowledge"
        );

        if validators.is_empty() {
            if next_ttl.may_forward() {
                self.spread_to_network(&message);
            }
            return Ok(());
        }

        let notification = if next_ttl.may_forward() {
            match self.open_validation_round(&message, validators.len()) {
                Some(notification) => notification,
                None => {
                    self.knowledge.remove(&message.id());
                    return Err(GossipError::ValidationBacklogFull);
                }
            }
        } else {
            self.knowledge.untracked_notification()
        };

        notify_all(&validators, notification, &message);
        Ok(())
    }

    /// Accept an item received from an established session.
    ///
    /// Fails with [`GossipError::RateLimit`] when the peer exceeded its
    /// allowance; the caller closes the session.
    pub fn handle_incoming_knowledge_spread(
        &self,
        session: &EstablishedSession,
        id: GossipMessageId,
        ttl: u16,
        data_type: DataType,
        data: Vec<u8>,
    ) -> Result<(), GossipError> {
        let origin = session.identity();
        if !self.spread_limiter.try_acquire(&origin, self.time.now_millis()) {
            return Err(GossipError::RateLimit(origin));
        }

        let next_ttl = NextTtl::from_received(ttl);
        let (message, created) = self.knowledge.get_or_create(id, || {
            GossipMessage::received(id, origin, next_ttl, data_type, data)
        });
        if !created {
            trace!(%id, peer = %origin, "Duplicate knowledge item");
            message.mark_transmitted(origin);
            return Ok(());
        }

        let subscribers = self.subscriptions.read().subscribers(data_type, None);
        if subscribers.is_empty() {
            debug!(%id, %data_type, "No module subscribed, item is not forwarded");
            return Ok(());
        }

        let notification = if next_ttl.may_forward() {
            match self.open_validation_round(&message, subscribers.len()) {
                Some(notification) => notification,
                None => {
                    warn!(%id, peer = %origin, "Validation backlog full, dropping knowledge item");
                    return Ok(());
                }
            }
        } else {
            self.knowledge.untracked_notification()
        };

        notify_all(&subscribers, notification, &message);
        Ok(())
    }

    /// Apply one subscriber verdict.
    pub(super) fn apply_validation(
        &self,
        notification: MessageNotificationId,
        valid: bool,
    ) -> Result<(), GossipError> {
        let message = self
            .knowledge
            .resolve(notification)
            .ok_or(GossipError::InvalidMessageId(notification))?;

        if !valid {
            self.knowledge.invalidate(notification);
            debug!(id = %message.id(), %notification, "Knowledge item reported invalid");
            return Ok(());
        }

        if message.report_valid() {
            self.knowledge.release_notification(notification);
            self.spread_to_network(&message);
        }
        Ok(())
    }

    fn open_validation_round(
        &self,
        message: &GossipMessage,
        validators: usize,
    ) -> Option<MessageNotificationId> {
        match self.knowledge.allocate_notification(message.id()) {
            NotificationAllocation::Allocated(notification) => {
                message.await_validations(validators);
                Some(notification)
            }
            NotificationAllocation::BacklogFull | NotificationAllocation::Evicted => None,
        }
    }

    /// Send an item to every session that has not seen it yet.
    pub(super) fn spread_to_network(&self, message: &GossipMessage) {
        let registry = self.sessions.read();
        let mut sent = 0usize;
        for session in registry.sessions() {
            if !message.mark_transmitted(session.identity()) {
                continue;
            }
            let packet = P2pPacket::SpreadKnowledge {
                id: message.id(),
                ttl: message.next_ttl().wire_value(),
                data_type: message.data_type(),
                data: message.data().to_vec(),
            };
            if session.send(packet) {
                sent += 1;
            }
        }
        debug!(id = %message.id(), peers = sent, "Spread knowledge item");
    }
}

fn notify_all(
    subscribers: &[Arc<dyn ApiSubscriber>],
    notification: MessageNotificationId,
    message: &GossipMessage,
) {
    for subscriber in subscribers {
        subscriber.notify(notification, message.data_type(), message.data());
    }
}
