//! # Knowledge Cache
//!
//! Bounded LRU of gossip messages plus the notification-id translation table.
//! Both maps live behind one lock so that evicting or invalidating a message
//! always drops its translation too: every translated notification id refers
//! to a cached message.

use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use super::entities::GossipMessage;
use super::value_objects::{GossipMessageId, MessageNotificationId};

#[derive(Debug)]
struct CacheEntry {
    message: Arc<GossipMessage>,
    notification: Option<MessageNotificationId>,
}

#[derive(Debug)]
struct CacheState {
    messages: LruCache<GossipMessageId, CacheEntry>,
    notifications: HashMap<MessageNotificationId, GossipMessageId>,
}

impl CacheState {
    fn insert(&mut self, id: GossipMessageId, message: Arc<GossipMessage>) {
        let entry = CacheEntry {
            message,
            notification: None,
        };
        if let Some((_, evicted)) = self.messages.push(id, entry) {
            if let Some(notification) = evicted.notification {
                self.notifications.remove(&notification);
            }
        }
    }

    // the translation table is capped below the id space, so a free id exists
    fn free_notification(&self) -> MessageNotificationId {
        let mut notification = MessageNotificationId::random();
        while self.notifications.contains_key(&notification) {
            notification = MessageNotificationId::random();
        }
        notification
    }
}

/// Outcome of [`KnowledgeCache::allocate_notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAllocation {
    /// A fresh id now translates to the message.
    Allocated(MessageNotificationId),
    /// The translation table is at its configured bound.
    BacklogFull,
    /// The message is no longer cached.
    Evicted,
}

/// The engine's message cache.
#[derive(Debug)]
pub struct KnowledgeCache {
    state: Mutex<CacheState>,
    max_pending: usize,
}

impl KnowledgeCache {
    /// Create a cache holding up to `capacity` messages and `max_pending`
    /// notification translations.
    pub fn new(capacity: usize, max_pending: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        // 2-byte ids cannot address more rounds than this
        let max_pending = max_pending.min(usize::from(u16::MAX));
        Self {
            state: Mutex::new(CacheState {
                messages: LruCache::new(capacity),
                notifications: HashMap::new(),
            }),
            max_pending,
        }
    }

    /// Atomically fetch the message cached under `id` or insert the one built
    /// by `build`. The flag is `true` when the message was created.
    pub fn get_or_create(
        &self,
        id: GossipMessageId,
        build: impl FnOnce() -> GossipMessage,
    ) -> (Arc<GossipMessage>, bool) {
        let mut state = self.state.lock();
        if let Some(entry) = state.messages.get(&id) {
            return (entry.message.clone(), false);
        }
        let message = Arc::new(build());
        state.insert(id, message.clone());
        (message, true)
    }

    /// Insert a message under a freshly drawn id that is not cached yet.
    pub fn create_unique(&self, build: impl FnOnce(GossipMessageId) -> GossipMessage) -> Arc<GossipMessage> {
        let mut state = self.state.lock();
        let mut id = GossipMessageId::random();
        while state.messages.contains(&id) {
            id = GossipMessageId::random();
        }
        let message = Arc::new(build(id));
        state.insert(id, message.clone());
        message
    }

    /// Open a validation round for a cached message.
    pub fn allocate_notification(&self, id: GossipMessageId) -> NotificationAllocation {
        let mut state = self.state.lock();
        if !state.messages.contains(&id) {
            return NotificationAllocation::Evicted;
        }
        if state.notifications.len() >= self.max_pending {
            return NotificationAllocation::BacklogFull;
        }

        let notification = state.free_notification();
        state.notifications.insert(notification, id);
        if let Some(entry) = state.messages.peek_mut(&id) {
            entry.notification = Some(notification);
        }
        NotificationAllocation::Allocated(notification)
    }

    /// Id for a notification that opens no validation round.
    ///
    /// Never one of the open rounds, so a verdict on it cannot reach an
    /// unrelated message.
    pub fn untracked_notification(&self) -> MessageNotificationId {
        self.state.lock().free_notification()
    }

    /// Message a validation round refers to.
    pub fn resolve(&self, notification: MessageNotificationId) -> Option<Arc<GossipMessage>> {
        let state = self.state.lock();
        let id = state.notifications.get(&notification)?;
        state.messages.peek(id).map(|entry| entry.message.clone())
    }

    /// Close a validation round, keeping the message cached.
    pub fn release_notification(&self, notification: MessageNotificationId) {
        let mut state = self.state.lock();
        if let Some(id) = state.notifications.remove(&notification) {
            if let Some(entry) = state.messages.peek_mut(&id) {
                entry.notification = None;
            }
        }
    }

    /// Drop a message together with its validation round.
    pub fn invalidate(&self, notification: MessageNotificationId) -> Option<Arc<GossipMessage>> {
        let mut state = self.state.lock();
        let id = state.notifications.remove(&notification)?;
        state.messages.pop(&id).map(|entry| entry.message)
    }

    /// Drop a message that never entered a validation round.
    pub fn remove(&self, id: &GossipMessageId) -> Option<Arc<GossipMessage>> {
        let mut state = self.state.lock();
        let entry = state.messages.pop(id)?;
        if let Some(notification) = entry.notification {
            state.notifications.remove(&notification);
        }
        Some(entry.message)
    }

    /// Whether a message is cached (does not touch recency).
    pub fn contains(&self, id: &GossipMessageId) -> bool {
        self.state.lock().messages.contains(id)
    }

    /// Number of cached messages.
    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of open validation rounds.
    pub fn pending_notifications(&self) -> usize {
        self.state.lock().notifications.len()
    }
}
