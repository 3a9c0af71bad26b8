//! Data-type subscriptions of local modules.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::{DataType, SubscriberId};
use crate::ports::ApiSubscriber;

/// Who listens to which data type.
#[derive(Default)]
pub(crate) struct Subscriptions {
    by_type: HashMap<DataType, HashMap<SubscriberId, Arc<dyn ApiSubscriber>>>,
    by_subscriber: HashMap<SubscriberId, HashSet<DataType>>,
}

impl Subscriptions {
    /// Subscribe; registering twice is a no-op.
    pub(crate) fn register(&mut self, subscriber: Arc<dyn ApiSubscriber>, data_type: DataType) {
        let id = subscriber.subscriber_id();
        self.by_subscriber.entry(id).or_default().insert(data_type);
        self.by_type
            .entry(data_type)
            .or_default()
            .entry(id)
            .or_insert(subscriber);
    }

    /// Drop every subscription of `id`. Returns how many were removed.
    pub(crate) fn remove_subscriber(&mut self, id: SubscriberId) -> usize {
        let Some(types) = self.by_subscriber.remove(&id) else {
            return 0;
        };
        for data_type in &types {
            if let Some(subscribers) = self.by_type.get_mut(data_type) {
                subscribers.remove(&id);
                if subscribers.is_empty() {
                    self.by_type.remove(data_type);
                }
            }
        }
        types.len()
    }

    pub(crate) fn is_subscribed(&self, id: SubscriberId, data_type: DataType) -> bool {
        self.by_subscriber
            .get(&id)
            .is_some_and(|types| types.contains(&data_type))
    }

    /// Subscribers of `data_type`, optionally without one of them.
    pub(crate) fn subscribers(
        &self,
        data_type: DataType,
        except: Option<SubscriberId>,
    ) -> Vec<Arc<dyn ApiSubscriber>> {
        self.by_type
            .get(&data_type)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter(|(id, _)| Some(**id) != except)
                    .map(|(_, subscriber)| subscriber.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.by_subscriber.len()
    }
}
