//! Known outbound peers, shared by the engine and the scheduler.

use parking_lot::{Mutex, MutexGuard};
use rand::seq::SliceRandom;
use shared_crypto::PeerIdentity;
use std::collections::HashMap;
use std::sync::Arc;

use super::client_context::GossipClientContext;

type ContextMap = HashMap<PeerIdentity, Arc<GossipClientContext>>;

/// Client contexts by peer identity.
#[derive(Debug, Default)]
pub struct ClientDirectory {
    contexts: Mutex<ContextMap>,
}

impl ClientDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the context of a peer. A peer that is already known keeps its
    /// live context, which is returned instead.
    pub fn insert(&self, context: GossipClientContext) -> Arc<GossipClientContext> {
        self.contexts
            .lock()
            .entry(context.identity())
            .or_insert_with(|| Arc::new(context))
            .clone()
    }

    /// Context of `peer`.
    pub fn get(&self, peer: &PeerIdentity) -> Option<Arc<GossipClientContext>> {
        self.contexts.lock().get(peer).cloned()
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Whether no peers are known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pick one eligible context uniformly at random and claim it.
    pub fn claim_random_eligible(&self, now: u64) -> Option<Arc<GossipClientContext>> {
        let candidates: Vec<_> = self
            .contexts
            .lock()
            .values()
            .filter(|context| context.is_eligible(now))
            .cloned()
            .collect();

        let chosen = candidates.choose(&mut rand::thread_rng())?.clone();
        chosen.try_begin_connect().then_some(chosen)
    }

    /// Hold the directory lock (shutdown ordering).
    pub(crate) fn lock(&self) -> MutexGuard<'_, ContextMap> {
        self.contexts.lock()
    }
}
