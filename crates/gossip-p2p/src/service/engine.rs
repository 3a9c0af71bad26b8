//! Engine state and construction.

use parking_lot::RwLock;
use shared_crypto::{HostKey, PeerIdentity};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

use super::subscriptions::Subscriptions;
use crate::domain::{
    GossipConfig, KnowledgeCache, RateLimitPolicy, RateLimiterCache, SessionRegistry,
    StorageError, StoredIdentity,
};
use crate::ports::{PeerIdentityStorage, TimeSource};
use crate::protocol::EstablishedSession;
use crate::scheduler::{ClientDirectory, DispatcherControl, GossipClientContext};

/// The gossip engine.
///
/// Shared as `Arc<GossipService>` by every connection handler, the API
/// server and the scheduler.
pub struct GossipService {
    pub(super) config: GossipConfig,
    pub(super) host_key: Arc<HostKey>,
    pub(super) storage: Arc<dyn PeerIdentityStorage>,
    pub(super) time: Arc<dyn TimeSource>,
    pub(super) sessions: RwLock<SessionRegistry<EstablishedSession>>,
    pub(super) clients: Arc<ClientDirectory>,
    pub(super) dispatcher: Arc<DispatcherControl>,
    pub(super) knowledge: KnowledgeCache,
    pub(super) subscriptions: RwLock<Subscriptions>,
    pub(super) connect_limiter: RateLimiterCache<IpAddr>,
    pub(super) spread_limiter: RateLimiterCache<PeerIdentity>,
}

impl GossipService {
    /// Create the engine. No client contexts are known until
    /// [`Self::populate_clients`] runs.
    pub fn new(
        config: GossipConfig,
        host_key: Arc<HostKey>,
        storage: Arc<dyn PeerIdentityStorage>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let local = host_key.identity();
        Self {
            sessions: RwLock::new(SessionRegistry::new(local, config.degree)),
            knowledge: KnowledgeCache::new(config.cache_size, config.max_pending_validations),
            subscriptions: RwLock::new(Subscriptions::default()),
            clients: Arc::new(ClientDirectory::new()),
            dispatcher: Arc::new(DispatcherControl::new()),
            connect_limiter: RateLimiterCache::new(RateLimitPolicy::connect()),
            spread_limiter: RateLimiterCache::new(RateLimitPolicy::knowledge_spread()),
            config,
            host_key,
            storage,
            time,
        }
    }

    /// Build one client context per stored identity that has an address.
    /// Peers that already have a context keep it, so running this again
    /// never resets a live dial or session.
    ///
    /// Returns the number of known outbound peers.
    pub fn populate_clients(&self) -> Result<usize, StorageError> {
        let local = self.local_identity();
        for stored in self.storage.load_all()? {
            let identity = stored.identity();
            if identity == local {
                continue;
            }
            let Some((host, port)) = stored.address() else {
                debug!(peer = %identity, "Stored identity has no address, not dialing it");
                continue;
            };
            self.clients
                .insert(GossipClientContext::new(stored.peer_info(), host, port));
        }

        let known = self.clients.len();
        info!(peers = known, "Loaded outbound peers from identity storage");
        Ok(known)
    }

    /// Look up a peer in the identity storage.
    pub fn retrieve_identity(
        &self,
        identity: &PeerIdentity,
    ) -> Result<Option<StoredIdentity>, StorageError> {
        self.storage.retrieve(identity)
    }

    /// Identity of this node.
    pub fn local_identity(&self) -> PeerIdentity {
        self.host_key.identity()
    }

    /// The node's host key.
    pub fn host_key(&self) -> &Arc<HostKey> {
        &self.host_key
    }

    /// Engine configuration.
    pub fn config(&self) -> &GossipConfig {
        &self.config
    }

    /// Clock used for backoff and rate limits.
    pub fn time(&self) -> &Arc<dyn TimeSource> {
        &self.time
    }

    /// Known outbound peers.
    pub fn clients(&self) -> &Arc<ClientDirectory> {
        &self.clients
    }

    /// Switch of the outbound connection scheduler.
    pub fn dispatcher_control(&self) -> &Arc<DispatcherControl> {
        &self.dispatcher
    }

    /// Number of cached knowledge items.
    pub fn cached_items(&self) -> usize {
        self.knowledge.len()
    }

    /// Number of items awaiting local validation.
    pub fn pending_validations(&self) -> usize {
        self.knowledge.pending_notifications()
    }

    /// Number of attached modules with at least one subscription.
    pub fn subscribed_modules(&self) -> usize {
        self.subscriptions.read().subscriber_count()
    }
}

impl fmt::Debug for GossipService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GossipService")
            .field("identity", &self.local_identity())
            .field("sessions", &self.sessions.read().len())
            .field("degree", &self.config.degree)
            .finish_non_exhaustive()
    }
}
