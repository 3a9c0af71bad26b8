//! # Gossip Node
//!
//! Wires the engine to its listeners and the outbound scheduler.
//!
//! ## Lifecycle
//!
//! 1. bind the P2P and API sockets
//! 2. build one client context per dialable stored identity
//! 3. start the scheduler unless `auto_connect` is off
//! 4. on shutdown: stop dialing, disconnect every session with NORMAL,
//!    stop the listeners

use shared_crypto::{CryptoError, HostKey, PeerIdentity};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapters::{ApiListener, FilePeerIdentityStorage, NodeConfig};
use crate::domain::{CloseReason, GossipConfig, StorageError};
use crate::ports::{PeerIdentityStorage, SystemTimeSource, TimeSource};
use crate::protocol::HandshakeResult;
use crate::scheduler::ConnectionDispatcher;
use crate::service::GossipService;
use crate::transport::{dial, P2pListener, TlsClientConnector, TlsContext, TransportError};

/// Startup failures.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Host key could not be loaded
    #[error("Host key: {0}")]
    HostKey(#[from] CryptoError),

    /// Identity storage could not be opened or read
    #[error("Identity storage: {0}")]
    Storage(#[from] StorageError),

    /// A listener could not be bound
    #[error("Transport: {0}")]
    Transport(#[from] TransportError),
}

/// A running gossip node.
pub struct GossipNode {
    service: Arc<GossipService>,
    tls: TlsContext,
    p2p_addr: SocketAddr,
    api_addr: SocketAddr,
    listeners: Vec<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl GossipNode {
    /// Start from a configuration file's settings.
    pub async fn start(config: NodeConfig) -> Result<Self, NodeError> {
        let host_key = Arc::new(HostKey::read_pem_file(&config.hostkey)?);
        let storage = Arc::new(FilePeerIdentityStorage::open(&config.identities)?);
        Self::start_with(
            config.gossip,
            host_key,
            storage,
            Arc::new(SystemTimeSource),
            config.p2p_address,
            config.api_address,
        )
        .await
    }

    /// Start with explicit parts.
    pub async fn start_with(
        config: GossipConfig,
        host_key: Arc<HostKey>,
        storage: Arc<dyn PeerIdentityStorage>,
        time: Arc<dyn TimeSource>,
        p2p_address: SocketAddr,
        api_address: SocketAddr,
    ) -> Result<Self, NodeError> {
        let tls = TlsContext::new(host_key.clone(), config.certificate_kind);
        let auto_connect = config.auto_connect;
        let service = Arc::new(GossipService::new(config, host_key, storage, time));

        let p2p = P2pListener::bind(p2p_address).await?;
        let api = ApiListener::bind(api_address).await?;
        let p2p_addr = p2p.local_addr();
        let api_addr = api.local_addr();

        service.populate_clients()?;

        let listeners = vec![
            p2p.spawn(service.clone(), tls.clone()),
            api.spawn(service.clone()),
        ];

        let mut node = Self {
            service,
            tls,
            p2p_addr,
            api_addr,
            listeners,
            dispatcher: None,
        };
        if auto_connect {
            node.start_dispatcher();
        }

        info!(
            identity = %node.identity(),
            p2p = %p2p_addr,
            api = %api_addr,
            "Gossip node started"
        );
        Ok(node)
    }

    /// Start the outbound scheduler if it is not running yet.
    pub fn start_dispatcher(&mut self) {
        if self.dispatcher.is_some() {
            return;
        }
        let connector = Arc::new(TlsClientConnector::new(&self.service, self.tls.clone()));
        let dispatcher = ConnectionDispatcher::new(
            self.service.config(),
            self.service.clients().clone(),
            connector,
            self.service.dispatcher_control().clone(),
            self.service.time().clone(),
        );
        self.dispatcher = Some(dispatcher.spawn());
    }

    /// Dial a known peer now, bypassing the scheduler.
    pub async fn connect(&self, peer: &PeerIdentity) -> HandshakeResult {
        let context = self
            .service
            .clients()
            .get(peer)
            .ok_or_else(|| CloseReason::Failure(format!("unknown peer {peer}")))?;
        if !context.try_begin_connect() {
            return Err(CloseReason::Failure(
                "connection attempt or session already active".into(),
            ));
        }
        dial(self.service.clone(), self.tls.clone(), context).await
    }

    /// The engine.
    pub fn service(&self) -> &Arc<GossipService> {
        &self.service
    }

    /// Identity of this node.
    pub fn identity(&self) -> PeerIdentity {
        self.service.local_identity()
    }

    /// Bound P2P address.
    pub fn p2p_addr(&self) -> SocketAddr {
        self.p2p_addr
    }

    /// Bound API address.
    pub fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    /// Disconnect everyone and stop all tasks.
    pub async fn shutdown(mut self) {
        self.service.shutdown_sessions();
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.await;
        }
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
        info!(identity = %self.identity(), "Gossip node stopped");
    }
}

impl std::fmt::Debug for GossipNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipNode")
            .field("identity", &self.identity())
            .field("p2p_addr", &self.p2p_addr)
            .field("api_addr", &self.api_addr)
            .finish_non_exhaustive()
    }
}
