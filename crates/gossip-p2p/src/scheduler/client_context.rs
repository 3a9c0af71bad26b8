//! Per-peer outbound connection state.

use parking_lot::Mutex;
use shared_crypto::PeerIdentity;
use tracing::{debug, info};

use crate::domain::{CloseReason, GossipPeerInfo, RetryState};

/// Connection status of a client context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// No attempt running, no session.
    Free,
    /// Dial or handshake in progress.
    Connecting,
    /// Our session to the peer is up.
    Connected,
}

#[derive(Debug)]
struct ClientState {
    status: ClientStatus,
    retry: RetryState,
}

/// Outbound state of one known peer.
#[derive(Debug)]
pub struct GossipClientContext {
    peer: GossipPeerInfo,
    host: String,
    port: u16,
    state: Mutex<ClientState>,
}

impl GossipClientContext {
    /// Fresh context, eligible immediately.
    pub fn new(peer: GossipPeerInfo, host: impl Into<String>, port: u16) -> Self {
        Self {
            peer,
            host: host.into(),
            port,
            state: Mutex::new(ClientState {
                status: ClientStatus::Free,
                retry: RetryState::new(),
            }),
        }
    }

    /// Peer identity.
    pub fn identity(&self) -> PeerIdentity {
        self.peer.identity()
    }

    /// Peer info.
    pub fn peer(&self) -> &GossipPeerInfo {
        &self.peer
    }

    /// Hostname to dial.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port to dial.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Current status.
    pub fn status(&self) -> ClientStatus {
        self.state.lock().status
    }

    /// Snapshot of the backoff state.
    pub fn retry_state(&self) -> RetryState {
        self.state.lock().retry.clone()
    }

    /// Whether the scheduler may dial at `now`.
    pub fn is_eligible(&self, now: u64) -> bool {
        let state = self.state.lock();
        state.status == ClientStatus::Free && state.retry.is_due(now)
    }

    /// Claim the context for a dial. Fails if an attempt or session is active.
    pub fn try_begin_connect(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != ClientStatus::Free {
            return false;
        }
        state.status = ClientStatus::Connecting;
        true
    }

    /// TCP or TLS could not be established.
    pub fn on_connect_failed(&self, now: u64) {
        let mut state = self.state.lock();
        state.status = ClientStatus::Free;
        state.retry.on_connect_failed(now);
        debug!(
            peer = %self.peer.identity(),
            failures = state.retry.consecutive_failures(),
            "Failed to connect to remote peer"
        );
    }

    /// The application handshake ended without a session.
    pub fn on_handshake_failed(&self, reason: &CloseReason, now: u64) {
        let mut state = self.state.lock();
        state.status = ClientStatus::Free;
        state.retry.on_handshake_failed(reason, now);
        match state.retry.next_retry() {
            Some(at) => info!(
                peer = %self.peer.identity(),
                %reason,
                retry_in_ms = at.saturating_sub(now),
                "Handshake with remote peer failed"
            ),
            None => info!(
                peer = %self.peer.identity(),
                %reason,
                "Handshake with remote peer failed, retries disabled"
            ),
        }
    }

    /// Our session to the peer was admitted.
    pub fn on_connected(&self) {
        let mut state = self.state.lock();
        state.status = ClientStatus::Connected;
        state.retry.on_handshake_succeeded();
    }

    /// Our session to the peer ended.
    pub fn on_session_ended(&self, now: u64) {
        let mut state = self.state.lock();
        state.status = ClientStatus::Free;
        state.retry.on_session_ended(now);
    }

    /// A session the peer opened to us ended; dialing may be due again.
    pub fn signal_server_bound_disconnect(&self, now: u64) {
        self.state.lock().retry.on_session_ended(now);
    }
}
