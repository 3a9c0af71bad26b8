//! Admission and removal of established sessions.

use shared_crypto::PeerIdentity;
use tracing::{debug, info};

use super::GossipService;
use crate::domain::DisconnectReason;
use crate::protocol::EstablishedSession;
use crate::transport::P2pPacket;

impl GossipService {
    /// Admit a session whose handshake succeeded.
    ///
    /// Server-bound sessions are subject to the per-IP connect limit, and
    /// get their `HandshakeComplete` queued before the registry lock is
    /// released so no spread can overtake it. Reaching the degree pauses the
    /// outbound scheduler.
    pub fn adopt_session(&self, session: &EstablishedSession) -> Result<(), DisconnectReason> {
        if session.is_server_bound()
            && !self
                .connect_limiter
                .try_acquire(&session.remote_ip(), self.time.now_millis())
        {
            debug!(remote = %session.remote_ip(), "Connect rate limit exceeded");
            return Err(DisconnectReason::NotAllowed);
        }

        let mut registry = self.sessions.write();
        let outcome = registry
            .try_admit(session.identity(), session.clone())
            .inspect_err(|reason| {
                debug!(
                    peer = %session.identity(),
                    direction = %session.direction(),
                    %reason,
                    "Session rejected by registry"
                );
            })?;

        if session.is_server_bound() {
            session.send(P2pPacket::HandshakeComplete);
        }
        if outcome.reached_capacity {
            info!(degree = registry.degree(), "Degree reached, pausing outbound dialing");
            self.dispatcher.pause();
        }
        Ok(())
    }

    /// Remove a session whose connection closed.
    ///
    /// Only the exact connection is removed; a newer session with the same
    /// peer stays.
    pub fn handle_session_disconnect(&self, session: &EstablishedSession) {
        let (removed, below_degree) = {
            let mut registry = self.sessions.write();
            let removed = registry
                .remove_if(&session.identity(), |current| current.same_connection(session))
                .is_some();
            (removed, !registry.is_full())
        };
        if !removed {
            return;
        }

        info!(
            peer = %session.identity(),
            direction = %session.direction(),
            "Session closed"
        );

        if session.is_server_bound() {
            if let Some(context) = self.clients.get(&session.identity()) {
                context.signal_server_bound_disconnect(self.time.now_millis());
            }
        }
        if below_degree && !self.dispatcher.is_stopped() {
            self.dispatcher.resume();
        }
    }

    /// Disconnect every session with NORMAL and stop dialing.
    pub fn shutdown_sessions(&self) {
        let mut clients = self.clients.lock();
        let mut registry = self.sessions.write();

        self.dispatcher.stop();
        let sessions = registry.drain();
        info!(sessions = sessions.len(), "Closing all sessions");
        for session in sessions {
            session.disconnect(DisconnectReason::Normal);
        }
        clients.clear();
    }

    /// Number of established sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether a session with `peer` is established.
    pub fn is_connected(&self, peer: &PeerIdentity) -> bool {
        self.sessions.read().contains(peer)
    }

    /// Identities of all established sessions.
    pub fn connected_peers(&self) -> Vec<PeerIdentity> {
        self.sessions
            .read()
            .sessions()
            .map(EstablishedSession::identity)
            .collect()
    }
}
