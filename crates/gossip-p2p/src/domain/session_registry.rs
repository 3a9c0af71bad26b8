//! # Session Registry
//!
//! Bounded set of established sessions keyed by remote identity.
//!
//! - never more than `degree` sessions
//! - never two sessions for the same identity
//! - never a session with ourselves

use shared_crypto::PeerIdentity;
use std::collections::HashMap;

use super::close_reason::DisconnectReason;

/// Result of a successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmitOutcome {
    /// The admission used the last free slot.
    pub reached_capacity: bool,
}

/// Established sessions by remote identity.
#[derive(Debug)]
pub struct SessionRegistry<S> {
    local: PeerIdentity,
    sessions: HashMap<PeerIdentity, S>,
    degree: usize,
}

impl<S> SessionRegistry<S> {
    /// Empty registry for the node `local` with room for `degree` sessions.
    pub fn new(local: PeerIdentity, degree: usize) -> Self {
        Self {
            local,
            sessions: HashMap::new(),
            degree,
        }
    }

    /// Admit `session` for `peer`, or name the reason it is refused.
    pub fn try_admit(&mut self, peer: PeerIdentity, session: S) -> Result<AdmitOutcome, DisconnectReason> {
        if self.is_full() {
            return Err(DisconnectReason::Busy);
        }
        if peer == self.local || self.sessions.contains_key(&peer) {
            return Err(DisconnectReason::Duplicate);
        }

        self.sessions.insert(peer, session);
        Ok(AdmitOutcome {
            reached_capacity: self.is_full(),
        })
    }

    /// Remove the session of `peer` if `matches` accepts it.
    ///
    /// Guards against a late disconnect of a stale channel removing the
    /// current session of the same peer.
    pub fn remove_if(&mut self, peer: &PeerIdentity, matches: impl FnOnce(&S) -> bool) -> Option<S> {
        if self.sessions.get(peer).is_some_and(matches) {
            self.sessions.remove(peer)
        } else {
            None
        }
    }

    /// Session of `peer`.
    pub fn get(&self, peer: &PeerIdentity) -> Option<&S> {
        self.sessions.get(peer)
    }

    /// Whether `peer` has a session.
    pub fn contains(&self, peer: &PeerIdentity) -> bool {
        self.sessions.contains_key(peer)
    }

    /// All sessions.
    pub fn sessions(&self) -> impl Iterator<Item = &S> {
        self.sessions.values()
    }

    /// Remove and return all sessions.
    pub fn drain(&mut self) -> Vec<S> {
        self.sessions.drain().map(|(_, session)| session).collect()
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Maximum number of sessions.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Whether every slot is taken.
    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.degree
    }
}
