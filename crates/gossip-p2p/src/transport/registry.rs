//! # Protocol Registry
//!
//! Per-role table of the packet ids a channel may receive and send. The
//! table is an explicit value handed to the codec; a frame with an id that
//! is unknown or travels in the wrong direction is a protocol violation.

use std::collections::BTreeSet;

use super::packets::{api_ids, p2p_ids};
use super::TransportError;

/// Packet ids allowed per direction for one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolRegistry {
    name: &'static str,
    inbound: BTreeSet<u16>,
    outbound: BTreeSet<u16>,
}

impl ProtocolRegistry {
    /// Peer-to-peer role; both sides speak the same table.
    pub fn p2p() -> Self {
        let ids = BTreeSet::from([
            p2p_ids::HELLO,
            p2p_ids::HANDSHAKE_COMPLETE,
            p2p_ids::SPREAD_KNOWLEDGE,
            p2p_ids::DISCONNECT,
        ]);
        Self {
            name: "p2p",
            inbound: ids.clone(),
            outbound: ids,
        }
    }

    /// Node side of the local API.
    pub fn api_server() -> Self {
        Self {
            name: "api",
            inbound: BTreeSet::from([api_ids::ANNOUNCE, api_ids::NOTIFY, api_ids::VALIDATION]),
            outbound: BTreeSet::from([api_ids::NOTIFICATION]),
        }
    }

    /// Module side of the local API.
    pub fn api_client() -> Self {
        let server = Self::api_server();
        Self {
            name: "api-client",
            inbound: server.outbound,
            outbound: server.inbound,
        }
    }

    /// Role name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check a received packet id.
    pub fn check_inbound(&self, id: u16) -> Result<(), TransportError> {
        if self.inbound.contains(&id) {
            Ok(())
        } else {
            Err(TransportError::violation(format!(
                "packet id {id} not accepted by {} role",
                self.name
            )))
        }
    }

    /// Check a packet id about to be sent.
    pub fn check_outbound(&self, id: u16) -> Result<(), TransportError> {
        if self.outbound.contains(&id) {
            Ok(())
        } else {
            Err(TransportError::violation(format!(
                "packet id {id} may not be sent by {} role",
                self.name
            )))
        }
    }
}
