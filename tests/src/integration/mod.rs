//! # Integration Flows
//!
//! Real nodes on loopback: TLS handshakes, session bookkeeping and
//! validate-before-forward dissemination between local modules.

pub mod dissemination;
pub mod sessions;
