//! # Gossip Node Test Suite
//!
//! Unified test crate running real nodes over loopback TLS.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Node clusters and API module clients
//! ├── exploits/         # Attack simulations
//! │   ├── handshake.rs  # Impersonation, unknown peers, full nodes
//! │   └── api_abuse.rs  # Misbehaving local modules
//! │
//! └── integration/      # End-to-end dissemination flows
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p gossip-tests
//!
//! # By category
//! cargo test -p gossip-tests integration::
//! cargo test -p gossip-tests exploits::
//! ```

#![allow(dead_code)]

pub mod exploits;
pub mod harness;
pub mod integration;
