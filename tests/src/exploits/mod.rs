//! # Attack Simulations
//!
//! Hostile peers and misbehaving local modules against real nodes.
//!
//! | File | Attacker | Expected defense |
//! |------|----------|------------------|
//! | `handshake.rs` | remote peer | CANCELLED / AUTHENTICATION / TIMEOUT / NOT_ALLOWED farewells |
//! | `api_abuse.rs` | local module | connection closed, node unaffected |

pub mod api_abuse;
pub mod handshake;
