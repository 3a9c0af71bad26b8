//! # Gossip Service
//!
//! The engine behind both the P2P protocol and the local knowledge API:
//!
//! - `engine` - state and construction
//! - `sessions` - admission and removal of established sessions
//! - `dissemination` - knowledge items from modules and peers
//! - `api` - the [`crate::ports::KnowledgeApi`] implementation
//! - `subscriptions` - data-type subscriptions of local modules
//!
//! ## Lock order
//!
//! client directory, then session registry, then a client context. The
//! subscription table and the knowledge cache are never held while another
//! lock is taken.

mod api;
mod engine;
mod dissemination;
mod sessions;
mod subscriptions;

pub use engine::GossipService;
