//! # Outbound Connection Scheduler
//!
//! One background task keeps dialing known peers:
//!
//! - after a random start delay, it ticks quickly for an initial burst and
//!   then once per second;
//! - each tick picks one random peer that is idle and due under its
//!   [`crate::domain::RetryState`], and hands it to the [`crate::ports::Connector`];
//! - it is paused while the session registry is full.

pub mod client_context;
pub mod directory;
pub mod dispatcher;

pub use client_context::{ClientStatus, GossipClientContext};
pub use directory::ClientDirectory;
pub use dispatcher::{ConnectionDispatcher, DispatcherControl};
