//! # Retry Backoff
//!
//! Per-peer outbound retry state. `next_retry` is either disabled or an
//! absolute epoch-millisecond deadline:
//!
//! ```text
//! next = now + 2^max(0, failures - 1) * factor + 10s
//! ```
//!
//! The factor depends on how the last attempt failed.

use super::close_reason::{CloseReason, DisconnectReason};

const SECOND_MILLIS: u64 = 1_000;
const MINUTE_MILLIS: u64 = 60 * SECOND_MILLIS;
const HOUR_MILLIS: u64 = 60 * MINUTE_MILLIS;
const DAY_MILLIS: u64 = 24 * HOUR_MILLIS;

/// Constant delay added to every computed deadline.
pub const GRACE_DELAY_MILLIS: u64 = 10 * SECOND_MILLIS;

/// Factor used to re-arm a disabled context after its session ended.
pub const SERVER_BOUND_REARM_MILLIS: u64 = 10 * MINUTE_MILLIS;

/// Backoff state of one outbound peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    consecutive_failures: u32,
    next_retry: Option<u64>,
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryState {
    /// Fresh state, eligible immediately.
    pub fn new() -> Self {
        Self {
            consecutive_failures: 0,
            next_retry: Some(0),
        }
    }

    /// Failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Deadline in epoch millis, `None` when retries are disabled.
    pub fn next_retry(&self) -> Option<u64> {
        self.next_retry
    }

    /// Whether an attempt may start at `now`.
    pub fn is_due(&self, now: u64) -> bool {
        self.next_retry.is_some_and(|at| at <= now)
    }

    /// TCP connect (or TLS) failed before any protocol exchange.
    pub fn on_connect_failed(&mut self, now: u64) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.schedule(MINUTE_MILLIS, now);
    }

    /// The handshake ended without a session.
    pub fn on_handshake_failed(&mut self, reason: &CloseReason, now: u64) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let factor = match reason.disconnect_reason() {
            Some(DisconnectReason::Duplicate) => {
                self.consecutive_failures = 0;
                self.next_retry = None;
                return;
            }
            Some(
                DisconnectReason::Normal
                | DisconnectReason::Unsupported
                | DisconnectReason::Cancelled,
            ) => DAY_MILLIS,
            Some(
                DisconnectReason::Busy
                | DisconnectReason::Authentication
                | DisconnectReason::UnexpectedFailure,
            ) => HOUR_MILLIS,
            Some(DisconnectReason::NotAllowed) => MINUTE_MILLIS,
            Some(DisconnectReason::Timeout) => SECOND_MILLIS,
            None => MINUTE_MILLIS,
        };
        self.schedule(factor, now);
    }

    /// A session with this peer was established.
    pub fn on_handshake_succeeded(&mut self) {
        self.consecutive_failures = 0;
        self.next_retry = None;
    }

    /// A session with this peer ended; re-arm a disabled context.
    pub fn on_session_ended(&mut self, now: u64) {
        if self.next_retry.is_none() {
            self.schedule(SERVER_BOUND_REARM_MILLIS, now);
        }
    }

    fn schedule(&mut self, factor: u64, now: u64) {
        let exponent = self.consecutive_failures.saturating_sub(1).min(63);
        let delay = (1u64 << exponent)
            .saturating_mul(factor)
            .saturating_add(GRACE_DELAY_MILLIS);
        self.next_retry = Some(now.saturating_add(delay));
    }
}
