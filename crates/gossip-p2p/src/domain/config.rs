//! Engine and scheduler configuration.

use shared_crypto::CertificateKind;
use std::time::Duration;

/// Gossip node configuration
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Maximum number of established sessions
    pub degree: usize,
    /// Knowledge cache capacity (messages)
    pub cache_size: usize,
    /// Maximum messages awaiting local validation at once
    pub max_pending_validations: usize,
    /// Certificate layout presented and expected during TLS
    pub certificate_kind: CertificateKind,
    /// Start the outbound connection scheduler on node start
    pub auto_connect: bool,
    /// Bound on TLS plus application handshake
    pub handshake_timeout: Duration,
    /// Bound on TCP connect
    pub connect_timeout: Duration,
    /// Scheduler start delay is drawn uniformly from this range
    pub dispatcher_start_delay: (Duration, Duration),
    /// Scheduler tick while the initial burst lasts
    pub dispatcher_burst_tick: Duration,
    /// Scheduler tick afterwards
    pub dispatcher_idle_tick: Duration,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            degree: 30,
            cache_size: 50,
            max_pending_validations: 4096,
            certificate_kind: CertificateKind::Chained,
            auto_connect: true,
            handshake_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            dispatcher_start_delay: (Duration::from_millis(2000), Duration::from_millis(4000)),
            dispatcher_burst_tick: Duration::from_millis(20),
            dispatcher_idle_tick: Duration::from_millis(1000),
        }
    }
}

impl GossipConfig {
    /// Testing config: small degree, manual connects, fast scheduler
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            degree: 4,
            cache_size: 16,
            max_pending_validations: 64,
            auto_connect: false,
            handshake_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            dispatcher_start_delay: (Duration::from_millis(10), Duration::from_millis(20)),
            dispatcher_burst_tick: Duration::from_millis(5),
            dispatcher_idle_tick: Duration::from_millis(50),
            ..Self::default()
        }
    }
}
