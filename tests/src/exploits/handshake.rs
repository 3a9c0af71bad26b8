//! # Handshake Attacks
//!
//! Peers that are not in the identity storage, peers connecting from an
//! address other than the recorded one, protocol confusion during the
//! handshake, and spread floods after it.
//!
//! The raw attacker speaks TLS with a fixture key and hand-written frames.

use std::time::Duration;

use gossip_p2p::domain::DisconnectReason;
use gossip_p2p::transport::{read_packet, write_packet, TlsContext};
use gossip_p2p::{P2pPacket, ProtocolRegistry};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::harness::{TestNode, SETTLE};

/// TLS session towards `target`, presenting `attacker`'s key.
pub async fn raw_session(
    attacker: &TestNode,
    target: &TestNode,
) -> impl AsyncRead + AsyncWrite + Unpin {
    let tcp = TcpStream::connect(target.node.p2p_addr())
        .await
        .expect("tcp connect");
    let connector = attacker
        .tls()
        .connector(target.identity())
        .expect("tls connector");
    let server_name = TlsContext::server_name().expect("server name");
    connector
        .connect(server_name, tcp)
        .await
        .expect("tls handshake")
}

/// Read until the node says goodbye; `None` if it hangs up silently.
pub async fn farewell<S: AsyncRead + Unpin>(stream: &mut S) -> Option<DisconnectReason> {
    let registry = ProtocolRegistry::p2p();
    loop {
        match timeout(SETTLE, read_packet::<P2pPacket, _>(stream, &registry)).await {
            Ok(Ok(Some(P2pPacket::Disconnect { reason }))) => return Some(reason),
            Ok(Ok(Some(_))) => continue,
            Ok(Ok(None)) | Ok(Err(_)) | Err(_) => return None,
        }
    }
}

/// Send one frame over a raw session.
pub async fn send<S: AsyncWrite + Unpin>(stream: &mut S, packet: P2pPacket) {
    write_packet(stream, &ProtocolRegistry::p2p(), &packet)
        .await
        .expect("p2p write");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::link;
    use gossip_p2p::domain::{DataType, GossipMessageId};
    use gossip_p2p::transport::PROTOCOL_VERSION;
    use gossip_p2p::{CloseReason, GossipConfig, StoredIdentity};

    // =============================================================================
    // TEST GROUP 1: Identity storage is the allow-list
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unknown_identity_is_cancelled() {
        let stranger = TestNode::start(1, GossipConfig::for_testing()).await;
        let target = TestNode::start(2, GossipConfig::for_testing()).await;
        stranger.trust(&target);

        assert_eq!(
            stranger.connect(&target).await,
            Err(CloseReason::Remote(DisconnectReason::Cancelled))
        );
        assert_eq!(target.sessions(), 0);
        assert_eq!(stranger.sessions(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_connection_from_unrecorded_address_fails_authentication() {
        let attacker = TestNode::start(1, GossipConfig::for_testing()).await;
        let target = TestNode::start(2, GossipConfig::for_testing()).await;
        attacker.trust(&target);
        target.trust_record(StoredIdentity::with_address(
            attacker.host_key.public_key().clone(),
            "10.66.0.1",
            6001,
        ));

        assert_eq!(
            attacker.connect(&target).await,
            Err(CloseReason::Remote(DisconnectReason::Authentication))
        );
        assert_eq!(target.sessions(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_hostname_record_is_not_resolved() {
        let attacker = TestNode::start(1, GossipConfig::for_testing()).await;
        let target = TestNode::start(2, GossipConfig::for_testing()).await;
        attacker.trust(&target);
        target.trust_record(StoredIdentity::with_address(
            attacker.host_key.public_key().clone(),
            "localhost",
            attacker.node.p2p_addr().port(),
        ));

        assert_eq!(
            attacker.connect(&target).await,
            Err(CloseReason::Remote(DisconnectReason::Authentication))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_server_must_present_expected_identity() {
        let dialer = TestNode::start(1, GossipConfig::for_testing()).await;
        let impostor = TestNode::start(2, GossipConfig::for_testing()).await;
        let expected = TestNode::start(3, GossipConfig::for_testing()).await;
        impostor.trust(&dialer);
        // dialer believes `expected` listens on the impostor's port
        dialer.trust_record(StoredIdentity::with_address(
            expected.host_key.public_key().clone(),
            "127.0.0.1",
            impostor.node.p2p_addr().port(),
        ));

        assert!(matches!(
            dialer.connect(&expected).await,
            Err(CloseReason::Transport(_))
        ));
        assert_eq!(impostor.sessions(), 0);
        assert_eq!(dialer.sessions(), 0);
    }

    // =============================================================================
    // TEST GROUP 2: Protocol confusion during the handshake
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spread_before_hello_is_cancelled() {
        let attacker = TestNode::start(1, GossipConfig::for_testing()).await;
        let target = TestNode::start(2, GossipConfig::for_testing()).await;
        target.trust(&attacker);

        let mut stream = raw_session(&attacker, &target).await;
        send(
            &mut stream,
            P2pPacket::SpreadKnowledge {
                id: GossipMessageId::random(),
                ttl: 0,
                data_type: DataType(1),
                data: b"early".to_vec(),
            },
        )
        .await;

        assert_eq!(farewell(&mut stream).await, Some(DisconnectReason::Cancelled));
        assert_eq!(target.sessions(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unsupported_version_is_refused() {
        let attacker = TestNode::start(1, GossipConfig::for_testing()).await;
        let target = TestNode::start(2, GossipConfig::for_testing()).await;
        target.trust(&attacker);

        let mut stream = raw_session(&attacker, &target).await;
        send(
            &mut stream,
            P2pPacket::Hello {
                version: PROTOCOL_VERSION.wrapping_add(1),
            },
        )
        .await;

        assert_eq!(
            farewell(&mut stream).await,
            Some(DisconnectReason::Unsupported)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_silent_client_times_out() {
        let config = GossipConfig {
            handshake_timeout: Duration::from_secs(1),
            ..GossipConfig::for_testing()
        };
        let attacker = TestNode::start(1, GossipConfig::for_testing()).await;
        let target = TestNode::start(2, config).await;
        target.trust(&attacker);

        let mut stream = raw_session(&attacker, &target).await;

        assert_eq!(farewell(&mut stream).await, Some(DisconnectReason::Timeout));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_hello_after_handshake_is_cancelled() {
        let attacker = TestNode::start(1, GossipConfig::for_testing()).await;
        let target = TestNode::start(2, GossipConfig::for_testing()).await;
        target.trust(&attacker);

        let mut stream = raw_session(&attacker, &target).await;
        send(
            &mut stream,
            P2pPacket::Hello {
                version: PROTOCOL_VERSION,
            },
        )
        .await;
        let registry = ProtocolRegistry::p2p();
        let reply = read_packet::<P2pPacket, _>(&mut stream, &registry)
            .await
            .unwrap();
        assert_eq!(reply, Some(P2pPacket::HandshakeComplete));

        send(
            &mut stream,
            P2pPacket::Hello {
                version: PROTOCOL_VERSION,
            },
        )
        .await;

        assert_eq!(farewell(&mut stream).await, Some(DisconnectReason::Cancelled));
        crate::harness::eventually("session dropped", || target.sessions() == 0).await;
    }

    // =============================================================================
    // TEST GROUP 3: Floods from an admitted peer
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spread_flood_is_cut_off() {
        let attacker = TestNode::start(1, GossipConfig::for_testing()).await;
        let target = TestNode::start(2, GossipConfig::for_testing()).await;
        target.trust(&attacker);

        let mut stream = raw_session(&attacker, &target).await;
        send(
            &mut stream,
            P2pPacket::Hello {
                version: PROTOCOL_VERSION,
            },
        )
        .await;

        // one past the per-second allowance
        for n in 0..101u32 {
            send(
                &mut stream,
                P2pPacket::SpreadKnowledge {
                    id: GossipMessageId::random(),
                    ttl: 0,
                    data_type: DataType(1),
                    data: n.to_be_bytes().to_vec(),
                },
            )
            .await;
        }

        assert_eq!(farewell(&mut stream).await, Some(DisconnectReason::NotAllowed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_honest_peer_unaffected_by_rejected_stranger() {
        let honest = TestNode::start(1, GossipConfig::for_testing()).await;
        let target = TestNode::start(2, GossipConfig::for_testing()).await;
        let stranger = TestNode::start(3, GossipConfig::for_testing()).await;
        honest.trust(&target);
        target.trust(&honest);
        stranger.trust(&target);

        link(&honest, &target).await;
        assert!(stranger.connect(&target).await.is_err());

        assert!(target.is_connected(&honest));
        assert_eq!(target.sessions(), 1);
    }
}
