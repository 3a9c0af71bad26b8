//! # Session Lifecycle
//!
//! Handshakes between trusted nodes, duplicate and capacity refusals,
//! teardown, and the outbound scheduler dialing on its own.

#[cfg(test)]
mod tests {
    use crate::harness::{eventually, link, mesh, TestNode};
    use gossip_p2p::{CloseReason, DisconnectReason, GossipConfig};

    // =============================================================================
    // TEST GROUP 1: Handshake
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_trusted_nodes_complete_handshake() {
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        mesh(&[&a, &b]);

        link(&a, &b).await;

        assert_eq!(a.sessions(), 1);
        assert_eq!(b.sessions(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_dial_to_connected_peer_is_refused() {
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        mesh(&[&a, &b]);
        link(&a, &b).await;

        // a's context for b is still connected
        assert!(matches!(a.connect(&b).await, Err(CloseReason::Failure(_))));

        // b dialing back is a second session with the same peer
        assert_eq!(
            b.connect(&a).await,
            Err(CloseReason::Remote(DisconnectReason::Duplicate))
        );
        assert_eq!(a.sessions(), 1);
        assert_eq!(b.sessions(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_simultaneous_dials_leave_at_most_one_session() {
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        mesh(&[&a, &b]);

        let (from_a, from_b) = tokio::join!(a.connect(&b), b.connect(&a));

        assert!(!(from_a.is_ok() && from_b.is_ok()));
        for refused in [&from_a, &from_b].into_iter().filter(|r| r.is_err()) {
            assert!(matches!(
                refused,
                Err(CloseReason::Local(DisconnectReason::Duplicate))
                    | Err(CloseReason::Remote(DisconnectReason::Duplicate))
            ));
        }
        eventually("both sides agree", || a.sessions() == b.sessions()).await;
        assert!(a.sessions() <= 1);

        if from_a.is_ok() || from_b.is_ok() {
            assert!(a.is_connected(&b) && b.is_connected(&a));
        } else {
            // both attempts crossed; nothing is left over and a fresh dial works
            eventually("crossed sessions torn down", || {
                a.sessions() == 0 && b.sessions() == 0
            })
            .await;
            link(&a, &b).await;
        }
        assert_eq!(a.sessions(), 1);
        assert_eq!(b.sessions(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_full_node_answers_busy() {
        let config = GossipConfig {
            degree: 1,
            ..GossipConfig::for_testing()
        };
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, config).await;
        let c = TestNode::start(3, GossipConfig::for_testing()).await;
        mesh(&[&a, &b, &c]);
        link(&a, &b).await;

        assert_eq!(
            c.connect(&b).await,
            Err(CloseReason::Remote(DisconnectReason::Busy))
        );
        assert!(!b.is_connected(&c));
    }

    // =============================================================================
    // TEST GROUP 2: Teardown
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_removes_session_on_remote() {
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        mesh(&[&a, &b]);
        link(&a, &b).await;

        a.node.shutdown().await;

        eventually("remote session removed", || b.sessions() == 0).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_other_sessions_survive_peer_shutdown() {
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        let c = TestNode::start(3, GossipConfig::for_testing()).await;
        mesh(&[&a, &b, &c]);
        link(&a, &b).await;
        link(&c, &b).await;

        c.node.shutdown().await;
        eventually("session with c removed", || b.sessions() == 1).await;

        // a is untouched and b still refuses a second session with a
        assert!(b.is_connected(&a));
        assert_eq!(
            b.connect(&a).await,
            Err(CloseReason::Remote(DisconnectReason::Duplicate))
        );
    }

    // =============================================================================
    // TEST GROUP 3: Outbound scheduler
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduler_dials_trusted_peers() {
        let dialing = GossipConfig {
            auto_connect: true,
            ..GossipConfig::for_testing()
        };
        let a = TestNode::start(1, dialing).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        let c = TestNode::start(3, GossipConfig::for_testing()).await;
        mesh(&[&a, &b, &c]);

        eventually("a dialed everyone", || {
            a.is_connected(&b) && a.is_connected(&c)
        })
        .await;
        assert_eq!(a.sessions(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduler_stops_at_degree() {
        let dialing = GossipConfig {
            auto_connect: true,
            degree: 1,
            ..GossipConfig::for_testing()
        };
        let a = TestNode::start(1, dialing).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        let c = TestNode::start(3, GossipConfig::for_testing()).await;
        mesh(&[&a, &b, &c]);

        eventually("a dialed one peer", || a.sessions() == 1).await;
        assert!(a.node.service().dispatcher_control().is_paused());
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert_eq!(a.sessions(), 1);
    }
}
