//! # Local API Abuse
//!
//! A misbehaving module loses its own connection; the node and its other
//! modules keep working.

#[cfg(test)]
mod tests {
    use crate::harness::{eventually, ModuleClient, TestNode};
    use gossip_p2p::domain::{DataType, MessageNotificationId};
    use gossip_p2p::transport::MAX_KNOWLEDGE_PAYLOAD;
    use gossip_p2p::{ApiPacket, GossipConfig};

    const TOPIC: DataType = DataType(3);

    // =============================================================================
    // TEST GROUP 1: Rejected announcements
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_announce_without_subscription_closes_module() {
        let node = TestNode::start(1, GossipConfig::for_testing()).await;
        let mut module = ModuleClient::attach(&node).await;

        module.announce(0, TOPIC, b"uninvited").await;

        assert!(module.closed_by_node().await);
        assert_eq!(node.node.service().cached_items(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_oversized_announcement_closes_module() {
        let node = TestNode::start(1, GossipConfig::for_testing()).await;
        let mut module = ModuleClient::attach(&node).await;
        module.subscribe(&node, TOPIC).await;

        // fits an API frame but not a peer frame
        module
            .announce(0, TOPIC, &vec![0x5A; MAX_KNOWLEDGE_PAYLOAD + 1])
            .await;

        assert!(module.closed_by_node().await);
        assert_eq!(node.node.service().cached_items(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_largest_payload_is_accepted() {
        let node = TestNode::start(1, GossipConfig::for_testing()).await;
        let mut module = ModuleClient::attach(&node).await;
        module.subscribe(&node, TOPIC).await;

        module
            .announce(0, TOPIC, &vec![0x5A; MAX_KNOWLEDGE_PAYLOAD])
            .await;

        eventually("item cached", || node.node.service().cached_items() == 1).await;
        module.expect_silence().await;
    }

    // =============================================================================
    // TEST GROUP 2: Protocol misuse
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_module_sending_notification_is_dropped() {
        let node = TestNode::start(1, GossipConfig::for_testing()).await;
        let mut module = ModuleClient::attach(&node).await;

        module
            .send_forbidden(ApiPacket::Notification {
                notification: MessageNotificationId::new(9),
                data_type: TOPIC,
                data: b"spoofed".to_vec(),
            })
            .await;

        assert!(module.closed_by_node().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stale_verdict_keeps_module_attached() {
        let node = TestNode::start(1, GossipConfig::for_testing()).await;
        let mut module = ModuleClient::attach(&node).await;

        module.validate(MessageNotificationId::new(4242), true).await;

        // still served afterwards
        module.subscribe(&node, TOPIC).await;
        assert_eq!(node.node.service().pending_validations(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_misbehaving_module_does_not_affect_others() {
        let node = TestNode::start(1, GossipConfig::for_testing()).await;
        let mut origin = ModuleClient::attach(&node).await;
        origin.subscribe(&node, TOPIC).await;
        let mut validator = ModuleClient::attach(&node).await;
        validator.subscribe(&node, TOPIC).await;
        let mut rogue = ModuleClient::attach(&node).await;

        rogue.announce(0, DataType(99), b"noise").await;
        assert!(rogue.closed_by_node().await);

        origin.announce(0, TOPIC, b"still works").await;
        let (_, _, data) = validator.expect_notification().await;
        assert_eq!(data, b"still works");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_detached_module_subscriptions_are_forgotten() {
        let node = TestNode::start(1, GossipConfig::for_testing()).await;
        let mut module = ModuleClient::attach(&node).await;
        module.subscribe(&node, TOPIC).await;

        drop(module);

        eventually("subscriptions dropped", || {
            node.node.service().subscribed_modules() == 0
        })
        .await;
    }
}
