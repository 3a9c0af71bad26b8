//! # Dissemination Flows
//!
//! ```text
//! module@A --Announce--> A ==SpreadKnowledge==> B --Notification--> module@B
//!                                               B <--Validation---- module@B
//!                                               B ==SpreadKnowledge==> C --> module@C
//! ```
//!
//! Items travel only after every local subscriber on the receiving node
//! validated them, never back to the peer they came from, and never past
//! their hop limit.

#[cfg(test)]
mod tests {
    use crate::harness::{link, mesh, ModuleClient, TestNode};
    use gossip_p2p::domain::DataType;
    use gossip_p2p::GossipConfig;

    const TOPIC: DataType = DataType(7);
    const OTHER_TOPIC: DataType = DataType(8);

    /// a -- b -- c, every node trusting every other.
    async fn chain() -> (TestNode, TestNode, TestNode) {
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        let c = TestNode::start(3, GossipConfig::for_testing()).await;
        mesh(&[&a, &b, &c]);
        link(&a, &b).await;
        link(&b, &c).await;
        (a, b, c)
    }

    // =============================================================================
    // TEST GROUP 1: One hop
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_announcement_reaches_subscribed_peer_module() {
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        mesh(&[&a, &b]);
        link(&a, &b).await;

        let mut origin = ModuleClient::attach(&a).await;
        origin.subscribe(&a, TOPIC).await;
        let mut validator = ModuleClient::attach(&b).await;
        validator.subscribe(&b, TOPIC).await;

        origin.announce(64, TOPIC, b"block 1").await;

        let (notification, data_type, data) = validator.expect_notification().await;
        assert_eq!(data_type, TOPIC);
        assert_eq!(data, b"block 1");
        validator.validate(notification, true).await;

        // the originating module is never asked about its own item
        origin.expect_silence().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_other_topics_are_not_delivered() {
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        mesh(&[&a, &b]);
        link(&a, &b).await;

        let mut origin = ModuleClient::attach(&a).await;
        origin.subscribe(&a, OTHER_TOPIC).await;
        let mut validator = ModuleClient::attach(&b).await;
        validator.subscribe(&b, TOPIC).await;

        origin.announce(0, OTHER_TOPIC, b"unrelated").await;

        validator.expect_silence().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_local_modules_validate_before_spreading() {
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        mesh(&[&a, &b]);
        link(&a, &b).await;

        let mut origin = ModuleClient::attach(&a).await;
        origin.subscribe(&a, TOPIC).await;
        let mut local_validator = ModuleClient::attach(&a).await;
        local_validator.subscribe(&a, TOPIC).await;
        let mut remote = ModuleClient::attach(&b).await;
        remote.subscribe(&b, TOPIC).await;

        origin.announce(10, TOPIC, b"tx").await;

        let (notification, _, data) = local_validator.expect_notification().await;
        assert_eq!(data, b"tx");
        remote.expect_silence().await;

        local_validator.validate(notification, true).await;
        let (_, _, data) = remote.expect_notification().await;
        assert_eq!(data, b"tx");
    }

    // =============================================================================
    // TEST GROUP 2: Multi-hop forwarding
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_validated_item_travels_along_chain() {
        let (a, b, c) = chain().await;
        let mut origin = ModuleClient::attach(&a).await;
        origin.subscribe(&a, TOPIC).await;
        let mut middle = ModuleClient::attach(&b).await;
        middle.subscribe(&b, TOPIC).await;
        let mut end = ModuleClient::attach(&c).await;
        end.subscribe(&c, TOPIC).await;

        origin.announce(64, TOPIC, b"header").await;

        let (notification, _, _) = middle.expect_notification().await;
        // nothing moves past b until b's module answers
        end.expect_silence().await;
        middle.validate(notification, true).await;

        let (notification, data_type, data) = end.expect_notification().await;
        assert_eq!((data_type, data.as_slice()), (TOPIC, b"header".as_slice()));
        end.validate(notification, true).await;

        origin.expect_silence().await;
        middle.expect_silence().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalid_item_stops_at_validator() {
        let (a, b, c) = chain().await;
        let mut origin = ModuleClient::attach(&a).await;
        origin.subscribe(&a, TOPIC).await;
        let mut middle = ModuleClient::attach(&b).await;
        middle.subscribe(&b, TOPIC).await;
        let mut end = ModuleClient::attach(&c).await;
        end.subscribe(&c, TOPIC).await;

        origin.announce(64, TOPIC, b"forged").await;
        let (rejected, _, _) = middle.expect_notification().await;
        middle.validate(rejected, false).await;

        origin.announce(64, TOPIC, b"genuine").await;
        let (accepted, _, data) = middle.expect_notification().await;
        assert_eq!(data, b"genuine");
        middle.validate(accepted, true).await;

        // the first item c ever sees is the second one
        let (_, _, data) = end.expect_notification().await;
        assert_eq!(data, b"genuine");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_hop_limit_ends_at_second_node() {
        let (a, b, c) = chain().await;
        let mut origin = ModuleClient::attach(&a).await;
        origin.subscribe(&a, TOPIC).await;
        let mut middle = ModuleClient::attach(&b).await;
        middle.subscribe(&b, TOPIC).await;
        let mut end = ModuleClient::attach(&c).await;
        end.subscribe(&c, TOPIC).await;

        // one hop after a: b still learns about it but is the last stop
        origin.announce(2, TOPIC, b"local news").await;

        let (notification, _, data) = middle.expect_notification().await;
        assert_eq!(data, b"local news");
        middle.validate(notification, true).await;

        end.expect_silence().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_triangle_delivers_each_item_once() {
        let a = TestNode::start(1, GossipConfig::for_testing()).await;
        let b = TestNode::start(2, GossipConfig::for_testing()).await;
        let c = TestNode::start(3, GossipConfig::for_testing()).await;
        mesh(&[&a, &b, &c]);
        link(&a, &b).await;
        link(&b, &c).await;
        link(&c, &a).await;

        let mut origin = ModuleClient::attach(&a).await;
        origin.subscribe(&a, TOPIC).await;
        let mut at_b = ModuleClient::attach(&b).await;
        at_b.subscribe(&b, TOPIC).await;
        let mut at_c = ModuleClient::attach(&c).await;
        at_c.subscribe(&c, TOPIC).await;

        origin.announce(0, TOPIC, b"flood").await;

        let (from_b, _, _) = at_b.expect_notification().await;
        let (from_c, _, _) = at_c.expect_notification().await;
        at_b.validate(from_b, true).await;
        at_c.validate(from_c, true).await;

        // b and c exchange the item once more; both recognise it as cached
        at_b.expect_silence().await;
        at_c.expect_silence().await;
        origin.expect_silence().await;
        assert_eq!(b.node.service().cached_items(), 1);
        assert_eq!(c.node.service().cached_items(), 1);
    }
}
