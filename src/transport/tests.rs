//! Transport Module Tests
//!
//! Validates the best-effort delivery contract of the in-process fabric.
//!
//! ## Test Scopes
//! - **Addressing**: Display format and child path derivation.
//! - **Registration**: Endpoint ownership, reclaiming and unregistering.
//! - **Delivery**: Successful sends, drops to unknown endpoints, and bincode round-trips.

#[cfg(test)]
mod tests {
    use crate::dispatch::protocol::{Job, JobReply, Message, SubTask};
    use crate::error::TransportError;
    use crate::transport::fabric::MessageFabric;
    use crate::transport::types::Address;
    use std::net::SocketAddr;

    fn node() -> SocketAddr {
        "127.0.0.1:2551".parse().unwrap()
    }

    // ============================================================
    // ADDRESS TESTS
    // ============================================================

    #[test]
    fn test_address_display() {
        let address = Address::new(node(), "/user/statsService");

        assert_eq!(address.to_string(), "stats://127.0.0.1:2551/user/statsService");
    }

    #[test]
    fn test_address_child() {
        let parent = Address::new(node(), "/user/statsWorker/");

        let child = parent.child(3);

        assert_eq!(child.path, "/user/statsWorker/3");
        assert_eq!(child.node, parent.node);
    }

    // ============================================================
    // REGISTRATION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_register_twice_fails_while_owner_alive() {
        let fabric = MessageFabric::new(false);
        let address = Address::new(node(), "/user/a");

        let _mailbox = fabric.register(address.clone()).unwrap();
        let second = fabric.register(address.clone());

        assert!(matches!(second, Err(TransportError::AddressInUse(_))));
    }

    #[tokio::test]
    async fn test_register_reclaims_abandoned_address() {
        let fabric = MessageFabric::new(false);
        let address = Address::new(node(), "/user/a");

        let mailbox = fabric.register(address.clone()).unwrap();
        drop(mailbox);

        assert!(!fabric.is_registered(&address));
        assert!(fabric.register(address.clone()).is_ok());
        assert!(fabric.is_registered(&address));
    }

    #[tokio::test]
    async fn test_count_endpoints_by_prefix() {
        let fabric = MessageFabric::new(false);
        let _a = fabric.register(Address::new(node(), "/temp/aggregator/1")).unwrap();
        let _b = fabric.register(Address::new(node(), "/temp/aggregator/2")).unwrap();
        let _c = fabric.register(Address::new(node(), "/user/statsService")).unwrap();

        assert_eq!(fabric.count_endpoints("/temp/aggregator"), 2);
        assert_eq!(fabric.count_endpoints("/user"), 1);
    }

    // ============================================================
    // DELIVERY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_send_delivers_to_registered_endpoint() {
        let fabric = MessageFabric::new(false);
        let address = Address::new(node(), "/user/a");
        let mut mailbox = fabric.register(address.clone()).unwrap();

        fabric.send(&address, Message::SubTaskResult { length: 7 });

        assert_eq!(
            mailbox.recv().await,
            Some(Message::SubTaskResult { length: 7 })
        );
        assert_eq!(fabric.delivered_count(), 1);
        assert_eq!(fabric.dropped_count(), 0);
    }

    #[tokio::test]
    async fn test_send_to_unknown_endpoint_is_dropped() {
        let fabric = MessageFabric::new(false);
        let address = Address::new(node(), "/user/nobody");

        // Must not panic or block.
        fabric.send(&address, Message::SubTaskResult { length: 1 });

        assert_eq!(fabric.dropped_count(), 1);
        assert!(matches!(
            fabric.try_send(&address, Message::SubTaskResult { length: 1 }),
            Err(TransportError::UnknownEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_send_after_unregister_is_dropped() {
        let fabric = MessageFabric::new(false);
        let address = Address::new(node(), "/temp/aggregator/x");
        let mut mailbox = fabric.register(address.clone()).unwrap();

        fabric.unregister(&address);
        fabric.send(&address, Message::SubTaskResult { length: 1 });

        assert_eq!(fabric.dropped_count(), 1);
        assert_eq!(mailbox.recv().await, None);
    }

    #[tokio::test]
    async fn test_serialized_delivery_preserves_message() {
        let fabric = MessageFabric::new(true);
        let address = Address::new(node(), "/user/a");
        let reply_to = Address::new("10.0.0.1:2552".parse().unwrap(), "/temp/ask/1");
        let mut mailbox = fabric.register(address.clone()).unwrap();

        let messages = vec![
            Message::Job {
                job: Job::new("hello world"),
                reply_to: reply_to.clone(),
            },
            Message::SubTask {
                task: SubTask::for_word("hello"),
                reply_to: reply_to.clone(),
            },
            Message::Reply(JobReply::Result {
                mean_word_length: 3.5,
            }),
        ];

        for message in messages.clone() {
            fabric.send(&address, message);
        }

        for expected in messages {
            assert_eq!(mailbox.recv().await, Some(expected));
        }
    }
}
