//! # Integration Test Flows
//!
//! Several bus engines wired through an [`InMemoryNetwork`], each with its
//! own dispatcher and handlers, sharing one peer directory.
//!
//! ## Flows Tested:
//!
//! 1. **Remote command**: handled by the remote peer, resolved by its ack
//! 2. **Event fan-out**: every subscriber handles a published event once
//! 3. **Loopback**: with local dispatch disabled a peer reaches itself
//!    through the network
//! 4. **Failure report**: an undecodable arrival is acknowledged and
//!    reported to subscribers of `CustomProcessingFailed`
//! 5. **Shutdown**: a stopping peer still acknowledges in-flight handling

#[cfg(test)]
mod tests {
    use crate::integration::network::{InMemoryNetwork, InMemoryTransport};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use relay_bus::{
        BincodeCodec, Bus, BusConfig, CustomProcessingFailed, HandlerDispatcher, MessageContext,
        MessageHandler, StaticPeerDirectory,
    };
    use relay_types::{Command, Event, Message, Peer, PeerId};
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct PlaceOrder {
        sku: String,
        quantity: u32,
    }
    impl Message for PlaceOrder {}
    impl Command for PlaceOrder {}

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderPlaced {
        sku: String,
    }
    impl Message for OrderPlaced {}
    impl Event for OrderPlaced {}

    /// Handler keeping every message it sees, with its context.
    struct Recorder<M> {
        received: Arc<Mutex<Vec<(M, MessageContext)>>>,
    }

    impl<M> Recorder<M> {
        fn new() -> (Self, Arc<Mutex<Vec<(M, MessageContext)>>>) {
            let received = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    received: Arc::clone(&received),
                },
                received,
            )
        }
    }

    #[async_trait]
    impl<M: Message + Clone> MessageHandler<M> for Recorder<M> {
        async fn handle(&self, message: &M, context: &MessageContext) -> anyhow::Result<()> {
            self.received.lock().push((message.clone(), context.clone()));
            Ok(())
        }
    }

    /// Handler that takes its time, flagging when it started.
    struct SlowHandler {
        started: Arc<AtomicBool>,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl MessageHandler<PlaceOrder> for SlowHandler {
        async fn handle(&self, _message: &PlaceOrder, _context: &MessageContext) -> anyhow::Result<()> {
            self.started.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Node {
        bus: Bus,
        dispatcher: Arc<HandlerDispatcher>,
        transport: Arc<InMemoryTransport>,
        peer: Peer,
        dump_dir: tempfile::TempDir,
    }

    struct NodeOptions {
        is_local_dispatch_enabled: bool,
        knows_orders: bool,
    }

    impl Default for NodeOptions {
        fn default() -> Self {
            Self {
                is_local_dispatch_enabled: true,
                knows_orders: true,
            }
        }
    }

    async fn start_node(
        network: &Arc<InMemoryNetwork>,
        directory: &Arc<StaticPeerDirectory>,
        name: &str,
        options: NodeOptions,
    ) -> Node {
        relay_telemetry::init_test_logging();

        let endpoint = format!("mem://{name}");
        let transport = network.transport(&endpoint);
        let dispatcher = Arc::new(HandlerDispatcher::new());
        let codec = BincodeCodec::new();
        if options.knows_orders {
            codec.register::<PlaceOrder>();
            codec.register::<OrderPlaced>();
        }
        let dump_dir = tempfile::tempdir().unwrap();

        let bus = Bus::builder(
            transport.clone(),
            directory.clone(),
            Arc::new(codec),
            dispatcher.clone(),
        )
        .config(
            BusConfig::default()
                .with_identity(PeerId::new(format!("Abc.{name}.0")), "Test")
                .with_local_dispatch(options.is_local_dispatch_enabled)
                .with_dump_directory(dump_dir.path()),
        )
        .build();
        bus.start().await.unwrap();

        let peer = bus.self_peer().unwrap();
        Node {
            bus,
            dispatcher,
            transport,
            peer,
            dump_dir,
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn order() -> PlaceOrder {
        PlaceOrder {
            sku: "sku-42".to_string(),
            quantity: 3,
        }
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_command_to_remote_peer_is_handled_and_acknowledged() {
        let network = InMemoryNetwork::new();
        let directory = Arc::new(StaticPeerDirectory::new());
        let client = start_node(&network, &directory, "Client", NodeOptions::default()).await;
        let server = start_node(&network, &directory, "Server", NodeOptions::default()).await;

        let (handler, received) = Recorder::<PlaceOrder>::new();
        server.dispatcher.register::<PlaceOrder, _>(handler);
        directory.subscribe::<PlaceOrder>(server.peer.clone());

        let completion = client.bus.send(order()).unwrap();
        let result = timeout(Duration::from_secs(2), completion)
            .await
            .expect("send not acknowledged")
            .unwrap();

        assert!(result.is_success());
        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, order());
        assert_eq!(received[0].1.originator.sender_id, client.peer.id);
        assert!(!received[0].1.is_local);
        assert_eq!(server.transport.ack_count(), 1);
    }

    #[tokio::test]
    async fn test_event_fans_out_to_every_subscriber() {
        let network = InMemoryNetwork::new();
        let directory = Arc::new(StaticPeerDirectory::new());
        let a = start_node(&network, &directory, "A", NodeOptions::default()).await;
        let b = start_node(&network, &directory, "B", NodeOptions::default()).await;
        let c = start_node(&network, &directory, "C", NodeOptions::default()).await;

        let mut inboxes = Vec::new();
        for node in [&a, &b, &c] {
            let (handler, received) = Recorder::<OrderPlaced>::new();
            node.dispatcher.register::<OrderPlaced, _>(handler);
            directory.subscribe::<OrderPlaced>(node.peer.clone());
            inboxes.push(received);
        }

        a.bus
            .publish(OrderPlaced {
                sku: "sku-1".to_string(),
            })
            .unwrap();

        wait_until(|| inboxes.iter().all(|inbox| inbox.lock().len() == 1)).await;

        // The publisher handled its own event locally, one envelope went out
        assert!(inboxes[0].lock()[0].1.is_local);
        assert!(!inboxes[1].lock()[0].1.is_local);
        assert_eq!(a.transport.sent_count(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(inboxes.iter().all(|inbox| inbox.lock().len() == 1));
    }

    #[tokio::test]
    async fn test_local_dispatch_disabled_loops_back_through_network() {
        let network = InMemoryNetwork::new();
        let directory = Arc::new(StaticPeerDirectory::new());
        let node = start_node(
            &network,
            &directory,
            "Solo",
            NodeOptions {
                is_local_dispatch_enabled: false,
                ..NodeOptions::default()
            },
        )
        .await;

        let (handler, received) = Recorder::<PlaceOrder>::new();
        node.dispatcher.register::<PlaceOrder, _>(handler);
        directory.subscribe::<PlaceOrder>(node.peer.clone());

        let completion = node.bus.send(order()).unwrap();
        let result = timeout(Duration::from_secs(2), completion)
            .await
            .expect("send not acknowledged")
            .unwrap();

        assert!(result.is_success());
        assert_eq!(node.transport.sent_count(), 1);
        assert_eq!(node.transport.ack_count(), 1);
        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert!(!received[0].1.is_local);
    }

    #[tokio::test]
    async fn test_undecodable_message_is_acknowledged_and_reported() {
        let network = InMemoryNetwork::new();
        let directory = Arc::new(StaticPeerDirectory::new());
        let client = start_node(&network, &directory, "Client", NodeOptions::default()).await;
        let legacy = start_node(
            &network,
            &directory,
            "Legacy",
            NodeOptions {
                knows_orders: false,
                ..NodeOptions::default()
            },
        )
        .await;

        directory.subscribe::<PlaceOrder>(legacy.peer.clone());
        let (monitor, reports) = Recorder::<CustomProcessingFailed>::new();
        client.dispatcher.register::<CustomProcessingFailed, _>(monitor);
        directory.subscribe::<CustomProcessingFailed>(client.peer.clone());

        // The sender is not blocked by the receiver's decoding failure
        let completion = client.bus.send(order()).unwrap();
        let result = timeout(Duration::from_secs(2), completion)
            .await
            .expect("send not acknowledged")
            .unwrap();
        assert!(result.is_success());

        wait_until(|| reports.lock().len() == 1).await;
        let reports = reports.lock();
        let (report, context) = &reports[0];
        assert!(report
            .exception_message
            .contains("Unable to deserialize message"));
        assert!(report
            .exception_message
            .contains(&PlaceOrder::type_name().to_string()));
        assert_eq!(context.originator.sender_id, legacy.peer.id);

        let dumps: Vec<_> = std::fs::read_dir(legacy.dump_dir.path())
            .unwrap()
            .collect();
        assert_eq!(dumps.len(), 1);
    }

    #[tokio::test]
    async fn test_stopping_peer_acknowledges_in_flight_handling() {
        let network = InMemoryNetwork::new();
        let directory = Arc::new(StaticPeerDirectory::new());
        let client = start_node(&network, &directory, "Client", NodeOptions::default()).await;
        let server = start_node(&network, &directory, "Server", NodeOptions::default()).await;

        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        server.dispatcher.register::<PlaceOrder, _>(SlowHandler {
            started: Arc::clone(&started),
            finished: Arc::clone(&finished),
        });
        directory.subscribe::<PlaceOrder>(server.peer.clone());

        let completion = client.bus.send(order()).unwrap();
        wait_until(|| started.load(Ordering::SeqCst)).await;

        server.bus.stop().await.unwrap();

        // The dispatcher drained before the transport went down
        assert!(finished.load(Ordering::SeqCst));
        assert!(!server.transport.is_started());

        let result = timeout(Duration::from_secs(2), completion)
            .await
            .expect("send not acknowledged")
            .unwrap();
        assert!(result.is_success());
    }
}
