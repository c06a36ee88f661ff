//! # End-to-End Chat Scenarios
//!
//! Drives the full stack the way the demo chat service does:
//!
//! ```text
//! [Client Connection] ──MethodCall──→ [MemoryBus] ──→ [Server Connection]
//!         │                                                   │
//!         │                                          [ServicePublisher]
//!         │                                                   │
//!         │                                             [Room handler]
//!         │                                                   │
//!         ←──────────MethodReply / MessageReceived────────────┘
//! ```
//!
//! ## Test Categories
//!
//! 1. **Happy Path**: send a message, observe exactly one signal delivery
//! 2. **Fan-out**: multiple callbacks fire in connection order
//! 3. **Properties**: read-only `Name` served and write rejected locally
//! 4. **Introspection**: proxies built from the published descriptors
//! 5. **Errors**: remote and bus-synthesized failures surface as `Remote`

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{
        init_tracing, path, publish_chat_service, room_interfaces, service, LiveConnection,
        CHAT_SERVICE, ROOM_INTERFACE,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use switchboard_core::{memory::ERROR_SERVICE_UNKNOWN, MemoryBus};
    use switchboard_types::{CallError, WireValue};

    /// Poll until `cond` holds or a second elapses. Signal delivery rides the
    /// dispatch loop task, so assertions on it need a settling window.
    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(cond(), "condition not reached within 1s");
    }

    #[tokio::test]
    async fn test_send_message_delivers_exactly_one_signal() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        publish_chat_service(&server.conn);
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        let proxy = client.conn.proxy(
            service(CHAT_SERVICE),
            path("/org/example/Chat/Rooms/1"),
            room_interfaces(),
        );

        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        proxy
            .connect(
                "MessageReceived",
                Arc::new(move |args| {
                    if let [WireValue::Str(msg)] = args {
                        sink.lock().push(msg.clone());
                    }
                }),
            )
            .unwrap();

        proxy
            .call(
                "SendMessage",
                vec![WireValue::Str("Hello World!".to_string())],
            )
            .await
            .unwrap();

        wait_for(|| !received.lock().is_empty()).await;
        // Settle briefly to catch any duplicate delivery.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(received.lock().as_slice(), ["Hello World!"]);
        assert_eq!(client.conn.signals_routed(), 1);
    }

    #[tokio::test]
    async fn test_multiple_callbacks_fire_in_connection_order() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        publish_chat_service(&server.conn);
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        let proxy = client.conn.proxy(
            service(CHAT_SERVICE),
            path("/org/example/Chat/Rooms/2"),
            room_interfaces(),
        );

        let order: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        for tag in 1..=3u8 {
            let order = order.clone();
            proxy
                .connect("MessageReceived", Arc::new(move |_| order.lock().push(tag)))
                .unwrap();
        }
        assert_eq!(proxy.handler_count("MessageReceived"), 3);

        proxy
            .call("SendMessage", vec![WireValue::Str("fanout".to_string())])
            .await
            .unwrap();

        wait_for(|| order.lock().len() == 3).await;
        assert_eq!(order.lock().as_slice(), [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_signal_only_reaches_subscribed_room() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        publish_chat_service(&server.conn);
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        let room1 = client.conn.proxy(
            service(CHAT_SERVICE),
            path("/org/example/Chat/Rooms/1"),
            room_interfaces(),
        );
        let room2 = client.conn.proxy(
            service(CHAT_SERVICE),
            path("/org/example/Chat/Rooms/2"),
            room_interfaces(),
        );

        let hits = Arc::new(Mutex::new(0usize));
        let sink = hits.clone();
        room1
            .connect("MessageReceived", Arc::new(move |_| *sink.lock() += 1))
            .unwrap();

        // Post into the room nobody is listening to, then the watched one.
        room2
            .call("SendMessage", vec![WireValue::Str("unseen".to_string())])
            .await
            .unwrap();
        room1
            .call("SendMessage", vec![WireValue::Str("seen".to_string())])
            .await
            .unwrap();

        wait_for(|| *hits.lock() == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*hits.lock(), 1);
    }

    #[tokio::test]
    async fn test_name_property_reads_room_name() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        publish_chat_service(&server.conn);
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        let proxy = client.conn.proxy(
            service(CHAT_SERVICE),
            path("/org/example/Chat/Rooms/3"),
            room_interfaces(),
        );
        let value = proxy.get_property("Name").await.unwrap();
        assert_eq!(value, WireValue::Str("3".to_string()));
    }

    #[tokio::test]
    async fn test_read_only_property_write_rejected_without_transport_traffic() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        publish_chat_service(&server.conn);
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        let proxy = client.conn.proxy(
            service(CHAT_SERVICE),
            path("/org/example/Chat/Rooms/1"),
            room_interfaces(),
        );

        let before = bus.frames_routed();
        let err = proxy
            .set_property("Name", WireValue::Str("renamed".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::PropertyNotWritable(ref p) if p == "Name"));
        assert_eq!(bus.frames_routed(), before);
    }

    #[tokio::test]
    async fn test_introspected_proxy_matches_published_descriptors() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        publish_chat_service(&server.conn);
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        let proxy = client
            .conn
            .introspect_proxy(service(CHAT_SERVICE), path("/org/example/Chat/Rooms/1"))
            .await
            .unwrap();

        assert_eq!(proxy.interfaces(), room_interfaces().as_slice());
        assert_eq!(proxy.interfaces()[0].name, ROOM_INTERFACE);

        // The discovered descriptors must be good enough to call through.
        let reply = proxy
            .call("Echo", vec![WireValue::Str("ping".to_string())])
            .await
            .unwrap();
        assert_eq!(reply, vec![WireValue::Str("ping".to_string())]);
    }

    #[tokio::test]
    async fn test_handler_error_surfaces_as_remote() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        publish_chat_service(&server.conn);
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        // `Kick` is declared on the room interface but the handler refuses it.
        let proxy = client.conn.proxy(
            service(CHAT_SERVICE),
            path("/org/example/Chat/Rooms/1"),
            room_interfaces(),
        );

        let err = proxy
            .call("Kick", vec![WireValue::Str("troll".to_string())])
            .await
            .unwrap_err();
        match err {
            CallError::Remote { name, .. } => {
                assert_eq!(name, "org.example.Chat.Error.Unhandled");
            }
            other => panic!("expected remote error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_call_to_unknown_service_reports_service_unknown() {
        init_tracing();
        let bus = MemoryBus::new();
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        let proxy = client.conn.proxy(
            service("org.example.Ghost"),
            path("/org/example/Chat/Rooms/1"),
            room_interfaces(),
        );
        let err = proxy
            .call("SendMessage", vec![WireValue::Str("hi".to_string())])
            .await
            .unwrap_err();
        match err {
            CallError::Remote { name, .. } => assert_eq!(name, ERROR_SERVICE_UNKNOWN),
            other => panic!("expected service-unknown error, got {other}"),
        }
    }
}
