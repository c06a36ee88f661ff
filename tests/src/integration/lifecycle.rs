//! # Lifecycle and Bookkeeping Tests
//!
//! Exercises the edges of the call and subscription lifecycles:
//!
//! 1. **Timeouts**: zero-deadline calls, late replies discarded not delivered
//! 2. **Registration**: duplicate publish and double-withdraw rejected
//! 3. **Subscription edges**: match rules installed on first connect, removed
//!    on last disconnect
//! 4. **Local validation**: bad arguments never reach the transport

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{
        init_tracing, path, publish_chat_service, room_interfaces, service, LiveConnection,
        Room, CHAT_SERVICE,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use switchboard_core::{BusTransport, MemoryBus};
    use switchboard_types::{BusFrame, CallError, IntrospectError, RegisterError, WireValue};

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
    async fn test_zero_timeout_fails_fast_and_late_reply_is_discarded() {
        init_tracing();
        let bus = MemoryBus::new();
        let mut server = LiveConnection::idle(&bus, CHAT_SERVICE);
        publish_chat_service(&server.conn);
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        let proxy = client.conn.proxy(
            service(CHAT_SERVICE),
            path("/org/example/Chat/Rooms/1"),
            room_interfaces(),
        );

        // The server loop is parked, so nothing can answer in time.
        let err = proxy
            .call_with_timeout(
                "Echo",
                vec![WireValue::Str("too late".to_string())],
                Duration::ZERO,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Timeout { timeout_ms: 0 }));

        // Wake the server: its answer to the expired call must be dropped.
        server.start_loop();
        wait_for(|| client.conn.replies_discarded() == 1).await;

        // The connection stays usable after an expired call.
        let reply = proxy
            .call("Echo", vec![WireValue::Str("on time".to_string())])
            .await
            .unwrap();
        assert_eq!(reply, vec![WireValue::Str("on time".to_string())]);
        assert_eq!(client.conn.replies_discarded(), 1);
    }

    #[tokio::test]
    async fn test_register_and_unregister_bookkeeping() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        let room_path = path("/org/example/Chat/Rooms/solo");
        let emitter = server
            .conn
            .signal_emitter(room_path.clone(), room_interfaces());

        server
            .conn
            .register(
                room_path.clone(),
                room_interfaces(),
                Arc::new(Room::new("solo", emitter.clone())),
            )
            .unwrap();
        assert!(server.conn.is_registered(room_path.clone()));

        // Publishing the same path twice is rejected.
        let err = server
            .conn
            .register(
                room_path.clone(),
                room_interfaces(),
                Arc::new(Room::new("imposter", emitter)),
            )
            .unwrap_err();
        assert!(matches!(err, RegisterError::AlreadyRegistered(_)));

        server.conn.unregister(room_path.clone()).unwrap();
        assert!(!server.conn.is_registered(room_path.clone()));

        let err = server.conn.unregister(room_path).unwrap_err();
        assert!(matches!(err, RegisterError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn test_subscription_edges_gate_signal_delivery() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        let room_path = path("/org/example/Chat/Rooms/1");
        let emitter = server
            .conn
            .signal_emitter(room_path.clone(), room_interfaces());
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        let proxy = client
            .conn
            .proxy(service(CHAT_SERVICE), room_path, room_interfaces());

        // No subscriber yet: the frame has nowhere to go.
        emitter
            .emit(
                "MessageReceived",
                vec![WireValue::Str("before".to_string())],
            )
            .unwrap();

        let hits = Arc::new(Mutex::new(Vec::new()));
        let sink = hits.clone();
        let id = proxy
            .connect(
                "MessageReceived",
                Arc::new(move |args| {
                    if let [WireValue::Str(msg)] = args {
                        sink.lock().push(msg.clone());
                    }
                }),
            )
            .unwrap();

        emitter
            .emit(
                "MessageReceived",
                vec![WireValue::Str("during".to_string())],
            )
            .unwrap();
        wait_for(|| !hits.lock().is_empty()).await;

        // Last disconnect removes the match rule; later emissions are unseen.
        assert!(proxy.disconnect(id));
        emitter
            .emit("MessageReceived", vec![WireValue::Str("after".to_string())])
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(hits.lock().as_slice(), ["during"]);
        assert_eq!(client.conn.signals_routed(), 1);
    }

    #[tokio::test]
    async fn test_emitter_validates_against_declared_signals() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        let emitter = server
            .conn
            .signal_emitter(path("/org/example/Chat/Rooms/1"), room_interfaces());

        let before = bus.frames_routed();

        let err = emitter.emit("Undeclared", vec![]).unwrap_err();
        assert!(matches!(err, CallError::NoSuchSignal(ref s) if s == "Undeclared"));

        let err = emitter
            .emit("MessageReceived", vec![WireValue::U32(7)])
            .unwrap_err();
        assert!(matches!(err, CallError::Argument(_)));

        assert_eq!(bus.frames_routed(), before);
    }

    #[tokio::test]
    async fn test_introspecting_missing_object_is_unsupported() {
        init_tracing();
        let bus = MemoryBus::new();
        let server = LiveConnection::spawn(&bus, CHAT_SERVICE);
        publish_chat_service(&server.conn);
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        let err = client
            .conn
            .introspect_proxy(service(CHAT_SERVICE), path("/org/example/Chat/Rooms/99"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntrospectError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_malformed_introspection_payload_is_rejected() {
        init_tracing();
        let bus = MemoryBus::new();
        let client = LiveConnection::spawn(&bus, "org.example.Client");

        // A raw endpoint that answers any call with a non-JSON string.
        let rogue = bus
            .endpoint(&service("org.example.Rogue"))
            .expect("endpoint");
        tokio::spawn(async move {
            while let Some(frame) = rogue.next_event().await {
                if let BusFrame::MethodCall { serial, .. } = frame {
                    rogue
                        .send(BusFrame::MethodReply {
                            serial,
                            result: Ok(vec![WireValue::Str("<not json>".to_string())]),
                        })
                        .expect("reply");
                }
            }
        });

        let err = client
            .conn
            .introspect_proxy(service("org.example.Rogue"), path("/obj"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntrospectError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_proxy_rejects_bad_arguments_without_transport_traffic() {
        init_tracing();
        let bus = MemoryBus::new();
        let client = LiveConnection::spawn(&bus, "org.example.Client");
        let proxy = client.conn.proxy(
            service(CHAT_SERVICE),
            path("/org/example/Chat/Rooms/1"),
            room_interfaces(),
        );

        let before = bus.frames_routed();

        // Wrong arity.
        let err = proxy.call("SendMessage", vec![]).await.unwrap_err();
        assert!(matches!(err, CallError::Argument(_)));

        // Wrong shape.
        let err = proxy
            .call("SendMessage", vec![WireValue::U32(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Argument(_)));

        // Undeclared member.
        let err = proxy.call("Teleport", vec![]).await.unwrap_err();
        assert!(matches!(err, CallError::NoSuchMethod(ref m) if m == "Teleport"));

        let err = proxy.get_property("Color").await.unwrap_err();
        assert!(matches!(err, CallError::NoSuchProperty(ref p) if p == "Color"));

        assert_eq!(bus.frames_routed(), before);
        assert_eq!(client.conn.calls_issued(), 0);
    }
}
