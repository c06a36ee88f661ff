//! Cross-crate integration scenarios.

pub mod e2e_chat;
pub mod lifecycle;

// =============================================================================
// SHARED FIXTURES (only compiled during tests)
// =============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;
    use switchboard_core::{
        Connection, DispatchLoop, MemoryBus, ObjectHandler, SignalEmitter, StopHandle,
    };
    use switchboard_types::{
        InterfaceDescriptor, ObjectPath, PropertyAccess, RemoteErrorDetail, ServiceName,
        WireType, WireValue,
    };

    /// The chat service name used across the suite.
    pub const CHAT_SERVICE: &str = "org.example.Chat";

    /// The room interface name.
    pub const ROOM_INTERFACE: &str = "org.example.Chat.Room";

    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    pub fn service(name: &str) -> ServiceName {
        ServiceName::new(name).expect("service name")
    }

    pub fn path(p: &str) -> ObjectPath {
        ObjectPath::new(p).expect("object path")
    }

    /// The chat room schema from the demo service: a read-only `Name`
    /// property, `SendMessage(msg)`, and the `MessageReceived(msg)` signal.
    pub fn room_interfaces() -> Vec<InterfaceDescriptor> {
        vec![InterfaceDescriptor::new(ROOM_INTERFACE)
            .with_method("SendMessage", vec![WireType::Str], None)
            .with_method("Echo", vec![WireType::Str], Some(WireType::Str))
            // Declared but deliberately unhandled by `Room`.
            .with_method("Kick", vec![WireType::Str], None)
            .with_property("Name", WireType::Str, PropertyAccess::Read)
            .with_signal("MessageReceived", vec![WireType::Str])]
    }

    /// A chat room: `SendMessage` re-emits the message as `MessageReceived`.
    pub struct Room {
        name: String,
        emitter: SignalEmitter,
    }

    impl Room {
        pub fn new(name: impl Into<String>, emitter: SignalEmitter) -> Self {
            Self {
                name: name.into(),
                emitter,
            }
        }
    }

    impl ObjectHandler for Room {
        fn call(
            &self,
            method: &str,
            args: &[WireValue],
        ) -> Result<Vec<WireValue>, RemoteErrorDetail> {
            match method {
                "SendMessage" => {
                    // Fire-and-forget re-emission, as the chat demo does.
                    self.emitter
                        .emit("MessageReceived", args.to_vec())
                        .expect("declared signal");
                    Ok(vec![])
                }
                "Echo" => Ok(vec![args[0].clone()]),
                other => Err(RemoteErrorDetail::new(
                    "org.example.Chat.Error.Unhandled",
                    format!("room {} cannot handle {other}", self.name),
                )),
            }
        }

        fn get_property(&self, name: &str) -> Result<WireValue, RemoteErrorDetail> {
            match name {
                "Name" => Ok(WireValue::Str(self.name.clone())),
                other => Err(RemoteErrorDetail::new(
                    "org.example.Chat.Error.Unhandled",
                    format!("no such property {other}"),
                )),
            }
        }

        fn set_property(
            &self,
            name: &str,
            _value: WireValue,
        ) -> Result<(), RemoteErrorDetail> {
            Err(RemoteErrorDetail::new(
                "org.example.Chat.Error.Unhandled",
                format!("property {name} is not writable"),
            ))
        }
    }

    /// A connection with its dispatch loop spawned; the loop is stopped on drop.
    pub struct LiveConnection {
        pub conn: Connection,
        stop: StopHandle,
        parked: Option<DispatchLoop>,
    }

    impl LiveConnection {
        pub fn spawn(bus: &MemoryBus, name: &str) -> Self {
            let name = service(name);
            let transport = bus.endpoint(&name).expect("endpoint");
            let conn = Connection::new(Arc::new(transport), name);
            let dispatch = DispatchLoop::new(conn.clone());
            let stop = dispatch.stop_handle();
            tokio::spawn(dispatch.run());
            Self {
                conn,
                stop,
                parked: None,
            }
        }

        /// A connection whose dispatch loop is parked until
        /// [`Self::start_loop`] — for tests that need an unresponsive peer.
        pub fn idle(bus: &MemoryBus, name: &str) -> Self {
            let name = service(name);
            let transport = bus.endpoint(&name).expect("endpoint");
            let conn = Connection::new(Arc::new(transport), name);
            let dispatch = DispatchLoop::new(conn.clone());
            let stop = dispatch.stop_handle();
            Self {
                conn,
                stop,
                parked: Some(dispatch),
            }
        }

        pub fn start_loop(&mut self) {
            if let Some(dispatch) = self.parked.take() {
                tokio::spawn(dispatch.run());
            }
        }
    }

    impl Drop for LiveConnection {
        fn drop(&mut self) {
            self.stop.stop();
        }
    }

    /// Publish the demo chat service: rooms 1..=3 under one service name.
    pub fn publish_chat_service(server: &Connection) {
        for room in 1..=3u8 {
            let room_path = path(&format!("/org/example/Chat/Rooms/{room}"));
            let emitter = server.signal_emitter(room_path.clone(), room_interfaces());
            server
                .register(
                    room_path,
                    room_interfaces(),
                    Arc::new(Room::new(room.to_string(), emitter)),
                )
                .expect("register room");
        }
    }
}
