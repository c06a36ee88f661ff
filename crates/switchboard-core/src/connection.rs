//! # Bus Connection
//!
//! An explicit connection object: it owns the transport handle, the
//! pending-call table, the signal route table, and the service publisher.
//! Proxies and emitters are created from it; nothing is looked up through
//! process-wide singletons.
//!
//! ## Pending calls
//!
//! A `call()` registers a oneshot sender keyed by a fresh serial, sends the
//! `MethodCall` frame, and suspends until the dispatch loop resolves the
//! serial or the deadline elapses. Each pending call is resolved exactly
//! once: reply, remote error, or timeout — whichever removes the table entry
//! first wins, and a reply arriving for an already-removed serial is
//! discarded.

use crate::proxy::RemoteObject;
use crate::publisher::{ObjectHandler, ServicePublisher, SignalEmitter};
use crate::registry::SignalRegistry;
use crate::transport::BusTransport;
use crate::{DEFAULT_CALL_TIMEOUT, DEFAULT_CHANNEL_CAPACITY};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use switchboard_types::interface::{INTROSPECT, INTROSPECTABLE_INTERFACE};
use switchboard_types::{
    BusFrame, CallError, CallSerial, InterfaceDescriptor, IntrospectError, ObjectIdentity,
    ObjectPath, RegisterError, RemoteErrorDetail, ServiceName, WireValue,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Connection tuning knobs.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Default deadline for method calls.
    pub call_timeout: Duration,
    /// Per-endpoint frame buffer size hint, passed to transports that honor it.
    pub channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ConnectionConfig {
    /// Build a config from environment variables, falling back to defaults.
    ///
    /// - `SWITCHBOARD_CALL_TIMEOUT_MS`
    /// - `SWITCHBOARD_CHANNEL_CAPACITY`
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_u64("SWITCHBOARD_CALL_TIMEOUT_MS") {
            config.call_timeout = Duration::from_millis(ms);
        }
        if let Some(capacity) = env_u64("SWITCHBOARD_CHANNEL_CAPACITY") {
            config.channel_capacity = capacity as usize;
        }
        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}

type PendingReply = Result<Vec<WireValue>, RemoteErrorDetail>;
type RouteKey = (ServiceName, ObjectPath);

pub(crate) struct ConnectionInner {
    name: ServiceName,
    transport: Arc<dyn BusTransport>,
    config: ConnectionConfig,

    /// In-flight calls awaiting their reply, keyed by serial.
    ///
    /// A caller that cancels by dropping the call future leaves a dead
    /// sender here; the entry is removed (and counted as a discard) when
    /// the reply eventually resolves the serial.
    pending: Mutex<HashMap<CallSerial, oneshot::Sender<PendingReply>>>,

    /// Signal registries of live proxies, keyed by the emitting identity.
    routes: Mutex<HashMap<RouteKey, Vec<Weak<SignalRegistry>>>>,

    /// Server-side registration table.
    publisher: ServicePublisher,

    // Counters
    calls_issued: AtomicU64,
    replies_discarded: AtomicU64,
    signals_routed: AtomicU64,
}

impl ConnectionInner {
    pub(crate) fn transport(&self) -> &Arc<dyn BusTransport> {
        &self.transport
    }

    pub(crate) fn name(&self) -> &ServiceName {
        &self.name
    }

    /// Resolve a reply frame against the pending-call table.
    pub(crate) fn resolve_reply(&self, serial: CallSerial, result: PendingReply) {
        let sender = self.pending.lock().remove(&serial);
        match sender {
            Some(sender) => {
                if sender.send(result).is_err() {
                    // Caller gave up (timeout or cancellation) after the
                    // entry was claimed.
                    self.replies_discarded.fetch_add(1, Ordering::Relaxed);
                    debug!(serial = %serial, "Reply discarded: caller gone");
                }
            }
            None => {
                self.replies_discarded.fetch_add(1, Ordering::Relaxed);
                debug!(serial = %serial, "Late reply discarded");
            }
        }
    }

    /// Fan a signal frame out to the live registries for its origin.
    pub(crate) fn route_signal(
        &self,
        origin: &ObjectIdentity,
        member: &str,
        args: &[WireValue],
    ) {
        let key = (origin.service.clone(), origin.path.clone());
        let registries: Vec<Arc<SignalRegistry>> = {
            let mut routes = self.routes.lock();
            match routes.get_mut(&key) {
                Some(list) => {
                    list.retain(|weak| weak.strong_count() > 0);
                    let live = list.iter().filter_map(Weak::upgrade).collect();
                    if list.is_empty() {
                        routes.remove(&key);
                    }
                    live
                }
                None => Vec::new(),
            }
        };

        let mut invoked = 0;
        for registry in &registries {
            invoked += registry.dispatch(member, args);
        }
        self.signals_routed.fetch_add(1, Ordering::Relaxed);
        debug!(origin = %origin, member, proxies = registries.len(), invoked, "Signal routed");
    }

    /// Dispatch an inbound method call through the publisher and send any
    /// reply back out.
    pub(crate) fn handle_inbound_call(
        &self,
        serial: CallSerial,
        target: &ObjectIdentity,
        interface: &str,
        member: &str,
        args: &[WireValue],
        expect_reply: bool,
    ) {
        if let Some(reply) =
            self.publisher
                .handle_call(serial, target, interface, member, args, expect_reply)
        {
            if let Err(e) = self.transport.send(reply) {
                warn!(serial = %serial, error = %e, "Failed to send reply");
            }
        }
    }

    /// Attach a proxy's registry to the route table.
    pub(crate) fn attach_registry(&self, identity: &ObjectIdentity, registry: &Arc<SignalRegistry>) {
        let key = (identity.service.clone(), identity.path.clone());
        self.routes
            .lock()
            .entry(key)
            .or_default()
            .push(Arc::downgrade(registry));
    }

    /// Detach a proxy's registry (called from the proxy's `Drop`).
    pub(crate) fn detach_registry(&self, identity: &ObjectIdentity, registry: &Arc<SignalRegistry>) {
        let key = (identity.service.clone(), identity.path.clone());
        let mut routes = self.routes.lock();
        if let Some(list) = routes.get_mut(&key) {
            list.retain(|weak| {
                weak.upgrade()
                    .is_some_and(|live| !Arc::ptr_eq(&live, registry))
            });
            if list.is_empty() {
                routes.remove(&key);
            }
        }
    }
}

/// A named bus connection.
///
/// Cheap to clone; all clones share the same transport, pending-call table,
/// and publisher. Pass clones to proxies, emitters, and spawned tasks.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Open a connection over `transport` under `name`, with default config.
    #[must_use]
    pub fn new(transport: Arc<dyn BusTransport>, name: ServiceName) -> Self {
        Self::with_config(transport, name, ConnectionConfig::default())
    }

    /// Open a connection with explicit tuning.
    #[must_use]
    pub fn with_config(
        transport: Arc<dyn BusTransport>,
        name: ServiceName,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                name,
                transport,
                config,
                pending: Mutex::new(HashMap::new()),
                routes: Mutex::new(HashMap::new()),
                publisher: ServicePublisher::new(),
                calls_issued: AtomicU64::new(0),
                replies_discarded: AtomicU64::new(0),
                signals_routed: AtomicU64::new(0),
            }),
        }
    }

    /// The service name this connection answers to.
    #[must_use]
    pub fn name(&self) -> &ServiceName {
        &self.inner.name
    }

    /// The configured default call timeout.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.inner.config.call_timeout
    }

    pub(crate) fn inner(&self) -> &Arc<ConnectionInner> {
        &self.inner
    }

    /// Issue a raw method call with the default timeout.
    ///
    /// Proxies layer descriptor validation on top of this; it is public for
    /// callers who address the bus without a descriptor.
    ///
    /// # Errors
    ///
    /// `CallError::Remote` for bus-reported errors, `Timeout` when the
    /// deadline elapses, `Transport` if the frame could not be sent.
    pub async fn call(
        &self,
        target: &ObjectIdentity,
        interface: &str,
        member: &str,
        args: Vec<WireValue>,
    ) -> Result<Vec<WireValue>, CallError> {
        self.call_with_timeout(target, interface, member, args, self.call_timeout())
            .await
    }

    /// Issue a raw method call with an explicit deadline.
    ///
    /// A zero deadline resolves to `Timeout` without waiting; any reply that
    /// arrives afterward is discarded.
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub async fn call_with_timeout(
        &self,
        target: &ObjectIdentity,
        interface: &str,
        member: &str,
        args: Vec<WireValue>,
        timeout: Duration,
    ) -> Result<Vec<WireValue>, CallError> {
        let serial = CallSerial::next();
        let (sender, receiver) = oneshot::channel();
        self.inner.pending.lock().insert(serial, sender);
        self.inner.calls_issued.fetch_add(1, Ordering::Relaxed);

        let frame = BusFrame::MethodCall {
            serial,
            target: target.clone(),
            interface: interface.to_string(),
            member: member.to_string(),
            args,
            expect_reply: true,
        };
        if let Err(e) = self.inner.transport.send(frame) {
            self.inner.pending.lock().remove(&serial);
            return Err(e.into());
        }
        debug!(serial = %serial, target = %target, interface, member, "Method call sent");

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(Ok(values))) => Ok(values),
            Ok(Ok(Err(remote))) => Err(CallError::Remote {
                name: remote.name,
                message: remote.message,
            }),
            // Pending entry dropped without a reply: the connection is gone.
            Ok(Err(_)) => Err(CallError::Transport(
                switchboard_types::TransportError::Disconnected,
            )),
            Err(_) => {
                // Claim the entry so a later reply is discarded, not delivered.
                self.inner.pending.lock().remove(&serial);
                debug!(serial = %serial, target = %target, member, "Method call timed out");
                Err(CallError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Build a proxy for `(service, path)` from statically declared
    /// interfaces.
    #[must_use]
    pub fn proxy(
        &self,
        service: ServiceName,
        path: ObjectPath,
        interfaces: Vec<InterfaceDescriptor>,
    ) -> RemoteObject {
        RemoteObject::new(self.clone(), ObjectIdentity::new(service, path), interfaces)
    }

    /// Build a proxy by introspecting the remote object.
    ///
    /// # Errors
    ///
    /// `IntrospectError::Unsupported` if the remote rejects the request,
    /// `Malformed` if the descriptor payload cannot be parsed or is empty.
    pub async fn introspect_proxy(
        &self,
        service: ServiceName,
        path: ObjectPath,
    ) -> Result<RemoteObject, IntrospectError> {
        let identity = ObjectIdentity::new(service, path);
        let values = match self
            .call(&identity, INTROSPECTABLE_INTERFACE, INTROSPECT, vec![])
            .await
        {
            Ok(values) => values,
            Err(CallError::Remote { name, message }) => {
                return Err(IntrospectError::Unsupported {
                    identity,
                    reason: format!("{name}: {message}"),
                })
            }
            Err(other) => return Err(IntrospectError::Call(other)),
        };

        let [WireValue::Str(payload)] = values.as_slice() else {
            return Err(IntrospectError::Malformed(
                "introspection reply is not a single string".to_string(),
            ));
        };
        let interfaces: Vec<InterfaceDescriptor> =
            serde_json::from_str(payload).map_err(|e| IntrospectError::Malformed(e.to_string()))?;
        if interfaces.is_empty() {
            return Err(IntrospectError::Malformed(
                "empty descriptor set".to_string(),
            ));
        }

        debug!(identity = %identity, interfaces = interfaces.len(), "Proxy built via introspection");
        Ok(RemoteObject::new(self.clone(), identity, interfaces))
    }

    /// Publish a local object at `path` under this connection's name.
    ///
    /// # Errors
    ///
    /// `RegisterError::AlreadyRegistered` if the path is already published.
    pub fn register(
        &self,
        path: ObjectPath,
        interfaces: Vec<InterfaceDescriptor>,
        handler: Arc<dyn ObjectHandler>,
    ) -> Result<(), RegisterError> {
        let identity = ObjectIdentity::new(self.inner.name.clone(), path);
        self.inner.publisher.register(identity, interfaces, handler)
    }

    /// Withdraw a published object.
    ///
    /// # Errors
    ///
    /// `RegisterError::NotRegistered` if the path is not published.
    pub fn unregister(&self, path: ObjectPath) -> Result<(), RegisterError> {
        let identity = ObjectIdentity::new(self.inner.name.clone(), path);
        self.inner.publisher.unregister(&identity)
    }

    /// Whether an object is published at `path`.
    #[must_use]
    pub fn is_registered(&self, path: ObjectPath) -> bool {
        let identity = ObjectIdentity::new(self.inner.name.clone(), path);
        self.inner.publisher.contains(&identity)
    }

    /// Create a signal emitter for an object at `path`.
    ///
    /// Registration and emission are independent: an emitter can outlive the
    /// registration, and emitting with no subscribers is a silent no-op.
    #[must_use]
    pub fn signal_emitter(
        &self,
        path: ObjectPath,
        interfaces: Vec<InterfaceDescriptor>,
    ) -> SignalEmitter {
        SignalEmitter::new(
            self.inner.transport.clone(),
            ObjectIdentity::new(self.inner.name.clone(), path),
            Arc::new(interfaces),
        )
    }

    /// Total method calls issued by this connection.
    #[must_use]
    pub fn calls_issued(&self) -> u64 {
        self.inner.calls_issued.load(Ordering::Relaxed)
    }

    /// Replies that arrived with no live pending call (late or duplicate).
    #[must_use]
    pub fn replies_discarded(&self) -> u64 {
        self.inner.replies_discarded.load(Ordering::Relaxed)
    }

    /// Signal frames routed through this connection's dispatch loop.
    #[must_use]
    pub fn signals_routed(&self) -> u64 {
        self.inner.signals_routed.load(Ordering::Relaxed)
    }
}
