//! # In-Memory Bus
//!
//! A loopback broker implementing the transport port for tests and demos.
//! Routes method calls by target service name, replies by recorded serial,
//! and signals by match-rule fan-out. Per-endpoint FIFO queues preserve the
//! transport event order.
//!
//! This is not a daemon: no authentication, no discovery, no wire format.
//! Suitable for single-process use; a real deployment would implement
//! [`BusTransport`] over the platform bus instead.

use crate::transport::{BusTransport, MatchRule, MatchToken};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use switchboard_types::{
    BusFrame, CallSerial, RemoteErrorDetail, ServiceName, TransportError,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Error name synthesized by the broker for calls to unknown services.
pub const ERROR_SERVICE_UNKNOWN: &str = "bus.Error.ServiceUnknown";

struct EndpointState {
    queue: mpsc::Sender<BusFrame>,
    matches: Vec<(MatchToken, MatchRule)>,
}

struct ReplyRoute {
    caller: ServiceName,
    target: ServiceName,
}

struct BrokerInner {
    capacity: usize,
    endpoints: Mutex<HashMap<ServiceName, EndpointState>>,

    /// Serial -> caller/target pair. The caller half routes the reply back;
    /// the target half lets an endpoint's teardown sweep routes that can no
    /// longer be answered.
    reply_routes: Mutex<HashMap<CallSerial, ReplyRoute>>,

    /// Total frames delivered to endpoint queues.
    frames_routed: AtomicU64,
}

impl BrokerInner {
    fn deliver(&self, service: &ServiceName, frame: BusFrame) -> Result<(), TransportError> {
        let queue = {
            let endpoints = self.endpoints.lock();
            match endpoints.get(service) {
                Some(endpoint) => endpoint.queue.clone(),
                None => {
                    return Err(TransportError::Rejected(format!(
                        "no endpoint for {service}"
                    )))
                }
            }
        };
        queue.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => TransportError::Disconnected,
        })?;
        self.frames_routed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn route(&self, sender: &ServiceName, frame: BusFrame) -> Result<(), TransportError> {
        match &frame {
            BusFrame::MethodCall {
                serial,
                target,
                member,
                expect_reply,
                ..
            } => {
                if !self.endpoints.lock().contains_key(&target.service) {
                    debug!(target = %target, member, "Call to unknown service");
                    if *expect_reply {
                        let reply = BusFrame::MethodReply {
                            serial: *serial,
                            result: Err(RemoteErrorDetail::new(
                                ERROR_SERVICE_UNKNOWN,
                                format!("service {} is not on the bus", target.service),
                            )),
                        };
                        return self.deliver(sender, reply);
                    }
                    return Ok(());
                }

                if *expect_reply {
                    self.reply_routes.lock().insert(
                        *serial,
                        ReplyRoute {
                            caller: sender.clone(),
                            target: target.service.clone(),
                        },
                    );
                }
                let service = target.service.clone();
                self.deliver(&service, frame)
            }

            BusFrame::MethodReply { serial, .. } => {
                match self.reply_routes.lock().remove(serial) {
                    Some(route) => self.deliver(&route.caller, frame),
                    None => {
                        debug!(serial = %serial, "Reply with no recorded caller, dropped");
                        Ok(())
                    }
                }
            }

            BusFrame::Signal { .. } => {
                let subscribers: Vec<ServiceName> = {
                    let endpoints = self.endpoints.lock();
                    endpoints
                        .iter()
                        .filter(|(_, endpoint)| {
                            endpoint.matches.iter().any(|(_, rule)| rule.matches(&frame))
                        })
                        .map(|(name, _)| name.clone())
                        .collect()
                };
                for subscriber in subscribers {
                    if let Err(e) = self.deliver(&subscriber, frame.clone()) {
                        warn!(subscriber = %subscriber, error = %e, "Signal delivery failed");
                    }
                }
                Ok(())
            }
        }
    }
}

/// A single-process loopback bus.
pub struct MemoryBus {
    inner: Arc<BrokerInner>,
}

impl MemoryBus {
    /// Create a bus with the default per-endpoint queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with a specific per-endpoint queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                capacity,
                endpoints: Mutex::new(HashMap::new()),
                reply_routes: Mutex::new(HashMap::new()),
                frames_routed: AtomicU64::new(0),
            }),
        }
    }

    /// Claim `name` and return its transport endpoint.
    ///
    /// # Errors
    ///
    /// `TransportError::NameTaken` if the name is already claimed.
    pub fn endpoint(&self, name: &ServiceName) -> Result<MemoryTransport, TransportError> {
        let mut endpoints = self.inner.endpoints.lock();
        if endpoints.contains_key(name) {
            return Err(TransportError::NameTaken(name.to_string()));
        }
        let (queue, receiver) = mpsc::channel(self.inner.capacity);
        endpoints.insert(
            name.clone(),
            EndpointState {
                queue,
                matches: Vec::new(),
            },
        );
        debug!(name = %name, "Endpoint claimed");
        Ok(MemoryTransport {
            name: name.clone(),
            broker: self.inner.clone(),
            receiver: tokio::sync::Mutex::new(receiver),
        })
    }

    /// Number of live endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.inner.endpoints.lock().len()
    }

    /// Total frames delivered to endpoint queues.
    #[must_use]
    pub fn frames_routed(&self) -> u64 {
        self.inner.frames_routed.load(Ordering::Relaxed)
    }

    /// Serials currently awaiting a reply frame.
    #[must_use]
    pub fn pending_reply_routes(&self) -> usize {
        self.inner.reply_routes.lock().len()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One endpoint's transport handle on a [`MemoryBus`].
pub struct MemoryTransport {
    name: ServiceName,
    broker: Arc<BrokerInner>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<BusFrame>>,
}

impl MemoryTransport {
    /// The service name this endpoint claimed.
    #[must_use]
    pub fn name(&self) -> &ServiceName {
        &self.name
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BusTransport for MemoryTransport {
    fn send(&self, frame: BusFrame) -> Result<(), TransportError> {
        self.broker.route(&self.name, frame)
    }

    async fn next_event(&self) -> Option<BusFrame> {
        self.receiver.lock().await.recv().await
    }

    fn add_match(&self, rule: MatchRule) -> Result<MatchToken, TransportError> {
        let mut endpoints = self.broker.endpoints.lock();
        let Some(endpoint) = endpoints.get_mut(&self.name) else {
            return Err(TransportError::Disconnected);
        };
        let token = MatchToken::next();
        endpoint.matches.push((token, rule));
        Ok(token)
    }

    fn remove_match(&self, token: MatchToken) -> Result<(), TransportError> {
        let mut endpoints = self.broker.endpoints.lock();
        let Some(endpoint) = endpoints.get_mut(&self.name) else {
            return Err(TransportError::Disconnected);
        };
        endpoint.matches.retain(|(t, _)| *t != token);
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.broker.endpoints.lock().remove(&self.name);
        // Routes involving this endpoint can never resolve now.
        self.broker
            .reply_routes
            .lock()
            .retain(|_, route| route.caller != self.name && route.target != self.name);
        debug!(name = %self.name, "Endpoint released");
    }
}
