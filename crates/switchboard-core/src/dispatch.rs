//! # Dispatch Loop
//!
//! The single pump for a connection: awaits the transport's next frame and
//! routes it — replies to the pending-call table (waking the suspended
//! caller), signals to the live proxies' registries, inbound method calls to
//! the service publisher.
//!
//! Exactly one loop runs per connection. Signal callbacks execute on the
//! loop task; a callback must not block on `call()` (that reply can only be
//! delivered by this same loop). Callbacks that need to call back into the
//! bus should spawn a task holding a `Connection` clone.

use crate::connection::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use switchboard_types::BusFrame;
use tracing::{debug, info};

/// Handle for stopping a running dispatch loop.
///
/// `stop()` is idempotent: the first call wins, reentrant calls are no-ops.
#[derive(Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
}

impl StopHandle {
    /// Request the loop to exit. Any event already being processed is
    /// completed first; no event is dropped mid-delivery.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Dispatch loop stop requested");
            self.notify.notify_one();
        }
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Pumps a connection's transport until stopped or disconnected.
pub struct DispatchLoop {
    conn: Connection,
    stopped: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
}

impl DispatchLoop {
    /// Create a loop for `conn`. It does nothing until [`Self::run`].
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            stopped: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// A stop handle usable from any task.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stopped: self.stopped.clone(),
            notify: self.notify.clone(),
        }
    }

    /// Run until stopped or the transport reports disconnection.
    pub async fn run(self) {
        info!(name = %self.conn.name(), "Dispatch loop running");
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                () = self.notify.notified() => break,
                frame = async { self.conn.inner().transport().next_event().await } => {
                    match frame {
                        Some(frame) => self.route(frame),
                        None => {
                            debug!(name = %self.conn.name(), "Transport closed");
                            break;
                        }
                    }
                }
            }
        }
        info!(name = %self.conn.name(), "Dispatch loop stopped");
    }

    fn route(&self, frame: BusFrame) {
        let inner = self.conn.inner();
        match frame {
            BusFrame::MethodReply { serial, result } => {
                inner.resolve_reply(serial, result);
            }
            BusFrame::Signal {
                origin,
                member,
                args,
                ..
            } => {
                inner.route_signal(&origin, &member, &args);
            }
            BusFrame::MethodCall {
                serial,
                target,
                interface,
                member,
                args,
                expect_reply,
            } => {
                inner.handle_inbound_call(
                    serial,
                    &target,
                    &interface,
                    &member,
                    &args,
                    expect_reply,
                );
            }
        }
    }
}
