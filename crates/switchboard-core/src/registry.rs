//! # Signal Registry
//!
//! Per-proxy table mapping signal names to ordered callback lists. The
//! dispatch loop routes decoded signal events here; the registry fans them
//! out in registration order.
//!
//! A disconnect issued from within a callback takes effect for the remaining
//! callbacks of the same dispatch pass: each callback's registration is
//! re-checked immediately before it is invoked. A panicking callback is
//! isolated (caught, logged, counted) and never aborts the loop or the
//! remaining callbacks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use switchboard_types::WireValue;
use tracing::{debug, error};

/// Callback invoked with a signal's decoded arguments.
pub type SignalCallback = Arc<dyn Fn(&[WireValue]) + Send + Sync>;

/// Handle identifying one connected callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct HandlerEntry {
    id: HandlerId,
    callback: SignalCallback,
}

/// Per-proxy signal subscription table.
pub struct SignalRegistry {
    /// Signal name -> callbacks in registration order.
    handlers: Mutex<HashMap<String, Vec<HandlerEntry>>>,

    /// Monotonic handler id source.
    next_id: AtomicU64,

    /// Total callback invocations.
    dispatched: AtomicU64,

    /// Callbacks that panicked during dispatch.
    callback_panics: AtomicU64,
}

impl SignalRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            dispatched: AtomicU64::new(0),
            callback_panics: AtomicU64::new(0),
        }
    }

    /// Register a callback for `signal`.
    ///
    /// Returns the handler id and whether this is the first callback for the
    /// signal (the caller installs the transport-level match rule lazily on
    /// that edge).
    pub fn connect(&self, signal: &str, callback: SignalCallback) -> (HandlerId, bool) {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.lock();
        let entries = handlers.entry(signal.to_string()).or_default();
        let first = entries.is_empty();
        entries.push(HandlerEntry { id, callback });
        debug!(signal, handler = id.0, first, "Signal callback connected");
        (id, first)
    }

    /// Remove a callback by id.
    ///
    /// Returns the signal name and whether its callback list became empty
    /// (the caller removes the transport match rule on that edge), or `None`
    /// if the id was not registered.
    pub fn disconnect(&self, id: HandlerId) -> Option<(String, bool)> {
        let mut handlers = self.handlers.lock();
        for (signal, entries) in handlers.iter_mut() {
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            if entries.len() != before {
                let now_empty = entries.is_empty();
                let signal = signal.clone();
                if now_empty {
                    handlers.remove(&signal);
                }
                debug!(signal = %signal, handler = id.0, now_empty, "Signal callback disconnected");
                return Some((signal, now_empty));
            }
        }
        None
    }

    /// Number of callbacks currently registered for `signal`.
    #[must_use]
    pub fn handler_count(&self, signal: &str) -> usize {
        self.handlers.lock().get(signal).map_or(0, Vec::len)
    }

    /// Remove every callback at once.
    ///
    /// A dispatch pass that already snapshotted its callbacks finds none of
    /// them registered afterward and invokes nothing. Called when the owning
    /// proxy is destroyed.
    pub fn clear(&self) {
        let mut handlers = self.handlers.lock();
        let removed: usize = handlers.values().map(Vec::len).sum();
        handlers.clear();
        if removed > 0 {
            debug!(removed, "All signal callbacks cleared");
        }
    }

    /// Invoke every currently-registered callback for `signal`, in
    /// registration order. Returns the number of callbacks invoked.
    ///
    /// The handler table lock is never held across an invocation, so a
    /// callback may connect or disconnect handlers; a disconnect removes the
    /// target from the remainder of this pass.
    pub fn dispatch(&self, signal: &str, args: &[WireValue]) -> usize {
        let snapshot: Vec<(HandlerId, SignalCallback)> = {
            let handlers = self.handlers.lock();
            match handlers.get(signal) {
                Some(entries) => entries
                    .iter()
                    .map(|entry| (entry.id, entry.callback.clone()))
                    .collect(),
                None => return 0,
            }
        };

        let mut invoked = 0;
        for (id, callback) in snapshot {
            // Liveness check: the callback may have been disconnected by an
            // earlier callback in this same pass.
            let still_registered = self
                .handlers
                .lock()
                .get(signal)
                .is_some_and(|entries| entries.iter().any(|entry| entry.id == id));
            if !still_registered {
                continue;
            }

            self.dispatched.fetch_add(1, Ordering::Relaxed);
            invoked += 1;
            if catch_unwind(AssertUnwindSafe(|| callback(args))).is_err() {
                self.callback_panics.fetch_add(1, Ordering::Relaxed);
                error!(signal, handler = id.0, "Signal callback panicked; continuing dispatch");
            }
        }
        invoked
    }

    /// Total callback invocations across all signals.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Callbacks that panicked during dispatch.
    #[must_use]
    pub fn callback_panics(&self) -> u64 {
        self.callback_panics.load(Ordering::Relaxed)
    }
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::new()
    }
}
