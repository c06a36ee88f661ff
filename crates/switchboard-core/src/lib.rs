//! # Switchboard Core - Remote-Object Proxy and Signal Dispatch
//!
//! The client/server core of the bus binding: typed proxies over remote
//! objects, a per-proxy signal registry, the dispatch loop that pumps the
//! transport, and the service publisher for the server role.
//!
//! ```text
//! ┌──────────────┐   call()/get/set    ┌──────────────┐
//! │ RemoteObject │ ──────────────────→ │  Connection  │──→ BusTransport
//! │   (proxy)    │                     │ pending-call │
//! └──────────────┘                     │    table     │
//!        ↑ callbacks                   └──────────────┘
//!        │                                    ↑ resolve / route
//! ┌──────┴────────┐                    ┌──────┴───────┐
//! │ SignalRegistry│ ←───dispatch────── │ DispatchLoop │←── next_event()
//! └───────────────┘                    └──────┬───────┘
//!                                             ↓ inbound calls
//!                                     ┌───────────────────┐
//!                                     │ ServicePublisher  │──→ ObjectHandler
//!                                     └───────────────────┘
//! ```
//!
//! The transport itself (socket framing, authentication, daemon discovery)
//! is an external collaborator behind the [`BusTransport`] port; the
//! [`MemoryBus`] loopback implementation exists for tests and demos.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod connection;
pub mod dispatch;
pub mod memory;
pub mod proxy;
pub mod publisher;
pub mod registry;
pub mod transport;

// Re-export main types
pub use connection::{Connection, ConnectionConfig};
pub use dispatch::{DispatchLoop, StopHandle};
pub use memory::{MemoryBus, MemoryTransport};
pub use proxy::RemoteObject;
pub use publisher::{ObjectHandler, SignalEmitter};
pub use registry::{HandlerId, SignalCallback, SignalRegistry};
pub use transport::{BusTransport, MatchRule, MatchToken};

use std::time::Duration;

/// Default deadline for a method call awaiting its reply.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(25);

/// Maximum frames to buffer per endpoint before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
