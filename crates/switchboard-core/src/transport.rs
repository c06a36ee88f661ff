//! Outbound port (SPI) for the bus transport.
//!
//! The core never assumes anything about how bytes move. It requires only
//! this send/poll/match contract, plus the call serial echoed back inside
//! `MethodReply` frames for correlation.

use async_trait::async_trait;
use switchboard_types::{BusFrame, ObjectPath, ServiceName, TransportError};
use uuid::Uuid;

/// A signal subscription rule: deliver signals emitted by one member of one
/// object to this connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    /// Emitting service.
    pub service: ServiceName,
    /// Emitting object path.
    pub path: ObjectPath,
    /// Interface the signal belongs to.
    pub interface: String,
    /// Signal name.
    pub member: String,
}

impl MatchRule {
    /// Whether a frame is a signal covered by this rule.
    #[must_use]
    pub fn matches(&self, frame: &BusFrame) -> bool {
        match frame {
            BusFrame::Signal {
                origin,
                interface,
                member,
                ..
            } => {
                origin.service == self.service
                    && origin.path == self.path
                    && *interface == self.interface
                    && *member == self.member
            }
            _ => false,
        }
    }
}

/// Handle for an installed match rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchToken(Uuid);

impl MatchToken {
    /// Issue a fresh token.
    #[must_use]
    pub fn next() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Transport interface consumed by the core.
///
/// Implementations carry frames to and from a named bus connection. Per-
/// connection frame order must be preserved: signal deliveries for a given
/// subscription arrive in the order the transport produced them.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Push a frame onto the bus. Fire-and-forget from the core's view;
    /// correlation happens through reply serials, not send results.
    fn send(&self, frame: BusFrame) -> Result<(), TransportError>;

    /// Await the next inbound frame. `None` means the connection is gone.
    async fn next_event(&self) -> Option<BusFrame>;

    /// Install a signal subscription. Returns a handle for removal.
    fn add_match(&self, rule: MatchRule) -> Result<MatchToken, TransportError>;

    /// Remove a previously installed subscription. Removing an unknown
    /// token is a no-op.
    fn remove_match(&self, token: MatchToken) -> Result<(), TransportError>;
}
