//! # Bus Frames
//!
//! The event model shared with the transport: method calls, replies, and
//! signals. Replies are correlated to calls by a serial echoed back by the
//! transport, exactly one terminal reply per serial.

use crate::identity::ObjectIdentity;
use crate::value::WireValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation identifier for an in-flight method call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSerial(Uuid);

impl CallSerial {
    /// Issue a fresh serial.
    #[must_use]
    pub fn next() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An application-level error reported by the remote side of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteErrorDetail {
    /// Namespaced error name, e.g. `bus.Error.ServiceUnknown`.
    pub name: String,
    /// Human-readable message.
    pub message: String,
}

impl RemoteErrorDetail {
    /// Build an error detail.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Everything that moves across the transport in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BusFrame {
    /// A method invocation addressed to a remote object.
    MethodCall {
        /// Correlation serial, echoed back in the reply.
        serial: CallSerial,
        /// The target object.
        target: ObjectIdentity,
        /// Interface the member belongs to.
        interface: String,
        /// Method name.
        member: String,
        /// Encoded arguments.
        args: Vec<WireValue>,
        /// Whether the caller is waiting for a reply.
        expect_reply: bool,
    },

    /// The terminal outcome of a method call.
    MethodReply {
        /// The serial of the originating call.
        serial: CallSerial,
        /// Return values, or the remote error.
        result: Result<Vec<WireValue>, RemoteErrorDetail>,
    },

    /// An unsolicited event emitted by an object.
    Signal {
        /// The emitting object.
        origin: ObjectIdentity,
        /// Interface the signal belongs to.
        interface: String,
        /// Signal name.
        member: String,
        /// Encoded arguments.
        args: Vec<WireValue>,
    },
}

impl BusFrame {
    /// Short frame kind tag, for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MethodCall { .. } => "method_call",
            Self::MethodReply { .. } => "method_reply",
            Self::Signal { .. } => "signal",
        }
    }
}
