//! # Error Types
//!
//! Defines the error taxonomy used across the proxy layer.
//!
//! Propagation policy: local validation errors (`Argument`,
//! `PropertyNotWritable`) are raised before any transport traffic; decode and
//! transport errors are never retried; remote application errors are always
//! surfaced to the caller.

use crate::identity::ObjectIdentity;
use thiserror::Error;

/// Errors from the type mapper.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MapperError {
    /// A value's shape does not structurally conform to the expected type.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The declared type.
        expected: String,
        /// The actual value shape.
        actual: String,
    },

    /// Malformed or under/over-specified wire data.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Errors from the transport port.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The bus connection is gone.
    #[error("Bus disconnected")]
    Disconnected,

    /// The peer's inbound queue is full.
    #[error("Backpressure: peer queue full")]
    Backpressure,

    /// The requested service name is already owned by another endpoint.
    #[error("Service name already taken: {0}")]
    NameTaken(String),

    /// The transport refused the operation.
    #[error("Transport rejected: {0}")]
    Rejected(String),
}

/// Errors from a method call, property access, or signal connection
/// issued through a proxy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// Wrong arity or non-conforming argument types. Rejected before any
    /// transport activity.
    #[error("Argument error: {0}")]
    Argument(String),

    /// The reply (or inbound payload) did not match the declared types.
    #[error(transparent)]
    Decode(#[from] MapperError),

    /// The remote side returned an application-level error.
    #[error("Remote error {name}: {message}")]
    Remote {
        /// The bus-reported error name.
        name: String,
        /// The bus-reported error message.
        message: String,
    },

    /// No reply within the configured deadline. Not retried automatically.
    #[error("Call timed out after {timeout_ms} ms")]
    Timeout {
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// The method is not declared on any of the proxy's interfaces.
    #[error("No such method: {0}")]
    NoSuchMethod(String),

    /// The property is not declared on any of the proxy's interfaces.
    #[error("No such property: {0}")]
    NoSuchProperty(String),

    /// The signal is not declared on any of the proxy's interfaces.
    #[error("No such signal: {0}")]
    NoSuchSignal(String),

    /// Attempted write to a read-only property. Rejected locally.
    #[error("Property not writable: {0}")]
    PropertyNotWritable(String),

    /// The transport failed to carry the call.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors from building a proxy via introspection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntrospectError {
    /// The remote object does not support introspection.
    #[error("Introspection unsupported by {identity}: {reason}")]
    Unsupported {
        /// The object that rejected the request.
        identity: ObjectIdentity,
        /// The remote error text.
        reason: String,
    },

    /// The remote returned a descriptor payload that could not be parsed.
    #[error("Malformed introspection payload: {0}")]
    Malformed(String),

    /// The introspection call itself failed.
    #[error(transparent)]
    Call(#[from] CallError),
}

/// Errors from the service publisher's registration table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegisterError {
    /// The identity is already published on this connection.
    #[error("Already registered: {0}")]
    AlreadyRegistered(ObjectIdentity),

    /// The identity is not published on this connection.
    #[error("Not registered: {0}")]
    NotRegistered(ObjectIdentity),
}
