//! # Switchboard Types Crate
//!
//! This crate contains the wire value model, type mapper, interface
//! descriptors, object identities, bus frames, and the error taxonomy shared
//! by the client and server sides of the proxy layer.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate types are defined here.
//! - **Descriptors Are Data**: Types and interface descriptors derive serde,
//!   so they can be serialized, compared, and carried in introspection
//!   payloads.
//! - **Structural Typing**: Conformance of values to declared types is
//!   checked recursively, never by name.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod identity;
pub mod interface;
pub mod mapper;
pub mod message;
pub mod value;

pub use errors::{CallError, IntrospectError, MapperError, RegisterError, TransportError};
pub use identity::{IdentityError, ObjectIdentity, ObjectPath, ServiceName};
pub use interface::{
    InterfaceDescriptor, MethodSignature, PropertyAccess, PropertyDescriptor, SignalSignature,
};
pub use mapper::{decode, encode, Bytes, FromWire, ToWire};
pub use message::{BusFrame, CallSerial, RemoteErrorDetail};
pub use value::{WireType, WireValue};
