//! # Interface Descriptors
//!
//! The typed schema of a remote (or published) object: methods, properties,
//! and signals, with their declared wire types. Descriptors are immutable
//! after construction and serde-derived, so the introspection payload is
//! simply the JSON form of a descriptor list.

use crate::value::WireType;
use serde::{Deserialize, Serialize};

/// Reserved interface handled natively by the core: dedicated property
/// get/set calls (`Get(interface, name)` / `Set(interface, name, value)`).
pub const PROPERTIES_INTERFACE: &str = "bus.Properties";

/// Member name for the dedicated property read call.
pub const PROPERTIES_GET: &str = "Get";

/// Member name for the dedicated property write call.
pub const PROPERTIES_SET: &str = "Set";

/// Reserved interface handled natively by the core: descriptor retrieval
/// (`Introspect()` returning the JSON descriptor document).
pub const INTROSPECTABLE_INTERFACE: &str = "bus.Introspectable";

/// Member name for the introspection call.
pub const INTROSPECT: &str = "Introspect";

/// A declared method: name, ordered parameter types, optional return type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Method name.
    pub name: String,
    /// Ordered parameter types.
    pub inputs: Vec<WireType>,
    /// Return type; `None` for methods that reply with no value.
    pub output: Option<WireType>,
}

/// Read/write access flags for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyAccess {
    /// Get only.
    Read,
    /// Set only.
    Write,
    /// Get and set.
    ReadWrite,
}

impl PropertyAccess {
    /// Whether a get call is permitted.
    #[must_use]
    pub fn readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Whether a set call is permitted.
    #[must_use]
    pub fn writable(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// A declared property: name, type, access flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Property name.
    pub name: String,
    /// Property type.
    pub ty: WireType,
    /// Access flags.
    pub access: PropertyAccess,
}

/// A declared signal: name plus ordered parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSignature {
    /// Signal name.
    pub name: String,
    /// Ordered parameter types.
    pub args: Vec<WireType>,
}

/// The typed schema of one interface: ordered method, property, and signal
/// member sets. Treated as immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// Interface name, e.g. `org.example.Chat.Room`.
    pub name: String,
    /// Declared methods, in declaration order.
    pub methods: Vec<MethodSignature>,
    /// Declared properties, in declaration order.
    pub properties: Vec<PropertyDescriptor>,
    /// Declared signals, in declaration order.
    pub signals: Vec<SignalSignature>,
}

impl InterfaceDescriptor {
    /// Create an empty descriptor for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            properties: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// Declare a method. Builder-style, used by static interface definitions.
    #[must_use]
    pub fn with_method(
        mut self,
        name: impl Into<String>,
        inputs: Vec<WireType>,
        output: Option<WireType>,
    ) -> Self {
        self.methods.push(MethodSignature {
            name: name.into(),
            inputs,
            output,
        });
        self
    }

    /// Declare a property.
    #[must_use]
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        ty: WireType,
        access: PropertyAccess,
    ) -> Self {
        self.properties.push(PropertyDescriptor {
            name: name.into(),
            ty,
            access,
        });
        self
    }

    /// Declare a signal.
    #[must_use]
    pub fn with_signal(mut self, name: impl Into<String>, args: Vec<WireType>) -> Self {
        self.signals.push(SignalSignature {
            name: name.into(),
            args,
        });
        self
    }

    /// Look up a declared method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Look up a declared property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Look up a declared signal by name.
    #[must_use]
    pub fn signal(&self, name: &str) -> Option<&SignalSignature> {
        self.signals.iter().find(|s| s.name == name)
    }
}
