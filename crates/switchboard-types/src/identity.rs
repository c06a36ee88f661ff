//! # Object Identity
//!
//! Value objects addressing a remote object on the bus: a service name plus
//! an object path. Identities are immutable once constructed.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from identity validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Service names must be non-empty and contain no whitespace.
    #[error("Invalid service name: {0:?}")]
    InvalidServiceName(String),

    /// Object paths must start with '/' and contain no empty segments.
    #[error("Invalid object path: {0:?}")]
    InvalidObjectPath(String),
}

/// A well-known or unique service name on the bus, e.g. `org.example.Chat`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceName(String);

impl ServiceName {
    /// Create a validated service name.
    ///
    /// # Errors
    ///
    /// `IdentityError::InvalidServiceName` if empty or containing whitespace.
    pub fn new(name: impl Into<String>) -> Result<Self, IdentityError> {
        let name = name.into();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(IdentityError::InvalidServiceName(name));
        }
        Ok(Self(name))
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An object path on the bus, e.g. `/org/example/Chat/Rooms/3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Create a validated object path.
    ///
    /// A path is absolute (`/`-prefixed); the root path `/` is allowed, and
    /// no segment may be empty.
    ///
    /// # Errors
    ///
    /// `IdentityError::InvalidObjectPath` on violation.
    pub fn new(path: impl Into<String>) -> Result<Self, IdentityError> {
        let path = path.into();
        let valid = path.starts_with('/')
            && (path == "/" || path[1..].split('/').all(|segment| !segment.is_empty()));
        if !valid {
            return Err(IdentityError::InvalidObjectPath(path));
        }
        Ok(Self(path))
    }

    /// The path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The (service name, object path) pair that uniquely addresses a remote
/// object across the bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectIdentity {
    /// The owning service.
    pub service: ServiceName,
    /// The object path within that service.
    pub path: ObjectPath,
}

impl ObjectIdentity {
    /// Pair a service with a path.
    #[must_use]
    pub fn new(service: ServiceName, path: ObjectPath) -> Self {
        Self { service, path }
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.service, self.path)
    }
}
