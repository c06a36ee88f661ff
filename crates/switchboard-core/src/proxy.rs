//! # Remote Object Proxy
//!
//! A local stand-in for a remote object: methods, properties, and signals
//! declared by the interface descriptors become callable through it.
//! Arguments are validated against the descriptors before any transport
//! traffic, so wrong arity or shape never leaves the process.
//!
//! Signal subscriptions are lazy at the transport level: the first callback
//! for a signal installs a match rule, the last removal (or dropping the
//! proxy) removes it.

use crate::connection::Connection;
use crate::registry::{HandlerId, SignalCallback, SignalRegistry};
use crate::transport::{MatchRule, MatchToken};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use switchboard_types::interface::{
    PROPERTIES_GET, PROPERTIES_INTERFACE, PROPERTIES_SET,
};
use switchboard_types::{
    CallError, InterfaceDescriptor, MapperError, MethodSignature, ObjectIdentity,
    PropertyDescriptor, SignalSignature, WireValue,
};
use tracing::{debug, warn};

/// Per-(service, path) handle exposing a remote object's members.
///
/// Construction has no server-side effect, and neither does dropping the
/// proxy; it owns only local state (its signal registry and match rules).
pub struct RemoteObject {
    conn: Connection,
    identity: ObjectIdentity,
    interfaces: Vec<InterfaceDescriptor>,
    registry: Arc<SignalRegistry>,

    /// Transport-level match rules, one per signal with live callbacks.
    match_tokens: Mutex<HashMap<String, MatchToken>>,
}

impl std::fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObject")
            .field("identity", &self.identity)
            .field("interfaces", &self.interfaces)
            .finish_non_exhaustive()
    }
}

impl RemoteObject {
    pub(crate) fn new(
        conn: Connection,
        identity: ObjectIdentity,
        interfaces: Vec<InterfaceDescriptor>,
    ) -> Self {
        let registry = Arc::new(SignalRegistry::new());
        conn.inner().attach_registry(&identity, &registry);
        Self {
            conn,
            identity,
            interfaces,
            registry,
            match_tokens: Mutex::new(HashMap::new()),
        }
    }

    /// The remote object's identity.
    #[must_use]
    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    /// The interface descriptors this proxy was built from.
    #[must_use]
    pub fn interfaces(&self) -> &[InterfaceDescriptor] {
        &self.interfaces
    }

    fn find_method(&self, name: &str) -> Result<(&str, &MethodSignature), CallError> {
        self.interfaces
            .iter()
            .find_map(|i| i.method(name).map(|m| (i.name.as_str(), m)))
            .ok_or_else(|| CallError::NoSuchMethod(name.to_string()))
    }

    fn find_property(&self, name: &str) -> Result<(&str, &PropertyDescriptor), CallError> {
        self.interfaces
            .iter()
            .find_map(|i| i.property(name).map(|p| (i.name.as_str(), p)))
            .ok_or_else(|| CallError::NoSuchProperty(name.to_string()))
    }

    fn find_signal(&self, name: &str) -> Result<(&str, &SignalSignature), CallError> {
        self.interfaces
            .iter()
            .find_map(|i| i.signal(name).map(|s| (i.name.as_str(), s)))
            .ok_or_else(|| CallError::NoSuchSignal(name.to_string()))
    }

    /// Invoke a declared method with the connection's default timeout.
    ///
    /// # Errors
    ///
    /// `CallError::Argument` before any transport traffic on arity or shape
    /// mismatch; `Remote`, `Timeout`, `Decode`, or `Transport` afterward.
    pub async fn call(
        &self,
        method: &str,
        args: Vec<WireValue>,
    ) -> Result<Vec<WireValue>, CallError> {
        self.call_with_timeout(method, args, self.conn.call_timeout())
            .await
    }

    /// Invoke a declared method with an explicit deadline.
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub async fn call_with_timeout(
        &self,
        method: &str,
        args: Vec<WireValue>,
        timeout: Duration,
    ) -> Result<Vec<WireValue>, CallError> {
        let (interface, signature) = self.find_method(method)?;

        if args.len() != signature.inputs.len() {
            return Err(CallError::Argument(format!(
                "{method}: expected {} arguments, got {}",
                signature.inputs.len(),
                args.len()
            )));
        }
        for (arg, expected) in args.iter().zip(&signature.inputs) {
            arg.conforms_to(expected)
                .map_err(|mismatch| CallError::Argument(mismatch.to_string()))?;
        }

        let interface = interface.to_string();
        let output = signature.output.clone();
        let reply = self
            .conn
            .call_with_timeout(&self.identity, &interface, method, args, timeout)
            .await?;

        match &output {
            None => {
                if !reply.is_empty() {
                    return Err(CallError::Decode(MapperError::Decode(format!(
                        "{method}: unexpected return values for a void method"
                    ))));
                }
            }
            Some(expected) => {
                let [value] = reply.as_slice() else {
                    return Err(CallError::Decode(MapperError::Decode(format!(
                        "{method}: expected 1 return value, got {}",
                        reply.len()
                    ))));
                };
                value
                    .conforms_to(expected)
                    .map_err(|mismatch| MapperError::Decode(mismatch.to_string()))?;
            }
        }
        Ok(reply)
    }

    /// Read a declared property via the dedicated property-get call.
    ///
    /// # Errors
    ///
    /// `CallError::NoSuchProperty` locally; remote/decode errors from the
    /// transport round trip.
    pub async fn get_property(&self, name: &str) -> Result<WireValue, CallError> {
        let (interface, descriptor) = self.find_property(name)?;
        let interface = interface.to_string();
        let ty = descriptor.ty.clone();

        let reply = self
            .conn
            .call(
                &self.identity,
                PROPERTIES_INTERFACE,
                PROPERTIES_GET,
                vec![
                    WireValue::Str(interface),
                    WireValue::Str(name.to_string()),
                ],
            )
            .await?;

        let [value] = reply.as_slice() else {
            return Err(CallError::Decode(MapperError::Decode(format!(
                "{name}: property get returned {} values",
                reply.len()
            ))));
        };
        value
            .conforms_to(&ty)
            .map_err(|mismatch| MapperError::Decode(mismatch.to_string()))?;
        Ok(value.clone())
    }

    /// Write a declared property via the dedicated property-set call.
    ///
    /// A read-only property is rejected locally with `PropertyNotWritable`
    /// and no transport traffic; a non-conforming value likewise with
    /// `Argument`.
    ///
    /// # Errors
    ///
    /// See above, plus remote errors from the round trip.
    pub async fn set_property(&self, name: &str, value: WireValue) -> Result<(), CallError> {
        let (interface, descriptor) = self.find_property(name)?;
        if !descriptor.access.writable() {
            return Err(CallError::PropertyNotWritable(name.to_string()));
        }
        value
            .conforms_to(&descriptor.ty)
            .map_err(|mismatch| CallError::Argument(mismatch.to_string()))?;
        let interface = interface.to_string();

        self.conn
            .call(
                &self.identity,
                PROPERTIES_INTERFACE,
                PROPERTIES_SET,
                vec![
                    WireValue::Str(interface),
                    WireValue::Str(name.to_string()),
                    value,
                ],
            )
            .await?;
        Ok(())
    }

    /// Connect a callback to a declared signal.
    ///
    /// Callbacks run on the dispatch loop task, in connection order, with the
    /// signal's decoded arguments. The first callback for a signal installs
    /// the transport match rule (lazy subscription).
    ///
    /// # Errors
    ///
    /// `CallError::NoSuchSignal` for an undeclared name; `Transport` if the
    /// match rule could not be installed (the callback is rolled back).
    pub fn connect(&self, signal: &str, callback: SignalCallback) -> Result<HandlerId, CallError> {
        let (interface, _signature) = self.find_signal(signal)?;
        let interface = interface.to_string();

        let (id, first) = self.registry.connect(signal, callback);
        if first {
            let rule = MatchRule {
                service: self.identity.service.clone(),
                path: self.identity.path.clone(),
                interface,
                member: signal.to_string(),
            };
            match self.conn.inner().transport().add_match(rule) {
                Ok(token) => {
                    self.match_tokens.lock().insert(signal.to_string(), token);
                }
                Err(e) => {
                    self.registry.disconnect(id);
                    return Err(e.into());
                }
            }
        }
        Ok(id)
    }

    /// Disconnect a previously connected callback.
    ///
    /// Returns `false` if the handle was already disconnected. Removing the
    /// last callback for a signal removes the transport match rule.
    pub fn disconnect(&self, id: HandlerId) -> bool {
        let Some((signal, now_empty)) = self.registry.disconnect(id) else {
            return false;
        };
        if now_empty {
            if let Some(token) = self.match_tokens.lock().remove(&signal) {
                if let Err(e) = self.conn.inner().transport().remove_match(token) {
                    warn!(identity = %self.identity, signal = %signal, error = %e,
                        "Failed to remove match rule");
                }
            }
        }
        true
    }

    /// Number of callbacks currently connected to `signal`.
    #[must_use]
    pub fn handler_count(&self, signal: &str) -> usize {
        self.registry.handler_count(signal)
    }
}

impl Drop for RemoteObject {
    fn drop(&mut self) {
        // Release transport subscriptions and detach from signal routing;
        // no callback runs after this. Clearing the registry covers a
        // delivery that upgraded its handle before the detach: its per-
        // callback liveness check finds nothing registered.
        let tokens: Vec<MatchToken> = self.match_tokens.lock().drain().map(|(_, t)| t).collect();
        for token in tokens {
            if let Err(e) = self.conn.inner().transport().remove_match(token) {
                debug!(identity = %self.identity, error = %e, "Match rule cleanup failed");
            }
        }
        self.registry.clear();
        self.conn.inner().detach_registry(&self.identity, &self.registry);
        debug!(identity = %self.identity, "Proxy dropped");
    }
}
