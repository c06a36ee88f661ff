//! # Service Publisher
//!
//! Server side of the proxy layer: maps local objects to bus identities so
//! remote callers can invoke them. Inbound calls are validated against the
//! published interface descriptors, decoded through the type mapper, and
//! dispatched to the object's [`ObjectHandler`]; failures become error
//! replies, never loop aborts.
//!
//! The dedicated `bus.Properties` and `bus.Introspectable` interfaces are
//! handled here natively, honoring the descriptors' access flags.

use crate::transport::BusTransport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use switchboard_types::interface::{
    INTROSPECT, INTROSPECTABLE_INTERFACE, PROPERTIES_GET, PROPERTIES_INTERFACE, PROPERTIES_SET,
};
use switchboard_types::{
    BusFrame, CallError, CallSerial, InterfaceDescriptor, ObjectIdentity, RegisterError,
    RemoteErrorDetail, WireValue,
};
use tracing::{debug, warn};

/// Error name for calls addressed to an unpublished object.
pub const ERROR_UNKNOWN_OBJECT: &str = "bus.Error.UnknownObject";

/// Error name for calls to an undeclared method or interface.
pub const ERROR_UNKNOWN_METHOD: &str = "bus.Error.UnknownMethod";

/// Error name for property access to an undeclared property.
pub const ERROR_UNKNOWN_PROPERTY: &str = "bus.Error.UnknownProperty";

/// Error name for wrong arity or non-conforming argument types.
pub const ERROR_INVALID_ARGS: &str = "bus.Error.InvalidArgs";

/// Error name for a write to a read-only property.
pub const ERROR_PROPERTY_READ_ONLY: &str = "bus.Error.PropertyReadOnly";

/// Error name for a read of a write-only property.
pub const ERROR_PROPERTY_WRITE_ONLY: &str = "bus.Error.PropertyWriteOnly";

/// Error name for a handler that misbehaved (wrong return shape, etc.).
pub const ERROR_FAILED: &str = "bus.Error.Failed";

/// Local dispatch target for a published object.
///
/// Implementations hold the object's state; the publisher has already
/// validated member existence and argument conformance before calling in,
/// so handlers may match on member names without re-checking shapes.
pub trait ObjectHandler: Send + Sync {
    /// Invoke a declared method.
    ///
    /// # Errors
    ///
    /// An application-level error to report back to the caller.
    fn call(&self, method: &str, args: &[WireValue]) -> Result<Vec<WireValue>, RemoteErrorDetail>;

    /// Read a declared property.
    ///
    /// # Errors
    ///
    /// An application-level error to report back to the caller.
    fn get_property(&self, name: &str) -> Result<WireValue, RemoteErrorDetail>;

    /// Write a declared property. Only reached for writable properties.
    ///
    /// # Errors
    ///
    /// An application-level error to report back to the caller.
    fn set_property(&self, name: &str, value: WireValue) -> Result<(), RemoteErrorDetail>;
}

struct PublishedObject {
    interfaces: Arc<Vec<InterfaceDescriptor>>,
    handler: Arc<dyn ObjectHandler>,
}

/// Registration table mapping object identities to local handlers.
pub struct ServicePublisher {
    objects: Mutex<HashMap<ObjectIdentity, PublishedObject>>,
    calls_handled: AtomicU64,
}

impl ServicePublisher {
    /// Create an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            calls_handled: AtomicU64::new(0),
        }
    }

    /// Publish a local object under `identity`.
    ///
    /// # Errors
    ///
    /// `RegisterError::AlreadyRegistered` if the identity is already
    /// published on this connection.
    pub fn register(
        &self,
        identity: ObjectIdentity,
        interfaces: Vec<InterfaceDescriptor>,
        handler: Arc<dyn ObjectHandler>,
    ) -> Result<(), RegisterError> {
        let mut objects = self.objects.lock();
        if objects.contains_key(&identity) {
            return Err(RegisterError::AlreadyRegistered(identity));
        }
        debug!(identity = %identity, interfaces = interfaces.len(), "Object published");
        objects.insert(
            identity,
            PublishedObject {
                interfaces: Arc::new(interfaces),
                handler,
            },
        );
        Ok(())
    }

    /// Withdraw a published object.
    ///
    /// # Errors
    ///
    /// `RegisterError::NotRegistered` if the identity is absent. Callers
    /// needing idempotence should check [`Self::contains`] first.
    pub fn unregister(&self, identity: &ObjectIdentity) -> Result<(), RegisterError> {
        match self.objects.lock().remove(identity) {
            Some(_) => {
                debug!(identity = %identity, "Object unpublished");
                Ok(())
            }
            None => Err(RegisterError::NotRegistered(identity.clone())),
        }
    }

    /// Whether `identity` is currently published.
    #[must_use]
    pub fn contains(&self, identity: &ObjectIdentity) -> bool {
        self.objects.lock().contains_key(identity)
    }

    /// Total inbound calls handled (including error replies).
    #[must_use]
    pub fn calls_handled(&self) -> u64 {
        self.calls_handled.load(Ordering::Relaxed)
    }

    /// Dispatch an inbound method call to the published object.
    ///
    /// Returns the reply frame to send, or `None` when the caller did not
    /// ask for one. Validation failures are translated into error replies
    /// rather than propagated.
    pub fn handle_call(
        &self,
        serial: CallSerial,
        target: &ObjectIdentity,
        interface: &str,
        member: &str,
        args: &[WireValue],
        expect_reply: bool,
    ) -> Option<BusFrame> {
        self.calls_handled.fetch_add(1, Ordering::Relaxed);

        let (interfaces, handler) = {
            let objects = self.objects.lock();
            match objects.get(target) {
                Some(object) => (object.interfaces.clone(), object.handler.clone()),
                None => {
                    warn!(target = %target, member, "Call to unpublished object");
                    return reply_if(
                        expect_reply,
                        serial,
                        Err(RemoteErrorDetail::new(
                            ERROR_UNKNOWN_OBJECT,
                            format!("no object published at {target}"),
                        )),
                    );
                }
            }
        };

        let result = match interface {
            INTROSPECTABLE_INTERFACE if member == INTROSPECT => introspect(&interfaces),
            PROPERTIES_INTERFACE if member == PROPERTIES_GET => {
                property_get(&interfaces, handler.as_ref(), args)
            }
            PROPERTIES_INTERFACE if member == PROPERTIES_SET => {
                property_set(&interfaces, handler.as_ref(), args)
            }
            _ => method_call(&interfaces, handler.as_ref(), interface, member, args),
        };

        if let Err(detail) = &result {
            debug!(
                target = %target,
                interface,
                member,
                error = %detail.name,
                "Inbound call rejected"
            );
        }
        reply_if(expect_reply, serial, result)
    }
}

impl Default for ServicePublisher {
    fn default() -> Self {
        Self::new()
    }
}

fn reply_if(
    expect_reply: bool,
    serial: CallSerial,
    result: Result<Vec<WireValue>, RemoteErrorDetail>,
) -> Option<BusFrame> {
    expect_reply.then_some(BusFrame::MethodReply { serial, result })
}

fn introspect(
    interfaces: &Arc<Vec<InterfaceDescriptor>>,
) -> Result<Vec<WireValue>, RemoteErrorDetail> {
    match serde_json::to_string(interfaces.as_ref()) {
        Ok(json) => Ok(vec![WireValue::Str(json)]),
        Err(e) => Err(RemoteErrorDetail::new(
            ERROR_FAILED,
            format!("descriptor serialization failed: {e}"),
        )),
    }
}

fn method_call(
    interfaces: &[InterfaceDescriptor],
    handler: &dyn ObjectHandler,
    interface: &str,
    member: &str,
    args: &[WireValue],
) -> Result<Vec<WireValue>, RemoteErrorDetail> {
    let Some(iface) = interfaces.iter().find(|i| i.name == interface) else {
        return Err(RemoteErrorDetail::new(
            ERROR_UNKNOWN_METHOD,
            format!("interface {interface} not published on this object"),
        ));
    };
    let Some(signature) = iface.method(member) else {
        return Err(RemoteErrorDetail::new(
            ERROR_UNKNOWN_METHOD,
            format!("no method {member} on {interface}"),
        ));
    };

    if args.len() != signature.inputs.len() {
        return Err(RemoteErrorDetail::new(
            ERROR_INVALID_ARGS,
            format!(
                "{member}: expected {} arguments, got {}",
                signature.inputs.len(),
                args.len()
            ),
        ));
    }
    for (arg, expected) in args.iter().zip(&signature.inputs) {
        if let Err(mismatch) = arg.conforms_to(expected) {
            return Err(RemoteErrorDetail::new(ERROR_INVALID_ARGS, mismatch.to_string()));
        }
    }

    let returned = handler.call(member, args)?;
    match &signature.output {
        None if returned.is_empty() => Ok(returned),
        None => Err(RemoteErrorDetail::new(
            ERROR_FAILED,
            format!("{member}: handler returned values for a void method"),
        )),
        Some(output) => {
            let [value] = returned.as_slice() else {
                return Err(RemoteErrorDetail::new(
                    ERROR_FAILED,
                    format!("{member}: handler returned {} values, expected 1", returned.len()),
                ));
            };
            if let Err(mismatch) = value.conforms_to(output) {
                return Err(RemoteErrorDetail::new(
                    ERROR_FAILED,
                    format!("{member}: handler return value: {mismatch}"),
                ));
            }
            Ok(returned)
        }
    }
}

fn property_get(
    interfaces: &[InterfaceDescriptor],
    handler: &dyn ObjectHandler,
    args: &[WireValue],
) -> Result<Vec<WireValue>, RemoteErrorDetail> {
    let [WireValue::Str(interface), WireValue::Str(name)] = args else {
        return Err(RemoteErrorDetail::new(
            ERROR_INVALID_ARGS,
            "Get takes (interface: string, name: string)",
        ));
    };
    let property = lookup_property(interfaces, interface, name)?;
    if !property.access.readable() {
        return Err(RemoteErrorDetail::new(
            ERROR_PROPERTY_WRITE_ONLY,
            format!("property {name} is write-only"),
        ));
    }

    let value = handler.get_property(name)?;
    if let Err(mismatch) = value.conforms_to(&property.ty) {
        return Err(RemoteErrorDetail::new(
            ERROR_FAILED,
            format!("{name}: handler value: {mismatch}"),
        ));
    }
    Ok(vec![value])
}

fn property_set(
    interfaces: &[InterfaceDescriptor],
    handler: &dyn ObjectHandler,
    args: &[WireValue],
) -> Result<Vec<WireValue>, RemoteErrorDetail> {
    let [WireValue::Str(interface), WireValue::Str(name), value] = args else {
        return Err(RemoteErrorDetail::new(
            ERROR_INVALID_ARGS,
            "Set takes (interface: string, name: string, value)",
        ));
    };
    let property = lookup_property(interfaces, interface, name)?;
    if !property.access.writable() {
        return Err(RemoteErrorDetail::new(
            ERROR_PROPERTY_READ_ONLY,
            format!("property {name} is read-only"),
        ));
    }
    if let Err(mismatch) = value.conforms_to(&property.ty) {
        return Err(RemoteErrorDetail::new(ERROR_INVALID_ARGS, mismatch.to_string()));
    }

    handler.set_property(name, value.clone())?;
    Ok(vec![])
}

fn lookup_property<'a>(
    interfaces: &'a [InterfaceDescriptor],
    interface: &str,
    name: &str,
) -> Result<&'a switchboard_types::PropertyDescriptor, RemoteErrorDetail> {
    interfaces
        .iter()
        .find(|i| i.name == interface)
        .and_then(|i| i.property(name))
        .ok_or_else(|| {
            RemoteErrorDetail::new(
                ERROR_UNKNOWN_PROPERTY,
                format!("no property {name} on {interface}"),
            )
        })
}

/// Emits signals from a published object.
///
/// Emission is fire-and-forget: the frame is pushed through the transport to
/// whoever currently subscribes; there is no acknowledgment and no buffering
/// when nobody is listening. A transport failure is logged and swallowed.
#[derive(Clone)]
pub struct SignalEmitter {
    transport: Arc<dyn BusTransport>,
    origin: ObjectIdentity,
    interfaces: Arc<Vec<InterfaceDescriptor>>,
}

impl SignalEmitter {
    pub(crate) fn new(
        transport: Arc<dyn BusTransport>,
        origin: ObjectIdentity,
        interfaces: Arc<Vec<InterfaceDescriptor>>,
    ) -> Self {
        Self {
            transport,
            origin,
            interfaces,
        }
    }

    /// The identity signals are emitted from.
    #[must_use]
    pub fn origin(&self) -> &ObjectIdentity {
        &self.origin
    }

    /// Emit a declared signal with `args`.
    ///
    /// # Errors
    ///
    /// `CallError::NoSuchSignal` for an undeclared name,
    /// `CallError::Argument` on arity or type mismatch. Transport failures
    /// are not surfaced.
    pub fn emit(&self, signal: &str, args: Vec<WireValue>) -> Result<(), CallError> {
        let Some((interface, signature)) = self
            .interfaces
            .iter()
            .find_map(|i| i.signal(signal).map(|s| (i.name.clone(), s)))
        else {
            return Err(CallError::NoSuchSignal(signal.to_string()));
        };

        if args.len() != signature.args.len() {
            return Err(CallError::Argument(format!(
                "{signal}: expected {} arguments, got {}",
                signature.args.len(),
                args.len()
            )));
        }
        for (arg, expected) in args.iter().zip(&signature.args) {
            arg.conforms_to(expected)
                .map_err(|mismatch| CallError::Argument(mismatch.to_string()))?;
        }

        let frame = BusFrame::Signal {
            origin: self.origin.clone(),
            interface,
            member: signal.to_string(),
            args,
        };
        if let Err(e) = self.transport.send(frame) {
            warn!(origin = %self.origin, signal, error = %e, "Signal dropped by transport");
        }
        Ok(())
    }
}
