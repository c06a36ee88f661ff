//! # Type Mapper
//!
//! Converts between host (Rust) values and the bus's wire value model.
//!
//! Encoding is structural and recursive: `encode` produces a [`WireValue`]
//! and verifies it conforms to the expected [`WireType`], including nested
//! container and struct element types. `decode` verifies the wire data
//! against the target type first, so it never yields a partially-constructed
//! value.

use crate::errors::MapperError;
use crate::value::{WireType, WireValue};
use std::collections::{BTreeMap, HashMap};

/// Conversion from a host value into a wire value.
pub trait ToWire {
    /// The wire type this host type maps to.
    fn wire_type() -> WireType;

    /// Produce the wire value.
    fn to_wire(&self) -> WireValue;
}

/// Conversion from a wire value into a host value.
pub trait FromWire: Sized {
    /// Consume the wire value.
    ///
    /// # Errors
    ///
    /// `MapperError::Decode` if the wire value does not have this type's shape.
    fn from_wire(value: WireValue) -> Result<Self, MapperError>;
}

/// Encode a host value, checking structural conformance to `expected`.
///
/// # Errors
///
/// `MapperError::TypeMismatch` if the produced value's shape does not conform
/// to `expected` (nested element types included).
pub fn encode<T: ToWire>(value: &T, expected: &WireType) -> Result<WireValue, MapperError> {
    let wire = value.to_wire();
    wire.conforms_to(expected)?;
    Ok(wire)
}

/// Decode a wire value into a host value, checking it against `target` first.
///
/// # Errors
///
/// `MapperError::Decode` on malformed or under/over-specified wire data.
pub fn decode<T: FromWire>(value: WireValue, target: &WireType) -> Result<T, MapperError> {
    if let Err(mismatch) = value.conforms_to(target) {
        return Err(MapperError::Decode(mismatch.to_string()));
    }
    T::from_wire(value)
}

fn shape_error(expected: &WireType, value: &WireValue) -> MapperError {
    MapperError::Decode(format!("expected {expected}, got {}", value.type_desc()))
}

macro_rules! impl_wire_primitive {
    ($($host:ty => $variant:ident),* $(,)?) => {
        $(
            impl ToWire for $host {
                fn wire_type() -> WireType {
                    WireType::$variant
                }

                fn to_wire(&self) -> WireValue {
                    WireValue::$variant(self.clone())
                }
            }

            impl FromWire for $host {
                fn from_wire(value: WireValue) -> Result<Self, MapperError> {
                    match value {
                        WireValue::$variant(inner) => Ok(inner),
                        other => Err(shape_error(&WireType::$variant, &other)),
                    }
                }
            }
        )*
    };
}

impl_wire_primitive! {
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f64 => F64,
    String => Str,
}

/// Byte-sequence newtype.
///
/// Keeps byte payloads distinct from `Vec<u8>`-as-integer-array, so the
/// blanket `Vec<T>` mapping below stays unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bytes(pub Vec<u8>);

impl ToWire for Bytes {
    fn wire_type() -> WireType {
        WireType::Bytes
    }

    fn to_wire(&self) -> WireValue {
        WireValue::Bytes(self.0.clone())
    }
}

impl FromWire for Bytes {
    fn from_wire(value: WireValue) -> Result<Self, MapperError> {
        match value {
            WireValue::Bytes(inner) => Ok(Self(inner)),
            other => Err(shape_error(&WireType::Bytes, &other)),
        }
    }
}

impl<T: ToWire> ToWire for Vec<T> {
    fn wire_type() -> WireType {
        WireType::Array(Box::new(T::wire_type()))
    }

    fn to_wire(&self) -> WireValue {
        WireValue::Array(self.iter().map(ToWire::to_wire).collect())
    }
}

impl<T: FromWire> FromWire for Vec<T> {
    fn from_wire(value: WireValue) -> Result<Self, MapperError> {
        match value {
            WireValue::Array(elems) => elems.into_iter().map(T::from_wire).collect(),
            other => Err(MapperError::Decode(format!(
                "expected array, got {}",
                other.type_desc()
            ))),
        }
    }
}

impl<T: ToWire> ToWire for BTreeMap<String, T> {
    fn wire_type() -> WireType {
        WireType::Dict(Box::new(T::wire_type()))
    }

    fn to_wire(&self) -> WireValue {
        WireValue::Dict(
            self.iter()
                .map(|(key, value)| (key.clone(), value.to_wire()))
                .collect(),
        )
    }
}

impl<T: FromWire> FromWire for BTreeMap<String, T> {
    fn from_wire(value: WireValue) -> Result<Self, MapperError> {
        match value {
            WireValue::Dict(entries) => entries
                .into_iter()
                .map(|(key, value)| Ok((key, T::from_wire(value)?)))
                .collect(),
            other => Err(MapperError::Decode(format!(
                "expected dict, got {}",
                other.type_desc()
            ))),
        }
    }
}

impl<T: ToWire> ToWire for HashMap<String, T> {
    fn wire_type() -> WireType {
        WireType::Dict(Box::new(T::wire_type()))
    }

    fn to_wire(&self) -> WireValue {
        WireValue::Dict(
            self.iter()
                .map(|(key, value)| (key.clone(), value.to_wire()))
                .collect(),
        )
    }
}

impl<T: FromWire> FromWire for HashMap<String, T> {
    fn from_wire(value: WireValue) -> Result<Self, MapperError> {
        match value {
            WireValue::Dict(entries) => entries
                .into_iter()
                .map(|(key, value)| Ok((key, T::from_wire(value)?)))
                .collect(),
            other => Err(MapperError::Decode(format!(
                "expected dict, got {}",
                other.type_desc()
            ))),
        }
    }
}

macro_rules! impl_wire_tuple {
    ($(($($name:ident : $index:tt),+)),* $(,)?) => {
        $(
            impl<$($name: ToWire),+> ToWire for ($($name,)+) {
                fn wire_type() -> WireType {
                    WireType::Struct(vec![$($name::wire_type()),+])
                }

                fn to_wire(&self) -> WireValue {
                    WireValue::Struct(vec![$(self.$index.to_wire()),+])
                }
            }

            impl<$($name: FromWire),+> FromWire for ($($name,)+) {
                fn from_wire(value: WireValue) -> Result<Self, MapperError> {
                    const ARITY: usize = 0 $(+ { let _ = $index; 1 })+;
                    match value {
                        WireValue::Struct(fields) if fields.len() == ARITY => {
                            let mut fields = fields.into_iter();
                            Ok(($(
                                $name::from_wire(
                                    fields.next().ok_or_else(|| {
                                        MapperError::Decode("struct field missing".into())
                                    })?,
                                )?,
                            )+))
                        }
                        other => Err(MapperError::Decode(format!(
                            "expected struct of arity {ARITY}, got {}",
                            other.type_desc()
                        ))),
                    }
                }
            }
        )*
    };
}

impl_wire_tuple! {
    (A: 0),
    (A: 0, B: 1),
    (A: 0, B: 1, C: 2),
    (A: 0, B: 1, C: 2, D: 3),
}
