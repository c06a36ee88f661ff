//! # Wire Value Model
//!
//! The bus's typed value model: every argument, return value, property, and
//! signal payload crossing the transport is a `WireValue`, and every declared
//! member type is a `WireType`.
//!
//! Type descriptors are themselves data (serde-derived), so interface
//! descriptors can be serialized, compared, and carried inside introspection
//! payloads.

use crate::errors::MapperError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type descriptor for a wire value.
///
/// Containers are structural: `Array` carries its element type, `Dict` the
/// value type of a string-keyed mapping, and `Struct` the ordered element
/// types of a fixed-arity heterogeneous record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireType {
    /// Boolean.
    Bool,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// IEEE-754 double.
    F64,
    /// UTF-8 string.
    Str,
    /// Byte sequence (distinct from `Array(U8)`).
    Bytes,
    /// Ordered sequence with a single element type.
    Array(Box<WireType>),
    /// String-keyed mapping with a single value type.
    Dict(Box<WireType>),
    /// Fixed-arity heterogeneous structure.
    Struct(Vec<WireType>),
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::U8 => write!(f, "u8"),
            Self::U16 => write!(f, "u16"),
            Self::U32 => write!(f, "u32"),
            Self::U64 => write!(f, "u64"),
            Self::I16 => write!(f, "i16"),
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::F64 => write!(f, "f64"),
            Self::Str => write!(f, "string"),
            Self::Bytes => write!(f, "bytes"),
            Self::Array(elem) => write!(f, "array<{elem}>"),
            Self::Dict(value) => write!(f, "dict<string, {value}>"),
            Self::Struct(fields) => {
                write!(f, "struct(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A typed value crossing the bus.
///
/// `Dict` uses a `BTreeMap` so equality and serialization are deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// Boolean.
    Bool(bool),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// Signed 16-bit integer.
    I16(i16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Signed 64-bit integer.
    I64(i64),
    /// IEEE-754 double.
    F64(f64),
    /// UTF-8 string.
    Str(String),
    /// Byte sequence.
    Bytes(Vec<u8>),
    /// Ordered sequence; all elements share one type.
    Array(Vec<WireValue>),
    /// String-keyed mapping; all values share one type.
    Dict(BTreeMap<String, WireValue>),
    /// Fixed-arity heterogeneous structure.
    Struct(Vec<WireValue>),
}

impl WireValue {
    /// Best-effort structural type description, for error messages.
    ///
    /// An empty container cannot name its element type and reports `?`.
    #[must_use]
    pub fn type_desc(&self) -> String {
        match self {
            Self::Bool(_) => "bool".into(),
            Self::U8(_) => "u8".into(),
            Self::U16(_) => "u16".into(),
            Self::U32(_) => "u32".into(),
            Self::U64(_) => "u64".into(),
            Self::I16(_) => "i16".into(),
            Self::I32(_) => "i32".into(),
            Self::I64(_) => "i64".into(),
            Self::F64(_) => "f64".into(),
            Self::Str(_) => "string".into(),
            Self::Bytes(_) => "bytes".into(),
            Self::Array(elems) => match elems.first() {
                Some(first) => format!("array<{}>", first.type_desc()),
                None => "array<?>".into(),
            },
            Self::Dict(entries) => match entries.values().next() {
                Some(first) => format!("dict<string, {}>", first.type_desc()),
                None => "dict<string, ?>".into(),
            },
            Self::Struct(fields) => {
                let inner: Vec<String> = fields.iter().map(Self::type_desc).collect();
                format!("struct({})", inner.join(", "))
            }
        }
    }

    /// Check that this value structurally conforms to `expected`.
    ///
    /// The check is recursive: every array element, dict value, and struct
    /// field must conform to the corresponding declared type. An empty
    /// container conforms to any container type of the same kind.
    ///
    /// # Errors
    ///
    /// `MapperError::TypeMismatch` naming the expected and actual shapes.
    pub fn conforms_to(&self, expected: &WireType) -> Result<(), MapperError> {
        let ok = match (self, expected) {
            (Self::Bool(_), WireType::Bool)
            | (Self::U8(_), WireType::U8)
            | (Self::U16(_), WireType::U16)
            | (Self::U32(_), WireType::U32)
            | (Self::U64(_), WireType::U64)
            | (Self::I16(_), WireType::I16)
            | (Self::I32(_), WireType::I32)
            | (Self::I64(_), WireType::I64)
            | (Self::F64(_), WireType::F64)
            | (Self::Str(_), WireType::Str)
            | (Self::Bytes(_), WireType::Bytes) => true,
            (Self::Array(elems), WireType::Array(elem_ty)) => {
                for elem in elems {
                    elem.conforms_to(elem_ty)?;
                }
                true
            }
            (Self::Dict(entries), WireType::Dict(value_ty)) => {
                for value in entries.values() {
                    value.conforms_to(value_ty)?;
                }
                true
            }
            (Self::Struct(fields), WireType::Struct(field_tys)) => {
                if fields.len() != field_tys.len() {
                    return Err(MapperError::TypeMismatch {
                        expected: expected.to_string(),
                        actual: self.type_desc(),
                    });
                }
                for (field, field_ty) in fields.iter().zip(field_tys) {
                    field.conforms_to(field_ty)?;
                }
                true
            }
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(MapperError::TypeMismatch {
                expected: expected.to_string(),
                actual: self.type_desc(),
            })
        }
    }
}
