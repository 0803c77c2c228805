//! Structural schema model published by the introspection endpoint.
//!
//! A [`Service`] names a set of [`Method`]s; each method carries the
//! [`TypeDescriptor`] of its argument and reply types.  Descriptors are
//! recursive tagged unions whose wire form puts the populated arm under a
//! stable key (`typeOf`, `arrayOf`, `objectOf`, `mapOf`), so a consumer can
//! walk the tree without knowing the producer's language.
//!
//! All records here are immutable snapshots: they are created during service
//! registration and never mutated afterwards.

mod reflect;

pub use reflect::{is_exported, short_type_name, MapKey, Reflect};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─────────────────────────────────────────────────────────────────────────────
// Scalar kinds
// ─────────────────────────────────────────────────────────────────────────────

/// The leaf kinds a [`TypeDescriptor`] tree bottoms out in.
///
/// `Any` is the dynamic-any scalar: an untyped value, used for open-ended
/// maps and opaque holes in a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ScalarKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Any,
}

impl ScalarKind {
    /// The wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int8 => "int8",
            ScalarKind::Int16 => "int16",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Uint8 => "uint8",
            ScalarKind::Uint16 => "uint16",
            ScalarKind::Uint32 => "uint32",
            ScalarKind::Uint64 => "uint64",
            ScalarKind::Float32 => "float32",
            ScalarKind::Float64 => "float64",
            ScalarKind::String => "string",
            ScalarKind::Any => "any",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Type descriptor
// ─────────────────────────────────────────────────────────────────────────────

/// Recursive structural description of a type.
///
/// Exactly one arm is populated on any node, and every non-leaf tree bottoms
/// out in [`ScalarKind`] leaves.  The serde form is externally tagged, which
/// yields exactly the published wire shape: `{"typeOf": "int64"}`,
/// `{"arrayOf": {...}}`, `{"objectOf": {"a": {...}}}`, `{"mapOf": {...}}`.
///
/// Equality is structural.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeDescriptor {
    /// A scalar leaf.
    #[serde(rename = "typeOf")]
    Scalar(ScalarKind),
    /// A sequence of uniformly-typed elements; length-independent.
    #[serde(rename = "arrayOf")]
    Array(Box<TypeDescriptor>),
    /// A record with named fields.  Keys are the wire field names.  An
    /// object with zero fields is legal and represents an empty struct.
    #[serde(rename = "objectOf")]
    Object(BTreeMap<String, TypeDescriptor>),
    /// A mapping with string keys and uniformly-typed values.
    #[serde(rename = "mapOf")]
    Map(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// Shorthand for a scalar leaf.
    pub fn scalar(kind: ScalarKind) -> Self {
        TypeDescriptor::Scalar(kind)
    }

    /// Shorthand for an array arm.
    pub fn array(element: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(element))
    }

    /// Shorthand for an object arm built from `(name, descriptor)` pairs.
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, TypeDescriptor)>,
        K: Into<String>,
    {
        TypeDescriptor::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )
    }

    /// Shorthand for a string-keyed map arm.
    pub fn map(value: TypeDescriptor) -> Self {
        TypeDescriptor::Map(Box::new(value))
    }

    /// The zero-field object arm used for no-op argument / reply types.
    pub fn empty_object() -> Self {
        TypeDescriptor::Object(BTreeMap::new())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service / Method records
// ─────────────────────────────────────────────────────────────────────────────

/// One method of a [`Service`]: its exported name plus the structural types
/// of its argument and reply values.
///
/// A handler that accepts or returns no meaningful body carries the
/// zero-field object arm (see [`TypeDescriptor::empty_object`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub args: TypeDescriptor,
    pub returns: TypeDescriptor,
}

/// A named grouping of methods — the first dot-delimited segment of an RPC
/// method name on the wire.
///
/// Method-name uniqueness is guaranteed by the map keying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub methods: BTreeMap<String, Method>,
}

impl Service {
    /// Create an empty service with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: BTreeMap::new(),
        }
    }
}

/// The reply shape of the `RPC.GetServices` introspection call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceList {
    pub services: Vec<Service>,
}

/// A no-op argument / reply type.
///
/// Deserializes from `{}` (extra fields ignored) and serializes back to
/// `{}`; its schema is the zero-field object arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Empty {}
