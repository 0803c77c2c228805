//! The schema-extraction contract.
//!
//! Rust has no structural runtime reflection, so types describe themselves:
//! [`Reflect`] is implemented for every scalar and container kind the wire
//! format supports, and the [`reflect_object!`](crate::reflect_object) macro
//! implements it for user structs, including the embedded-field flattening
//! rule.  Extraction is fallible at runtime so that illegal shapes (a map
//! with non-string keys) fail the registration as a whole rather than
//! producing a partial schema.

use super::{Empty, ScalarKind, TypeDescriptor};
use crate::error::SchemaError;
use std::collections::{BTreeMap, HashMap};

/// Types that can describe their own wire structure.
///
/// Implementations must be total for the type: either the whole tree walks
/// cleanly or `descriptor()` returns the first error encountered.
pub trait Reflect {
    /// Produce the structural descriptor for this type.
    fn descriptor() -> Result<TypeDescriptor, SchemaError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Scalars
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! reflect_scalar {
    ($($ty:ty => $kind:expr,)*) => {
        $(
            impl Reflect for $ty {
                fn descriptor() -> Result<TypeDescriptor, SchemaError> {
                    Ok(TypeDescriptor::Scalar($kind))
                }
            }
        )*
    };
}

reflect_scalar! {
    bool => ScalarKind::Bool,
    i8 => ScalarKind::Int8,
    i16 => ScalarKind::Int16,
    i32 => ScalarKind::Int32,
    i64 => ScalarKind::Int64,
    isize => ScalarKind::Int64,
    u8 => ScalarKind::Uint8,
    u16 => ScalarKind::Uint16,
    u32 => ScalarKind::Uint32,
    u64 => ScalarKind::Uint64,
    usize => ScalarKind::Uint64,
    f32 => ScalarKind::Float32,
    f64 => ScalarKind::Float64,
    String => ScalarKind::String,
    str => ScalarKind::String,
}

/// The dynamic-any scalar: an untyped value.
impl Reflect for serde_json::Value {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        Ok(TypeDescriptor::Scalar(ScalarKind::Any))
    }
}

impl Reflect for Empty {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        Ok(TypeDescriptor::empty_object())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Containers
// ─────────────────────────────────────────────────────────────────────────────

impl<T: Reflect> Reflect for Vec<T> {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        Ok(TypeDescriptor::Array(Box::new(T::descriptor()?)))
    }
}

impl<T: Reflect> Reflect for [T] {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        Ok(TypeDescriptor::Array(Box::new(T::descriptor()?)))
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        Ok(TypeDescriptor::Array(Box::new(T::descriptor()?)))
    }
}

// One indirection layer is transparent, mirroring the single pointer
// dereference the walk performs.
impl<'a, T: Reflect + ?Sized> Reflect for &'a T {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        T::descriptor()
    }
}

impl<T: Reflect + ?Sized> Reflect for Box<T> {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        T::descriptor()
    }
}

// An absent optional value is a wire-level `null`; the structure is the
// inner type's.
impl<T: Reflect> Reflect for Option<T> {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        T::descriptor()
    }
}

impl<K: MapKey, V: Reflect, S> Reflect for HashMap<K, V, S> {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        map_descriptor::<K, V>()
    }
}

impl<K: MapKey, V: Reflect> Reflect for BTreeMap<K, V> {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        map_descriptor::<K, V>()
    }
}

impl Reflect for serde_json::Map<String, serde_json::Value> {
    fn descriptor() -> Result<TypeDescriptor, SchemaError> {
        Ok(TypeDescriptor::Map(Box::new(TypeDescriptor::Scalar(
            ScalarKind::Any,
        ))))
    }
}

fn map_descriptor<K: MapKey, V: Reflect>() -> Result<TypeDescriptor, SchemaError> {
    if K::KIND != ScalarKind::String {
        return Err(SchemaError::UnsupportedMapKey(K::KIND.as_str()));
    }
    Ok(TypeDescriptor::Map(Box::new(V::descriptor()?)))
}

/// Scalar kinds usable as map keys.
///
/// Every scalar key type implements this so that the string-key constraint
/// is checked at extraction time: a `HashMap<i64, _>` compiles but its walk
/// fails with [`SchemaError::UnsupportedMapKey`].
pub trait MapKey {
    /// The scalar kind of the key type.
    const KIND: ScalarKind;
}

macro_rules! map_key {
    ($($ty:ty => $kind:expr,)*) => {
        $(impl MapKey for $ty { const KIND: ScalarKind = $kind; })*
    };
}

map_key! {
    String => ScalarKind::String,
    bool => ScalarKind::Bool,
    i8 => ScalarKind::Int8,
    i16 => ScalarKind::Int16,
    i32 => ScalarKind::Int32,
    i64 => ScalarKind::Int64,
    u8 => ScalarKind::Uint8,
    u16 => ScalarKind::Uint16,
    u32 => ScalarKind::Uint32,
    u64 => ScalarKind::Uint64,
}

impl MapKey for &str {
    const KIND: ScalarKind = ScalarKind::String;
}

// ─────────────────────────────────────────────────────────────────────────────
// Name helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a name is in exported form (first character uppercase).
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// The unqualified name of `T`: path segments and generic parameters
/// stripped from `std::any::type_name`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ─────────────────────────────────────────────────────────────────────────────
// Object macro
// ─────────────────────────────────────────────────────────────────────────────

/// Implement [`Reflect`] for a struct, naming each field's wire key.
///
/// ```
/// use relay_kernel::reflect_object;
///
/// struct BazArgs { aa: i64 }
/// struct BarArgs { a: i64, baz: BazArgs }
///
/// reflect_object!(BazArgs {
///     field "aa": i64,
/// });
/// reflect_object!(BarArgs {
///     field "a": i64,
///     embed BazArgs,
/// });
/// ```
///
/// `field "key": Type` inserts the walk of `Type` under `key` (the
/// serialization-tag equivalent).  `embed Type` and `embed "key": Type`
/// declare an embedded field; when the embedded walk yields an object arm
/// its fields are merged into the enclosing object — discarding any key,
/// with later entries winning on collision — while a non-object walk (e.g.
/// a map) is inserted under the key (or the type's unqualified name when no
/// key is given).  The merge-over-key precedence is deliberate and mirrors
/// the wire behavior of embedded struct serialization; rely on it with
/// care.
#[macro_export]
macro_rules! reflect_object {
    ($ty:ty { $($body:tt)* }) => {
        impl $crate::schema::Reflect for $ty {
            fn descriptor() -> ::std::result::Result<
                $crate::schema::TypeDescriptor,
                $crate::error::SchemaError,
            > {
                #[allow(unused_mut)]
                let mut fields = ::std::collections::BTreeMap::new();
                $crate::reflect_object!(@entries fields, $($body)*);
                Ok($crate::schema::TypeDescriptor::Object(fields))
            }
        }
    };

    (@entries $fields:ident,) => {};
    (@entries $fields:ident, field $key:literal : $fty:ty) => {
        $crate::reflect_object!(@field $fields, $key, $fty);
    };
    (@entries $fields:ident, field $key:literal : $fty:ty, $($rest:tt)*) => {
        $crate::reflect_object!(@field $fields, $key, $fty);
        $crate::reflect_object!(@entries $fields, $($rest)*);
    };
    (@entries $fields:ident, embed $key:literal : $fty:ty) => {
        $crate::reflect_object!(@embed $fields, ($key).to_string(), $fty);
    };
    (@entries $fields:ident, embed $key:literal : $fty:ty, $($rest:tt)*) => {
        $crate::reflect_object!(@embed $fields, ($key).to_string(), $fty);
        $crate::reflect_object!(@entries $fields, $($rest)*);
    };
    (@entries $fields:ident, embed $fty:ty) => {
        $crate::reflect_object!(
            @embed $fields,
            $crate::schema::short_type_name::<$fty>().to_string(),
            $fty
        );
    };
    (@entries $fields:ident, embed $fty:ty, $($rest:tt)*) => {
        $crate::reflect_object!(
            @embed $fields,
            $crate::schema::short_type_name::<$fty>().to_string(),
            $fty
        );
        $crate::reflect_object!(@entries $fields, $($rest)*);
    };

    (@field $fields:ident, $key:literal, $fty:ty) => {
        $fields.insert(
            ($key).to_string(),
            <$fty as $crate::schema::Reflect>::descriptor()?,
        );
    };
    (@embed $fields:ident, $key:expr, $fty:ty) => {
        match <$fty as $crate::schema::Reflect>::descriptor()? {
            $crate::schema::TypeDescriptor::Object(inner) => {
                for (k, v) in inner {
                    $fields.insert(k, v);
                }
            }
            other => {
                $fields.insert($key, other);
            }
        }
    };
}
