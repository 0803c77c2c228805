//! Fixture services with known schemas.
//!
//! `TestEndpoint` exercises every descriptor shape: plain objects, arrays,
//! string-keyed maps of dynamic values, and both embedded-field behaviors
//! (an embedded object flattens over its tag, a named field keeps its key).

use relay_kernel::reflect_object;
use relay_kernel::schema::{Empty, ScalarKind, TypeDescriptor};
use relay_server::ServiceBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Receiver type for the main fixture service.
pub struct TestEndpoint;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FooArgs {
    pub a: i64,
    pub b: String,
}
reflect_object!(FooArgs {
    field "a": i64,
    field "b": String,
});

/// Reply with the arguments under a named `args` field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FooRes {
    pub args: FooArgs,
}
reflect_object!(FooRes {
    field "args": FooArgs,
});

/// Reply with the arguments *embedded* under an `args` tag.
///
/// On the wire this serializes under `"args"`, but its schema flattens to
/// `FooArgs`' fields — embedding wins over the tag when the embedded walk
/// is an object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FooAnonRes {
    #[serde(rename = "args")]
    pub args: FooArgs,
}
reflect_object!(FooAnonRes {
    embed "args": FooArgs,
});

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BazArgs {
    pub aa: i64,
}
reflect_object!(BazArgs {
    field "aa": i64,
});

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BarArgs {
    pub a: i64,
    pub b: Vec<i64>,
    pub c: Vec<FooArgs>,
    pub d: HashMap<String, Value>,
    #[serde(flatten)]
    pub baz: BazArgs,
}
reflect_object!(BarArgs {
    field "a": i64,
    field "b": Vec<i64>,
    field "c": Vec<FooArgs>,
    field "d": HashMap<String, Value>,
    embed BazArgs,
});

/// The fixture service: `Foo` echoes its arguments, `Bar` accepts the
/// composite argument shape and returns nothing, `FooAnon` returns the
/// embedded-reply shape.
pub fn test_endpoint() -> ServiceBuilder {
    ServiceBuilder::of::<TestEndpoint>()
        .expect("TestEndpoint is exported")
        .method("Foo", |_head, args: FooArgs| async move {
            Ok(FooRes { args })
        })
        .expect("Foo registers")
        .method("Bar", |_head, _args: BarArgs| async move { Ok(Empty {}) })
        .expect("Bar registers")
        .method("FooAnon", |_head, args: FooArgs| async move {
            Ok(FooAnonRes { args })
        })
        .expect("FooAnon registers")
}

// ── Expected descriptors ───────────────────────────────────────────────────

pub fn foo_args_type() -> TypeDescriptor {
    TypeDescriptor::object([
        ("a", TypeDescriptor::scalar(ScalarKind::Int64)),
        ("b", TypeDescriptor::scalar(ScalarKind::String)),
    ])
}

pub fn foo_res_type() -> TypeDescriptor {
    TypeDescriptor::object([("args", foo_args_type())])
}

pub fn bar_args_type() -> TypeDescriptor {
    TypeDescriptor::object([
        ("a", TypeDescriptor::scalar(ScalarKind::Int64)),
        (
            "b",
            TypeDescriptor::array(TypeDescriptor::scalar(ScalarKind::Int64)),
        ),
        ("c", TypeDescriptor::array(foo_args_type())),
        ("d", TypeDescriptor::map(TypeDescriptor::scalar(ScalarKind::Any))),
        ("aa", TypeDescriptor::scalar(ScalarKind::Int64)),
    ])
}
