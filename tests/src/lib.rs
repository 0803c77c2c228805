//! Relay test support.
//!
//! Provides the fixture services and harness helpers the end-to-end tests
//! use: deterministic RPC endpoints with known schemas, ephemeral-port
//! spawn helpers, a JSON-RPC test client, and in-process adapters for the
//! gateway's pluggable seams.

pub mod endpoints;
pub mod harness;

pub use endpoints::{
    bar_args_type, foo_args_type, foo_res_type, test_endpoint, BarArgs, BazArgs, FooAnonRes,
    FooArgs, FooRes, TestEndpoint,
};
pub use harness::{
    call, call_ok, call_raw, spawn_gateway, spawn_rpc_server, LocalBackup, StaticResolver,
};
