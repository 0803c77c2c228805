//! Kernel contracts for the relay federation gateway.
//!
//! This crate defines the *trait interfaces and pure data types* shared by
//! the relay runtime crates.  No I/O lives here — concrete implementations
//! belong in `relay-gateway` (routing runtime) and `relay-server`
//! (producer-side introspection server).
//!
//! # Architecture mapping
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              relay-kernel  (this crate)                     │
//! │  TypeDescriptor / Service / Method    Reflect trait         │
//! │  Codec + CodecRequest traits          JSON-RPC envelope     │
//! │  FramedResponse                       SchemaError           │
//! └──────────────┬───────────────────────────────┬──────────────┘
//! │              │ depends on                    │ depends on
//! ┌──────────────▼──────────────┐ ┌──────────────▼──────────────┐
//! │  relay-gateway (runtime)    │ │  relay-server (producer)    │
//! │  JsonCodec, ServiceRegistry │ │  RpcServer, ServiceBuilder  │
//! │  SrvResolver, RpcContext    │ │  RPC.GetServices            │
//! │  Gateway (axum handler)     │ │  typed method dispatch      │
//! └─────────────────────────────┘ └─────────────────────────────┘
//! ```

pub mod codec;
pub mod error;
pub mod rpc;
pub mod schema;

// ── Flat re-exports ────────────────────────────────────────────────────────

pub use codec::json::{JsonCodec, JSON_CONTENT_TYPE};
pub use codec::{Codec, CodecRequest, FramedResponse};
pub use error::SchemaError;
pub use rpc::{ErrorObject, RequestEnvelope, RequestId, ResponseEnvelope};
pub use schema::{Empty, Method, Reflect, ScalarKind, Service, ServiceList, TypeDescriptor};

/// The distinguished introspection method every relay server answers.
pub const INTROSPECTION_METHOD: &str = "RPC.GetServices";
