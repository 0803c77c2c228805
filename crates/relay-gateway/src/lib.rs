//! relay-gateway — dynamic JSON-RPC 2.0 reverse proxy.
//!
//! The gateway discovers backend services through their introspection
//! endpoint (`RPC.GetServices`), routes incoming calls by the service
//! prefix of their method name, re-resolves backend hosts per call (SRV
//! first, plain DNS as the fallback), and lets a user-supplied
//! [`RequestHook`] inspect, mutate, short-circuit, or pass through each
//! request before it is re-encoded and forwarded.
//!
//! # Example
//!
//! ```rust,no_run
//! use relay_gateway::{Gateway, JsonCodec};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = Arc::new(
//!         Gateway::new().with_codec("application/json", JsonCodec::new()),
//!     );
//!     gateway.add_url("127.0.0.1:8887").await.expect("backend discovery");
//!     gateway
//!         .start("0.0.0.0:8886".parse().unwrap())
//!         .await
//!         .expect("serve");
//! }
//! ```

pub mod context;
pub mod error;
pub mod forward;
pub mod hook;
pub mod registry;
pub mod resolve;
pub mod server;

pub use context::RpcContext;
pub use relay_kernel::codec::json::{JsonCodec, JSON_CONTENT_TYPE};
pub use error::GatewayError;
pub use forward::{ForwardReply, ForwardRequest, Forwarder, HttpForwarder};
pub use hook::RequestHook;
pub use registry::{LookupError, RegistryEntry, RouteTarget, ServiceRegistry};
pub use resolve::{PassthroughResolver, SrvResolver, TargetResolver};
pub use server::{Gateway, DEFAULT_REFRESH_INTERVAL};
