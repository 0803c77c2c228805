//! relay-server — a JSON-RPC 2.0 server that publishes its own schema.
//!
//! Wraps a method table with the introspection surface the relay gateway
//! consumes: every registered service's methods and structural argument /
//! reply types are answered by the distinguished `RPC.GetServices` method.
//!
//! # Example
//!
//! ```rust,no_run
//! use relay_kernel::JsonCodec;
//! use relay_server::{RpcServer, ServiceBuilder};
//! use std::sync::Arc;
//!
//! struct Math;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut server = RpcServer::new();
//!     server.register_codec("application/json", JsonCodec::new());
//!     server.register_service(
//!         ServiceBuilder::of::<Math>()
//!             .unwrap()
//!             .method("Add", |_head, args: Vec<i64>| async move {
//!                 Ok(args.iter().sum::<i64>())
//!             })
//!             .unwrap(),
//!     );
//!     Arc::new(server)
//!         .start("0.0.0.0:8887".parse().unwrap())
//!         .await
//!         .expect("serve");
//! }
//! ```

pub mod server;
pub mod service;

pub use server::RpcServer;
pub use service::{RequestHead, ServiceBuilder};
