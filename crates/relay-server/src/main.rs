//! Demo arithmetic service — entry point.
//!
//! Serves a single `Math.Add` method plus the standard introspection
//! endpoint, so a relay gateway pointed at this process discovers the
//! service automatically.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_LISTEN_ADDR` | `0.0.0.0:8887` | Address to listen on. |

use relay_kernel::JsonCodec;
use relay_server::{RpcServer, ServiceBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

struct Math;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("relay_server=debug".parse().unwrap()),
        )
        .init();

    let listen_addr: SocketAddr = std::env::var("RELAY_LISTEN_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8887)));

    let math = ServiceBuilder::of::<Math>()
        .expect("Math is an exported name")
        .method("Add", |_head, args: Vec<i64>| async move {
            let sum: i64 = args.iter().sum();
            debug!(?args, sum, "Add called");
            Ok(sum)
        })
        .expect("Add registers cleanly");

    let mut server = RpcServer::new();
    server.register_codec("application/json", JsonCodec::new());
    server.register_service(math);

    if let Err(err) = Arc::new(server).start(listen_addr).await {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}
