//! relay gateway — entry point.
//!
//! Reads configuration from environment variables and starts the axum-based
//! JSON-RPC gateway.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_LISTEN_ADDR` | `0.0.0.0:8886` | Address to listen on. |
//! | `RELAY_BACKEND_URLS` | *(none)* | Comma-separated backend URLs to discover at startup. |
//! | `RELAY_CORS_ORIGIN` | *(none)* | Regex matched against the `Origin` header. |
//! | `RELAY_REFRESH_SECS` | `30` | Backend rediscovery interval in seconds. |

use regex::Regex;
use relay_gateway::{Gateway, JsonCodec};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("relay_gateway=info".parse().unwrap()),
        )
        .init();

    let listen_addr: SocketAddr = std::env::var("RELAY_LISTEN_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8886)));

    let backend_urls: Vec<String> = std::env::var("RELAY_BACKEND_URLS")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .collect();

    let refresh_secs: u64 = std::env::var("RELAY_REFRESH_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);

    let mut gateway = Gateway::new()
        .with_codec("application/json", JsonCodec::new())
        .with_refresh_interval(Duration::from_secs(refresh_secs));

    if let Ok(pattern) = std::env::var("RELAY_CORS_ORIGIN") {
        match Regex::new(&pattern) {
            Ok(regex) => gateway = gateway.with_cors_origin(regex),
            Err(err) => {
                eprintln!("RELAY_CORS_ORIGIN is not a valid regex: {err}");
                std::process::exit(1);
            }
        }
    }

    if backend_urls.is_empty() {
        tracing::warn!(
            "RELAY_BACKEND_URLS is not set — the gateway starts with an empty registry."
        );
    }

    let gateway = Arc::new(gateway);
    for url in &backend_urls {
        if let Err(err) = gateway.add_url(url).await {
            error!(url = %url, error = %err, "backend discovery failed");
            std::process::exit(1);
        }
    }

    info!(
        listen = %listen_addr,
        backends = backend_urls.len(),
        refresh_secs = refresh_secs,
        "relay gateway configuration loaded"
    );

    if let Err(err) = gateway.start(listen_addr).await {
        eprintln!("gateway error: {err}");
        std::process::exit(1);
    }
}
