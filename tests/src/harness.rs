//! Spawn helpers, a JSON-RPC test client, and in-process seam adapters.

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method as HttpMethod, Uri};
use relay_gateway::{
    ForwardReply, ForwardRequest, Forwarder, Gateway, GatewayError, TargetResolver,
};
use relay_kernel::rpc::{ErrorObject, ResponseEnvelope};
use relay_server::{RequestHead, RpcServer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serve an [`RpcServer`] on an ephemeral port; returns its base URL.
pub async fn spawn_rpc_server(server: RpcServer) -> String {
    let server = Arc::new(server);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let router = server.build_router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve rpc server");
    });
    format!("http://{addr}")
}

/// Serve a configured [`Gateway`] on an ephemeral port; returns its base
/// URL and the gateway handle (for registry assertions).
pub async fn spawn_gateway(gateway: Gateway) -> (String, Arc<Gateway>) {
    let gateway = Arc::new(gateway);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let router = gateway.clone().build_router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve gateway");
    });
    (format!("http://{addr}"), gateway)
}

/// One JSON-RPC call; panics unless the reply is a success envelope.
pub async fn call_ok<A: Serialize, R: DeserializeOwned>(url: &str, method: &str, args: &A) -> R {
    match call(url, method, args).await {
        Ok(reply) => reply,
        Err((status, err)) => panic!("rpc call {method} failed with HTTP {status}: {err}"),
    }
}

/// One JSON-RPC call, surfacing the envelope error and HTTP status.
pub async fn call<A: Serialize, R: DeserializeOwned>(
    url: &str,
    method: &str,
    args: &A,
) -> Result<R, (u16, ErrorObject)> {
    let body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": args,
        "id": 1,
    });
    let response = reqwest::Client::new()
        .post(url)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .expect("http send");
    let status = response.status().as_u16();
    let envelope: ResponseEnvelope = response.json().await.expect("reply envelope");
    match envelope.into_result() {
        Ok(raw) => Ok(serde_json::from_str(raw.get()).expect("typed result")),
        Err(err) => Err((status, err)),
    }
}

/// One raw HTTP POST of a JSON body; returns status and parsed reply body.
pub async fn call_raw(url: &str, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .expect("http send");
    let status = response.status().as_u16();
    let body: Value = response.json().await.expect("json body");
    (status, body)
}

/// Backup handler that dispatches into an in-process [`RpcServer`],
/// mirroring a deployment where the gateway itself hosts a handful of
/// methods.
pub struct LocalBackup(pub Arc<RpcServer>);

#[async_trait]
impl Forwarder for LocalBackup {
    async fn forward(&self, request: ForwardRequest) -> Result<ForwardReply, GatewayError> {
        let head = Arc::new(RequestHead {
            method: HttpMethod::POST,
            uri: Uri::from_static("/"),
            headers: request.headers.clone(),
        });
        let framed = self
            .0
            .serve_bytes(
                head,
                Some(request.content_type.as_str()),
                Bytes::from(request.body),
            )
            .await;
        Ok(ForwardReply {
            status: framed.status,
            content_type: Some(framed.content_type),
            body: Bytes::from(framed.body),
        })
    }
}

/// Deterministic resolver: a fixed host → authority table, with a hit
/// counter so tests can assert per-call re-resolution.
#[derive(Default)]
pub struct StaticResolver {
    targets: HashMap<String, String>,
    hits: std::sync::atomic::AtomicUsize,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, host: &str, authority: &str) -> Self {
        self.targets.insert(host.to_string(), authority.to_string());
        self
    }

    pub fn hits(&self) -> usize {
        self.hits.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[async_trait]
impl TargetResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> (String, bool) {
        self.hits
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        match self.targets.get(host) {
            Some(target) => (target.clone(), true),
            None => (host.to_string(), false),
        }
    }
}
