//! The introspection server.
//!
//! [`RpcServer`] is a JSON-RPC 2.0 method table that self-registers the
//! distinguished `RPC.GetServices` method on construction.  Every service
//! registered afterwards is appended to an ordered schema list, which is
//! exactly what `GetServices` returns — so a gateway can discover the
//! server's full method surface with one call.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method as HttpMethod, StatusCode};
use relay_kernel::codec::{Codec, CodecRequest, FramedResponse};
use relay_kernel::rpc::ErrorObject;
use relay_kernel::schema::{Service, ServiceList};
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::service::{MethodDispatcher, RequestHead, ServiceBuilder};

/// JSON-RPC server wrapper that publishes its own schema.
pub struct RpcServer {
    /// Ordered list of registered service schemas, shared with the
    /// `GetServices` dispatcher.
    services: Arc<RwLock<Vec<Service>>>,
    /// `"Service.Method"` → dispatcher.
    methods: HashMap<String, MethodDispatcher>,
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl RpcServer {
    /// A server answering only `RPC.GetServices`.
    ///
    /// The `RPC` service is the introspection surface itself and is not
    /// part of the published schema list.
    pub fn new() -> Self {
        let services: Arc<RwLock<Vec<Service>>> = Arc::new(RwLock::new(Vec::new()));

        let list = services.clone();
        let get_services: MethodDispatcher = Box::new(move |_head, _params| {
            let list = list.clone();
            Box::pin(async move {
                let services = list
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                serde_json::value::to_raw_value(&ServiceList { services })
                    .map_err(|e| ErrorObject::internal(e.to_string()))
            })
        });

        let mut methods = HashMap::new();
        methods.insert(relay_kernel::INTROSPECTION_METHOD.to_string(), get_services);

        Self {
            services,
            methods,
            codecs: HashMap::new(),
        }
    }

    /// Register a codec under a content-type (lowercased).
    pub fn register_codec(&mut self, content_type: &str, codec: impl Codec + 'static) {
        self.codecs
            .insert(content_type.to_ascii_lowercase(), Arc::new(codec));
    }

    /// Install a fully-built service: its methods become dispatchable and
    /// its schema is appended to the `GetServices` list.
    ///
    /// All validation already happened in the builder, so installation
    /// cannot fail and never leaves the server half-registered.
    pub fn register_service(&mut self, service: ServiceBuilder) {
        let ServiceBuilder { schema, handlers } = service;
        info!(service = %schema.name, methods = schema.methods.len(), "registering service");
        for (name, dispatcher) in handlers {
            self.methods
                .insert(format!("{}.{}", schema.name, name), dispatcher);
        }
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(schema);
    }

    /// Snapshot of the published schema list.
    pub fn services(&self) -> Vec<Service> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the server can dispatch `method` (`"Service.Method"`).
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Serve one request body, already stripped of its HTTP envelope.
    ///
    /// Exposed so tests and in-process callers (e.g. a gateway backup
    /// handler) can drive the server without a socket.
    pub async fn serve_bytes(
        &self,
        head: Arc<RequestHead>,
        content_type: Option<&str>,
        body: Bytes,
    ) -> FramedResponse {
        let Some(codec) = self.select_codec(content_type) else {
            warn!(content_type = ?content_type, "unknown content-type");
            return FramedResponse {
                status: 415,
                content_type: "text/plain; charset=utf-8".to_string(),
                body: format!(
                    "rpc: unrecognized Content-Type: {:?}",
                    content_type.unwrap_or_default()
                )
                .into_bytes(),
            };
        };

        let codec_req = codec.request(body);
        let method = match codec_req.method() {
            Ok(method) => method,
            Err(err) => return codec_req.frame_error(400, err),
        };
        debug!(method = %method, "received method call");

        let Some(dispatcher) = self.methods.get(&method) else {
            return codec_req.frame_error(
                400,
                ErrorObject::method_not_found(format!("rpc: can't find method {method:?}")),
            );
        };

        let params = codec_req.params_raw().map(RawValue::to_owned);
        match dispatcher(head, params).await {
            Ok(result) => codec_req.frame_response(&result),
            Err(err) => codec_req.frame_error(400, err),
        }
    }

    fn select_codec(&self, content_type: Option<&str>) -> Option<Arc<dyn Codec>> {
        let normalized = content_type
            .map(|raw| {
                raw.split(';')
                    .next()
                    .unwrap_or(raw)
                    .trim()
                    .to_ascii_lowercase()
            })
            .unwrap_or_default();
        if normalized.is_empty() && self.codecs.len() == 1 {
            return self.codecs.values().next().cloned();
        }
        self.codecs.get(&normalized).cloned()
    }

    /// Build the axum router without binding a socket.
    pub fn build_router(self: Arc<Self>) -> Router {
        Router::new().fallback(handle).with_state(self)
    }

    /// Bind `addr` and serve until the process exits.
    pub async fn start(self: Arc<Self>, addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "relay server listening");
        axum::serve(listener, self.build_router()).await
    }
}

impl Default for RpcServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn handle(State(server): State<Arc<RpcServer>>, req: Request) -> Response {
    if req.method() != HttpMethod::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("rpc: POST method required, received {:?}", req.method().as_str()),
        )
            .into_response();
    }

    let (parts, body) = req.into_parts();
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let head = Arc::new(RequestHead {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
    });

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("rpc: failed reading request body: {err}"),
            )
                .into_response()
        }
    };

    let framed = server.serve_bytes(head, content_type.as_deref(), bytes).await;
    Response::builder()
        .status(framed.status)
        .header(CONTENT_TYPE, framed.content_type)
        .body(Body::from(framed.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
