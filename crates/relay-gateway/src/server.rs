//! The gateway itself: an axum handler implementing the request pipeline.
//!
//! Per request: CORS / method / codec preflight, envelope decode, routing
//! by service prefix, per-call host resolution, hook interposition,
//! re-encoding of the outgoing envelope, dispatch, and re-framing of the
//! backend reply through the original codec request.
//!
//! Backend rediscovery is owned by the handler rather than a dedicated
//! worker: each invocation polls a lock-free deadline and, when due, spawns
//! a one-shot refresh task.  An otherwise-idle gateway makes no background
//! requests.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::header::{HeaderMap, CONTENT_TYPE, ORIGIN};
use http::{HeaderValue, Method as HttpMethod, StatusCode};
use regex::Regex;
use relay_kernel::codec::json::{JsonCodec, JSON_CONTENT_TYPE};
use relay_kernel::codec::{Codec, CodecRequest, FramedResponse};
use relay_kernel::rpc::ErrorObject;
use relay_kernel::schema::{Method, ServiceList, TypeDescriptor};
use relay_kernel::INTROSPECTION_METHOD;
use reqwest::{Client, Url};
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::context::RpcContext;
use crate::error::GatewayError;
use crate::forward::{ForwardRequest, Forwarder, HttpForwarder};
use crate::hook::RequestHook;
use crate::registry::{LookupError, RegistryEntry, ServiceRegistry};
use crate::resolve::{PassthroughResolver, SrvResolver, TargetResolver};

/// How often the registry is opportunistically rediscovered.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// The federation gateway.
///
/// Configure with the `with_*` builders before sharing it in an `Arc`;
/// the codec map and hook are immutable at steady state, only the service
/// registry mutates once requests are flowing.
///
/// ```rust,no_run
/// use relay_gateway::{Gateway, JsonCodec};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let gateway = Arc::new(
///         Gateway::new().with_codec("application/json", JsonCodec::new()),
///     );
///     gateway.add_url("127.0.0.1:8887").await.unwrap();
///     gateway.start("0.0.0.0:8886".parse().unwrap()).await.unwrap();
/// }
/// ```
pub struct Gateway {
    registry: ServiceRegistry,
    codecs: HashMap<String, Arc<dyn Codec>>,
    resolver: Arc<dyn TargetResolver>,
    forwarder: Arc<dyn Forwarder>,
    fallback: Option<Arc<dyn Forwarder>>,
    hook: Option<Arc<dyn RequestHook>>,
    cors: Option<Regex>,
    http: Client,
    introspection: JsonCodec,
    refresh: RefreshClock,
}

impl Gateway {
    /// A gateway with no codecs, no hook, and no backup handler.
    ///
    /// SRV resolution uses the system resolver configuration; when that
    /// cannot be loaded the gateway falls back to plain hostnames and says
    /// so in the log.
    pub fn new() -> Self {
        let resolver: Arc<dyn TargetResolver> = match SrvResolver::from_system_conf() {
            Ok(resolver) => Arc::new(resolver),
            Err(err) => {
                warn!(error = %err, "srv resolution disabled: system resolver unavailable");
                Arc::new(PassthroughResolver)
            }
        };
        Self {
            registry: ServiceRegistry::new(),
            codecs: HashMap::new(),
            resolver,
            forwarder: Arc::new(HttpForwarder::new()),
            fallback: None,
            hook: None,
            cors: None,
            http: Client::new(),
            introspection: JsonCodec::new(),
            refresh: RefreshClock::new(DEFAULT_REFRESH_INTERVAL),
        }
    }

    /// Builder: register a codec under a content-type (lowercased).
    pub fn with_codec(mut self, content_type: &str, codec: impl Codec + 'static) -> Self {
        self.codecs
            .insert(content_type.to_ascii_lowercase(), Arc::new(codec));
        self
    }

    /// Builder: install the per-request hook.
    pub fn with_hook(mut self, hook: impl RequestHook + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Builder: install a backup handler for methods unknown to the
    /// registry.
    pub fn with_fallback(mut self, fallback: impl Forwarder + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Builder: origins matching `pattern` get CORS headers echoed back.
    pub fn with_cors_origin(mut self, pattern: Regex) -> Self {
        self.cors = Some(pattern);
        self
    }

    /// Builder: replace the backend host resolver.
    pub fn with_resolver(mut self, resolver: impl TargetResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Builder: replace the remote forwarder.
    pub fn with_forwarder(mut self, forwarder: impl Forwarder + 'static) -> Self {
        self.forwarder = Arc::new(forwarder);
        self
    }

    /// Builder: change the rediscovery cadence.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh = RefreshClock::new(interval);
        self
    }

    /// The gateway's view of discovered services.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    // ── Discovery ──────────────────────────────────────────────────────────

    /// Fetch the introspection schema from `url` and register every
    /// returned service, overwriting same-named entries.
    ///
    /// `http://` is assumed when no scheme is given.  The host is resolved
    /// SRV-first for this fetch; the registry keeps the original URL so the
    /// periodic refresh (and every forwarded call) re-resolves.
    pub async fn add_url(&self, url: &str) -> Result<(), GatewayError> {
        let with_scheme = if url.starts_with("http") {
            url.to_string()
        } else {
            format!("http://{url}")
        };
        let parsed =
            Url::parse(&with_scheme).map_err(|_| GatewayError::InvalidUrl(url.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| GatewayError::InvalidUrl(url.to_string()))?
            .to_string();

        let authority = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };
        let (resolved, via_srv) = self.resolver.resolve(&authority).await;

        let mut fetch_url = parsed.clone();
        set_authority(&mut fetch_url, &resolved)?;
        debug!(original = %with_scheme, resolved = %fetch_url, "resolved add url");

        let services = self.discover(&fetch_url).await?;
        for service in &services {
            for method in service.methods.keys() {
                debug!(service = %service.name, method = %method, "adding method");
            }
        }
        self.registry
            .insert_all(services, &parsed, &with_scheme, via_srv);
        Ok(())
    }

    /// One introspection fetch: a JSON-RPC `RPC.GetServices` call.
    async fn discover(
        &self,
        url: &Url,
    ) -> Result<Vec<relay_kernel::schema::Service>, GatewayError> {
        let params = RawValue::from_string("{}".to_string())?;
        let body = self
            .introspection
            .encode_client(INTROSPECTION_METHOD, Some(&params))
            .map_err(GatewayError::Rpc)?;

        let response = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::Discovery {
                url: url.to_string(),
                source: e,
            })?;
        if !response.status().is_success() {
            return Err(GatewayError::UpstreamStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|e| GatewayError::Discovery {
            url: url.to_string(),
            source: e,
        })?;

        let result = self.introspection.decode_reply(&bytes).map_err(GatewayError::Rpc)?;
        let list: ServiceList = serde_json::from_str(result.get())?;
        Ok(list.services)
    }

    async fn refresh_all(self: Arc<Self>) {
        debug!("refreshing backend services");
        for url in self.registry.original_urls() {
            if let Err(err) = self.add_url(&url).await {
                warn!(url = %url, error = %err, "backend refresh failed");
            }
        }
    }

    // ── Serving ────────────────────────────────────────────────────────────

    /// Build the axum router without binding a socket.
    ///
    /// Useful for tests that want to drive the gateway via `axum::serve`
    /// on an ephemeral listener.
    pub fn build_router(self: Arc<Self>) -> Router {
        Router::new().fallback(handle).with_state(self)
    }

    /// Bind `addr` and serve until the process exits.
    pub async fn start(self: Arc<Self>, addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "relay gateway listening");
        axum::serve(listener, self.build_router()).await
    }

    fn matched_origin(&self, headers: &HeaderMap) -> Option<String> {
        let origin = headers.get(ORIGIN)?.to_str().ok()?;
        let pattern = self.cors.as_ref()?;
        pattern.is_match(origin).then(|| origin.to_string())
    }

    fn select_codec(&self, content_type: Option<&str>) -> Option<Arc<dyn Codec>> {
        let normalized = content_type.map(normalize_content_type).unwrap_or_default();
        if normalized.is_empty() && self.codecs.len() == 1 {
            return self.codecs.values().next().cloned();
        }
        self.codecs.get(&normalized).cloned()
    }

    /// The URL one forwarded call should target: the entry's URL with the
    /// host re-resolved now, so SRV-discovered backends load-balance per
    /// call.  The registry entry itself is never touched.
    async fn per_call_url(&self, entry: &RegistryEntry) -> Url {
        let host = entry.url.host_str().unwrap_or_default();
        let authority = match entry.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let (resolved, _) = self.resolver.resolve(&authority).await;

        let mut url = entry.url.clone();
        if let Err(err) = set_authority(&mut url, &resolved) {
            warn!(url = %entry.url, error = %err, "resolved host unusable, using original");
            return entry.url.clone();
        }
        url
    }

    #[instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
    async fn dispatch(&self, req: Request) -> Response {
        // OPTIONS terminates here so preflighted requests get the CORS
        // headers attached by the caller.
        if req.method() == HttpMethod::OPTIONS {
            return StatusCode::OK.into_response();
        }
        if req.method() != HttpMethod::POST {
            warn!(method = %req.method(), "invalid http method");
            return plain(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("rpc: POST method required, received {:?}", req.method().as_str()),
            );
        }

        let (parts, body) = req.into_parts();
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let Some(codec) = self.select_codec(content_type) else {
            warn!(content_type = ?content_type, "unknown content-type");
            return plain(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!(
                    "rpc: unrecognized Content-Type: {:?}",
                    content_type.unwrap_or_default()
                ),
            );
        };

        let bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(err) => {
                return plain(
                    StatusCode::BAD_REQUEST,
                    format!("rpc: failed reading request body: {err}"),
                )
            }
        };
        let codec_req = codec.request(bytes);

        let method = match codec_req.method() {
            Ok(method) => method,
            Err(err) => {
                warn!(error = %err, "error retrieving method from codec");
                return framed(codec_req.frame_error(400, err));
            }
        };
        debug!(method = %method, "received method call");

        let (forwarder, route): (Arc<dyn Forwarder>, _) = match self.registry.lookup(&method) {
            Ok(route) => (self.forwarder.clone(), Some(route)),
            Err(err @ LookupError::IllFormed(_)) => {
                warn!(method = %method, "ill-formed method string");
                return framed(
                    codec_req.frame_error(400, ErrorObject::invalid_request(err.to_string())),
                );
            }
            Err(err) => match &self.fallback {
                Some(backup) => (backup.clone(), None),
                None => {
                    warn!(method = %method, error = %err, "unroutable method");
                    return framed(
                        codec_req.frame_error(400, ErrorObject::method_not_found(err.to_string())),
                    );
                }
            },
        };

        let url = match &route {
            Some(route) => Some(self.per_call_url(&route.entry).await),
            None => None,
        };
        let (service_name, method_record) = match route {
            Some(route) => (route.entry.service.name.clone(), route.method),
            // Backup-handler requests have no schema record.
            None => (
                String::new(),
                Method {
                    name: String::new(),
                    args: TypeDescriptor::empty_object(),
                    returns: TypeDescriptor::empty_object(),
                },
            ),
        };

        let mut ctx = RpcContext::new(service_name, method_record, method, codec.clone(), codec_req);

        if let Some(hook) = &self.hook {
            hook.on_request(&mut ctx).await;
            if ctx.responded() {
                return match ctx.take_response() {
                    Some(response) => framed(response),
                    None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                };
            }
        }

        // The codec request consumed the original body; re-encode from the
        // effective method and arguments.
        let body = match ctx.client_request() {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "error encoding request to remote service");
                return framed(ctx.frame_error(500, err));
            }
        };

        let reply = forwarder
            .forward(ForwardRequest {
                url,
                content_type: codec.content_type().to_string(),
                headers: parts.headers,
                body,
            })
            .await;
        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                error!(error = %err, "error forwarding request");
                return framed(ctx.frame_error(500, ErrorObject::server(err.to_string())));
            }
        };

        // The reply is a full envelope in the upstream's framing; re-emit
        // it through the original codec request so the framing matches what
        // the client sent.
        match codec.decode_reply(&reply.body) {
            Ok(result) => framed(ctx.frame_response(&result)),
            Err(err) => framed(ctx.frame_error(reply.status, err)),
        }
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

async fn handle(State(gateway): State<Arc<Gateway>>, req: Request) -> Response {
    // Opportunistic rediscovery, detached from this request.
    if gateway.refresh.poll() {
        tokio::spawn(gateway.clone().refresh_all());
    }

    let origin = gateway.matched_origin(req.headers());
    let response = gateway.dispatch(req).await;
    apply_cors(response, origin)
}

// ─────────────────────────────────────────────────────────────────────────────
// Response plumbing
// ─────────────────────────────────────────────────────────────────────────────

fn framed(response: FramedResponse) -> Response {
    Response::builder()
        .status(response.status)
        .header(CONTENT_TYPE, response.content_type)
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn plain(status: StatusCode, message: String) -> Response {
    (
        status,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        message,
    )
        .into_response()
}

fn apply_cors(mut response: Response, origin: Option<String>) -> Response {
    let Some(origin) = origin else {
        return response;
    };
    let Ok(origin) = HeaderValue::from_str(&origin) else {
        return response;
    };
    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", origin);
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-credentials",
        HeaderValue::from_static("true"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("DNT, User-Agent, X-Requested-With, Content-Type"),
    );
    response
}

fn normalize_content_type(raw: &str) -> String {
    let base = raw.split(';').next().unwrap_or(raw);
    base.trim().to_ascii_lowercase()
}

fn set_authority(url: &mut Url, authority: &str) -> Result<(), GatewayError> {
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| GatewayError::InvalidUrl(authority.to_string()))?;
            (host, Some(port))
        }
        None => (authority, None),
    };
    url.set_host(Some(host))
        .map_err(|_| GatewayError::InvalidUrl(authority.to_string()))?;
    if let Some(port) = port {
        url.set_port(Some(port))
            .map_err(|_| GatewayError::InvalidUrl(authority.to_string()))?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh clock
// ─────────────────────────────────────────────────────────────────────────────

/// Lock-free refresh deadline.
///
/// `poll()` is called at the top of every handler invocation; it returns
/// `true` to exactly one caller per elapsed period (compare-exchange on the
/// deadline), which then owns spawning the refresh task.
struct RefreshClock {
    origin: Instant,
    period_ms: u64,
    next_ms: AtomicU64,
}

impl RefreshClock {
    fn new(period: Duration) -> Self {
        let period_ms = period.as_millis() as u64;
        Self {
            origin: Instant::now(),
            period_ms,
            next_ms: AtomicU64::new(period_ms),
        }
    }

    fn poll(&self) -> bool {
        let now = self.origin.elapsed().as_millis() as u64;
        let due = self.next_ms.load(Ordering::Relaxed);
        now >= due
            && self
                .next_ms
                .compare_exchange(due, now + self.period_ms, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
    }
}
