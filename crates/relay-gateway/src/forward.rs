//! Upstream dispatch.
//!
//! After the hook has run, the gateway has a freshly encoded client
//! envelope and a target.  Both targets — the remote backend and the
//! configured backup handler — implement [`Forwarder`], so the dispatch
//! step is uniform; [`HttpForwarder`] is the remote implementation.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, CONTENT_TYPE, HOST};
use reqwest::{Client, Url};
use std::time::Instant;
use tracing::{debug, instrument};

use crate::error::GatewayError;

/// The re-framed request handed to the chosen target.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    /// Resolved backend URL; `None` when the target is the backup handler.
    pub url: Option<Url>,
    /// Content-type of the encoded envelope.
    pub content_type: String,
    /// Headers of the original client request (minus hop-specific ones).
    pub headers: HeaderMap,
    /// The freshly encoded client envelope.
    pub body: Vec<u8>,
}

/// What came back from a target: a full reply envelope, still framed in the
/// upstream's encoding.
#[derive(Debug, Clone)]
pub struct ForwardReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// A dispatch target for re-framed requests.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, request: ForwardRequest) -> Result<ForwardReply, GatewayError>;
}

/// Forwards to a remote backend over plain HTTP POST.
///
/// The original request's headers ride along (minus `Host` and
/// `Content-Length`, which the client recomputes) so credentials and
/// correlation headers survive the hop; the body and `Content-Type` are the
/// re-encoded envelope's.
pub struct HttpForwarder {
    client: Client,
}

impl HttpForwarder {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpForwarder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    #[instrument(skip(self, request), fields(url = ?request.url))]
    async fn forward(&self, request: ForwardRequest) -> Result<ForwardReply, GatewayError> {
        let url = request
            .url
            .ok_or_else(|| GatewayError::Internal("forward request has no resolved url".into()))?;

        let mut builder = self.client.post(url.clone());
        for (name, value) in &request.headers {
            if *name == HOST || *name == http::header::CONTENT_LENGTH || *name == CONTENT_TYPE {
                continue;
            }
            builder = builder.header(name, value);
        }
        builder = builder
            .header(CONTENT_TYPE, request.content_type.as_str())
            .body(request.body);

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| GatewayError::Network {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await.map_err(|e| GatewayError::Network {
            url: url.to_string(),
            source: e,
        })?;

        debug!(
            status = status,
            elapsed_ms = %start.elapsed().as_millis(),
            "forwarded to backend"
        );
        Ok(ForwardReply {
            status,
            content_type,
            body,
        })
    }
}
