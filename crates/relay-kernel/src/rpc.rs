//! JSON-RPC 2.0 envelope model.
//!
//! Request and reply envelopes with `params` / `result` kept as raw bytes,
//! so the gateway can hand argument payloads through untouched unless a hook
//! chooses to rewrite them.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

/// The protocol version string carried by every envelope.
pub const VERSION: &str = "2.0";

// Standard JSON-RPC 2.0 error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const SERVER_ERROR: i64 = -32000;

// ─────────────────────────────────────────────────────────────────────────────
// Error object
// ─────────────────────────────────────────────────────────────────────────────

/// The `error` member of a reply envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("jsonrpc error {code}: {message}")]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(METHOD_NOT_FOUND, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(SERVER_ERROR, message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelopes
// ─────────────────────────────────────────────────────────────────────────────

/// A request id: JSON-RPC 2.0 allows strings and numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

/// An incoming (or freshly encoded outgoing) request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Version string; must equal [`VERSION`].  Lenient on decode so the
    /// mismatch can be reported as a protocol error rather than a parse
    /// failure.
    #[serde(default)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl RequestEnvelope {
    /// Build an outgoing client request with the current version string.
    pub fn client(method: impl Into<String>, params: Option<Box<RawValue>>, id: RequestId) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }
}

/// A reply envelope: exactly one of `result` / `error` populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    /// Always serialized; `null` when the request id was absent.
    pub id: Option<RequestId>,
}

impl ResponseEnvelope {
    /// A success reply echoing the caller's id.
    pub fn result(result: Box<RawValue>, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// An error reply echoing the caller's id.
    pub fn error(error: ErrorObject, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            result: None,
            error: None,
            id,
        }
        .with_error(error)
    }

    fn with_error(mut self, error: ErrorObject) -> Self {
        self.error = Some(error);
        self
    }

    /// Collapse the reply into the raw result bytes, surfacing the error
    /// member (or a missing / null result) as an [`ErrorObject`].
    pub fn into_result(self) -> Result<Box<RawValue>, ErrorObject> {
        if let Some(err) = self.error {
            return Err(err);
        }
        match self.result {
            Some(raw) if raw.get() != "null" => Ok(raw),
            _ => Err(ErrorObject::internal("result is null")),
        }
    }
}
