//! JSON-RPC 2.0 codec.
//!
//! [`JsonCodec`] is the one codec that ships with relay.  It is registered
//! under `application/json` in the common case, but the registration key is
//! up to the caller — the codec itself only knows how to parse and frame
//! JSON-RPC 2.0 envelopes.

use bytes::Bytes;
use crate::codec::{Codec, CodecRequest, FramedResponse};
use crate::rpc::{self, ErrorObject, RequestEnvelope, RequestId, ResponseEnvelope};
use serde_json::value::RawValue;
use std::sync::atomic::{AtomicI64, Ordering};

/// The content-type stamped on responses framed by [`JsonCodec`].
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// JSON-RPC 2.0 over JSON bodies.
///
/// Outgoing client envelopes get a monotonically increasing numeric id —
/// the gateway reconstructs upstream envelopes rather than passing the
/// caller's bytes through, so upstream ids are unrelated to client ids.
#[derive(Debug, Default)]
pub struct JsonCodec {
    next_id: AtomicI64,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Codec for JsonCodec {
    fn content_type(&self) -> &str {
        JSON_CONTENT_TYPE
    }

    fn request(&self, body: Bytes) -> Box<dyn CodecRequest> {
        Box::new(JsonCodecRequest::parse(&body))
    }

    fn encode_client(
        &self,
        method: &str,
        params: Option<&RawValue>,
    ) -> Result<Vec<u8>, ErrorObject> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope =
            RequestEnvelope::client(method, params.map(RawValue::to_owned), RequestId::Number(id));
        serde_json::to_vec(&envelope).map_err(|e| ErrorObject::internal(e.to_string()))
    }

    fn decode_reply(&self, body: &[u8]) -> Result<Box<RawValue>, ErrorObject> {
        let envelope: ResponseEnvelope = serde_json::from_slice(body)
            .map_err(|e| ErrorObject::parse_error(format!("invalid reply envelope: {e}")))?;
        envelope.into_result()
    }
}

/// One parsed JSON-RPC request.  Holds the parse outcome so a malformed
/// body can still be answered in proper framing, and remembers the caller's
/// id for the reply.
struct JsonCodecRequest {
    parsed: Result<RequestEnvelope, ErrorObject>,
}

impl JsonCodecRequest {
    fn parse(body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<RequestEnvelope>(body)
            .map_err(|e| ErrorObject::parse_error(e.to_string()))
            .and_then(|envelope| {
                if envelope.jsonrpc != rpc::VERSION {
                    Err(ErrorObject::invalid_request(format!(
                        "jsonrpc version must be {:?}, got {:?}",
                        rpc::VERSION,
                        envelope.jsonrpc
                    )))
                } else {
                    Ok(envelope)
                }
            });
        Self { parsed }
    }

    fn id(&self) -> Option<RequestId> {
        self.parsed.as_ref().ok().and_then(|e| e.id.clone())
    }

    fn frame(&self, status: u16, envelope: &ResponseEnvelope) -> FramedResponse {
        let body = serde_json::to_vec(envelope).unwrap_or_else(|_| {
            br#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"encoding failure"},"id":null}"#
                .to_vec()
        });
        FramedResponse {
            status,
            content_type: JSON_CONTENT_TYPE.to_string(),
            body,
        }
    }
}

impl CodecRequest for JsonCodecRequest {
    fn method(&self) -> Result<String, ErrorObject> {
        match &self.parsed {
            Ok(envelope) => Ok(envelope.method.clone()),
            Err(err) => Err(err.clone()),
        }
    }

    fn params_raw(&self) -> Option<&RawValue> {
        self.parsed.as_ref().ok().and_then(|e| e.params.as_deref())
    }

    fn frame_response(&self, result: &RawValue) -> FramedResponse {
        self.frame(200, &ResponseEnvelope::result(result.to_owned(), self.id()))
    }

    fn frame_error(&self, status: u16, error: ErrorObject) -> FramedResponse {
        self.frame(status, &ResponseEnvelope::error(error, self.id()))
    }
}
