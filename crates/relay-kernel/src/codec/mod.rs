//! Codec contract.
//!
//! A codec pairs an envelope decoder with the matching response framing and
//! is selected per-request by HTTP `Content-Type`.  The traits here are
//! object-safe — params and results travel as raw bytes — so the gateway can
//! hold codecs behind trait objects and register additional envelope formats
//! without touching the routing pipeline.  The JSON-RPC 2.0 implementation
//! both runtime crates share lives in [`json`].

pub mod json;

use crate::rpc::ErrorObject;
use bytes::Bytes;
use serde_json::value::RawValue;

/// A transport-agnostic response: what a codec framed for the client.
#[derive(Debug, Clone, PartialEq)]
pub struct FramedResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` the body is framed in.
    pub content_type: String,
    /// Framed body bytes.
    pub body: Vec<u8>,
}

/// An envelope codec, registered under a lowercased content-type.
pub trait Codec: Send + Sync {
    /// The content-type responses framed by this codec carry.
    fn content_type(&self) -> &str;

    /// Parse a request body.  Parsing never fails hard: a malformed body
    /// yields a [`CodecRequest`] whose `method()` reports the error, so the
    /// failure can still be framed in the caller's expected format.
    fn request(&self, body: Bytes) -> Box<dyn CodecRequest>;

    /// Encode a fresh outgoing client envelope for the given method and raw
    /// params.
    fn encode_client(
        &self,
        method: &str,
        params: Option<&RawValue>,
    ) -> Result<Vec<u8>, ErrorObject>;

    /// Decode an upstream reply envelope down to its raw result bytes,
    /// surfacing the envelope's error member as the `Err` arm.
    fn decode_reply(&self, body: &[u8]) -> Result<Box<RawValue>, ErrorObject>;
}

/// One parsed request envelope plus the framing needed to answer it.
///
/// The adaptor remembers whatever the reply framing must echo (the caller's
/// request id, for JSON-RPC), which is why responses are written *through*
/// it rather than through the codec.
pub trait CodecRequest: Send {
    /// The method named by the envelope.
    fn method(&self) -> Result<String, ErrorObject>;

    /// The raw argument bytes from the envelope, if any.
    fn params_raw(&self) -> Option<&RawValue>;

    /// Frame a success reply around the given raw result.
    fn frame_response(&self, result: &RawValue) -> FramedResponse;

    /// Frame an error reply at the given HTTP status.
    fn frame_error(&self, status: u16, error: ErrorObject) -> FramedResponse;
}
