//! Per-request context handed to the request hook.
//!
//! An [`RpcContext`] exists for the duration of one HTTP exchange and is
//! owned by that request's task; hooks receive `&mut` access and must not
//! retain it past their return.  It offers the read / mutate / respond
//! operations a hook needs, and latches a `responded` flag when the hook
//! writes a terminal response — the gateway checks the flag after the hook
//! returns and skips forwarding when it is set.

use relay_kernel::codec::{Codec, CodecRequest, FramedResponse};
use relay_kernel::rpc::ErrorObject;
use relay_kernel::schema::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use std::sync::Arc;

/// All currently-known data about one in-flight request.
pub struct RpcContext {
    service_name: String,
    method_record: Method,
    original_method: String,

    codec: Arc<dyn Codec>,
    codec_req: Box<dyn CodecRequest>,

    new_method: Option<String>,
    args: Option<Box<RawValue>>,
    response: Option<FramedResponse>,
    responded: bool,
}

impl RpcContext {
    pub(crate) fn new(
        service_name: impl Into<String>,
        method_record: Method,
        original_method: impl Into<String>,
        codec: Arc<dyn Codec>,
        codec_req: Box<dyn CodecRequest>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            method_record,
            original_method: original_method.into(),
            codec,
            codec_req,
            new_method: None,
            args: None,
            response: None,
            responded: false,
        }
    }

    /// The effective RPC method this request will call: the hook's override
    /// if one was set, otherwise the method the client sent.
    pub fn method(&self) -> &str {
        self.new_method.as_deref().unwrap_or(&self.original_method)
    }

    /// Name of the routed service; empty when the request is headed for the
    /// backup handler.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The schema record of the routed method.
    pub fn method_record(&self) -> &Method {
        &self.method_record
    }

    /// Deserialize the current argument bytes: the hook-mutated copy if one
    /// exists, otherwise the arguments the client sent.
    ///
    /// Changing the returned value does not affect the forwarded request —
    /// pass the changed value back through [`update_request`](Self::update_request).
    pub fn read_params<T: DeserializeOwned>(&self) -> Result<T, ErrorObject> {
        let raw = self
            .args
            .as_deref()
            .or_else(|| self.codec_req.params_raw())
            .ok_or_else(|| ErrorObject::invalid_params("request has no params"))?;
        serde_json::from_str(raw.get()).map_err(|e| ErrorObject::invalid_params(e.to_string()))
    }

    /// Override the outgoing method and/or arguments.
    ///
    /// `None` leaves the respective part unchanged; so does an empty method
    /// string.
    pub fn update_request<T: Serialize + ?Sized>(
        &mut self,
        method: Option<&str>,
        params: Option<&T>,
    ) -> Result<(), ErrorObject> {
        if let Some(m) = method {
            if !m.is_empty() {
                self.new_method = Some(m.to_string());
            }
        }
        if let Some(p) = params {
            let raw = serde_json::value::to_raw_value(p)
                .map_err(|e| ErrorObject::internal(e.to_string()))?;
            self.args = Some(raw);
        }
        Ok(())
    }

    /// Terminal: answer the client with an error.  The gateway will not
    /// forward after this.
    pub fn write_error(&mut self, status: u16, error: ErrorObject) {
        self.response = Some(self.codec_req.frame_error(status, error));
        self.responded = true;
    }

    /// Terminal: answer the client with a success result.  The gateway will
    /// not forward after this.
    pub fn write_response<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ErrorObject> {
        let raw =
            serde_json::value::to_raw_value(value).map_err(|e| ErrorObject::internal(e.to_string()))?;
        self.response = Some(self.codec_req.frame_response(&raw));
        self.responded = true;
        Ok(())
    }

    /// Whether a terminal write has happened.
    pub fn responded(&self) -> bool {
        self.responded
    }

    pub(crate) fn take_response(&mut self) -> Option<FramedResponse> {
        self.response.take()
    }

    /// The outgoing client envelope: effective method plus effective
    /// arguments (the original bytes when the hook never touched them).
    pub(crate) fn client_request(&self) -> Result<Vec<u8>, ErrorObject> {
        let params = self.args.as_deref().or_else(|| self.codec_req.params_raw());
        self.codec.encode_client(self.method(), params)
    }

    pub(crate) fn frame_error(&self, status: u16, error: ErrorObject) -> FramedResponse {
        self.codec_req.frame_error(status, error)
    }

    pub(crate) fn frame_response(&self, result: &RawValue) -> FramedResponse {
        self.codec_req.frame_response(result)
    }
}
