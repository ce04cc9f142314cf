//! The response boundary as an explicit capability.
//!
//! Stages that need to shape a response before it is sent (set a status, add
//! headers, then send a payload) do so through [`ResponseSink`]. Behavior is
//! added by wrapping one sink in another that delegates to it, never by
//! patching a shared response object.
//!
//! ```text
//! CaptureSink ──send──▶ ResponseWriter ──▶ Response
//!     │
//!     └─ normalize + dispatch completion
//! ```

use crate::types::Response;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use serde_json::Value;

/// Capability to build and send one response.
pub trait ResponseSink: Send {
    /// Returns the status that will be sent.
    fn status(&self) -> StatusCode;

    /// Sets the status that will be sent.
    fn set_status(&mut self, status: StatusCode);

    /// Returns the headers set so far.
    fn headers(&self) -> &HeaderMap;

    /// Sets a header, replacing any previous value.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Sends `payload` and returns the finished response.
    fn send(self, payload: Bytes) -> Response
    where
        Self: Sized;
}

/// The terminal sink: accumulates status and headers into response parts.
///
/// # Example
///
/// ```
/// use mnemosyne_middleware::{ResponseSink, ResponseWriter};
/// use bytes::Bytes;
/// use http::{HeaderName, HeaderValue, StatusCode};
///
/// let mut writer = ResponseWriter::new();
/// writer.set_status(StatusCode::CREATED);
/// writer.set_header(HeaderName::from_static("location"), HeaderValue::from_static("/orders/1"));
///
/// let response = writer.send(Bytes::from_static(b"{}"));
/// assert_eq!(response.status(), StatusCode::CREATED);
/// assert_eq!(response.headers()["location"], "/orders/1");
/// ```
#[derive(Debug)]
pub struct ResponseWriter {
    parts: http::response::Parts,
}

impl ResponseWriter {
    /// Creates a writer for an empty `200 OK` response.
    #[must_use]
    pub fn new() -> Self {
        let (parts, ()) = http::Response::new(()).into_parts();
        Self { parts }
    }

    /// Creates a writer that continues an existing response head.
    ///
    /// Version and extensions are carried over untouched.
    #[must_use]
    pub fn from_parts(parts: http::response::Parts) -> Self {
        Self { parts }
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for ResponseWriter {
    fn status(&self) -> StatusCode {
        self.parts.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.parts.status = status;
    }

    fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.parts.headers.insert(name, value);
    }

    fn send(self, payload: Bytes) -> Response {
        http::Response::from_parts(self.parts, Full::new(payload))
    }
}

/// Encodes a structured payload for sending.
///
/// Strings are sent as raw text. Any other value is serialized as JSON, and
/// `content-type: application/json` is set if no content type was set yet.
pub fn encode_value<S: ResponseSink + ?Sized>(sink: &mut S, value: Value) -> Bytes {
    match value {
        Value::String(text) => Bytes::from(text),
        other => {
            if !sink.headers().contains_key(CONTENT_TYPE) {
                sink.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            Bytes::from(other.to_string())
        }
    }
}
