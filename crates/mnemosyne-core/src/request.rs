//! The per-request snapshot handed to the engine.

use crate::conventions::IDEMPOTENCY_KEY_HEADER;
use http::{HeaderMap, Method, Uri, Version};
use serde_json::Value;

/// Read-only snapshot of an inbound request.
///
/// Built once per request by the interception stage and shared by both
/// engine calls (`evaluate` and `complete`), so the engine sees the same
/// identity on both. There are no setters.
///
/// # Example
///
/// ```
/// use mnemosyne_core::IdempotencyRequest;
/// use http::{HeaderMap, Method, Uri, Version};
/// use serde_json::json;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("idempotency-key", "abc-123".parse().unwrap());
///
/// let request = IdempotencyRequest::new(
///     Method::POST,
///     Uri::from_static("/orders?expand=items"),
///     Version::HTTP_11,
///     headers,
///     json!({"sku": "X-1"}),
/// );
///
/// assert_eq!(request.path(), "/orders");
/// assert_eq!(request.idempotency_key(), Some("abc-123"));
/// ```
#[derive(Debug, Clone)]
pub struct IdempotencyRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Value,
    /// Full URI of the original request, query included.
    uri: Uri,
    /// Protocol version of the original request.
    version: Version,
}

impl IdempotencyRequest {
    /// Creates a snapshot. The path is taken from `uri`.
    #[must_use]
    pub fn new(method: Method, uri: Uri, version: Version, headers: HeaderMap, body: Value) -> Self {
        Self {
            method,
            path: uri.path().to_string(),
            headers,
            body,
            uri,
            version,
        }
    }

    /// Creates a snapshot from request parts and an already parsed body.
    #[must_use]
    pub fn from_parts(parts: &http::request::Parts, body: Value) -> Self {
        Self::new(
            parts.method.clone(),
            parts.uri.clone(),
            parts.version,
            parts.headers.clone(),
            body,
        )
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (no query string).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns all request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Returns the parsed request body, `Value::Null` when there was none.
    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Returns the original request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the original protocol version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the client-supplied idempotency key, if any.
    #[must_use]
    pub fn idempotency_key(&self) -> Option<&str> {
        self.header(IDEMPOTENCY_KEY_HEADER)
    }
}
