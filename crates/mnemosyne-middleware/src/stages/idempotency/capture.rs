//! Transparent response capture.

use super::completion::CompletionDispatcher;
use super::normalize::normalize;
use crate::sink::ResponseSink;
use crate::types::Response;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use mnemosyne_core::IdempotencyRequest;
use std::sync::Arc;

/// A [`ResponseSink`] decorator that caches what it sends.
///
/// Every call is delegated to the wrapped sink. On [`send`](ResponseSink::send)
/// the response is normalized and handed to the [`CompletionDispatcher`]
/// before the wrapped sink sends it, so the returned response is exactly what
/// the wrapped sink would have returned on its own.
pub struct CaptureSink<S> {
    inner: S,
    request: Arc<IdempotencyRequest>,
    dispatcher: CompletionDispatcher,
}

impl<S: ResponseSink> CaptureSink<S> {
    /// Wraps `inner`, caching its response for `request`.
    pub fn new(inner: S, request: Arc<IdempotencyRequest>, dispatcher: CompletionDispatcher) -> Self {
        Self {
            inner,
            request,
            dispatcher,
        }
    }
}

impl<S: ResponseSink> ResponseSink for CaptureSink<S> {
    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.inner.set_status(status);
    }

    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.inner.set_header(name, value);
    }

    fn send(self, payload: Bytes) -> Response {
        let outcome = normalize(&self.inner, &payload);
        tracing::debug!(status = ?outcome.status_code(), "captured response for caching");

        drop(self.dispatcher.dispatch(self.request, outcome));

        self.inner.send(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ResponseWriter;
    use crate::types::body_bytes;
    use http::header::CONTENT_TYPE;
    use http::{HeaderMap as Headers, Method, Uri, Version};
    use mnemosyne_core::fixtures::ScriptedEngine;
    use serde_json::{json, Value};

    fn request() -> Arc<IdempotencyRequest> {
        Arc::new(IdempotencyRequest::new(
            Method::GET,
            Uri::from_static("/x"),
            Version::HTTP_11,
            Headers::new(),
            Value::Null,
        ))
    }

    #[tokio::test]
    async fn test_send_is_transparent_and_dispatches() {
        let engine = Arc::new(ScriptedEngine::new());
        let dispatcher = CompletionDispatcher::new(engine.clone());

        let mut sink = CaptureSink::new(ResponseWriter::new(), request(), dispatcher.clone());
        sink.set_status(StatusCode::CREATED);
        sink.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        sink.set_header(
            HeaderName::from_static("x-internal"),
            HeaderValue::from_static("kept"),
        );

        let response = sink.send(Bytes::from_static(br#"{"id":1}"#));

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-internal"], "kept");
        assert_eq!(
            body_bytes(response.into_body()).await,
            Bytes::from_static(br#"{"id":1}"#)
        );

        let completions = engine.wait_for_completions(1).await;
        let outcome = &completions[0].outcome;
        assert_eq!(outcome.status_code(), Some(201));
        assert_eq!(outcome.body, Some(json!({"id": 1})));
        assert_eq!(outcome.headers()["content-type"], "application/json");
        assert!(!outcome.headers().contains_key("x-internal"));
    }

    #[tokio::test]
    async fn test_reads_delegate_to_inner() {
        let dispatcher = CompletionDispatcher::new(Arc::new(ScriptedEngine::new()));

        let mut inner = ResponseWriter::new();
        inner.set_status(StatusCode::ACCEPTED);
        let sink = CaptureSink::new(inner, request(), dispatcher);

        assert_eq!(sink.status(), StatusCode::ACCEPTED);
        assert!(sink.headers().is_empty());
    }
}
