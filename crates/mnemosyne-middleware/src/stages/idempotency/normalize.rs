//! Response normalization.
//!
//! Turns the head of a finished response plus the payload being sent into a
//! [`CachedOutcome`]. Normalization never fails: payloads that do not parse
//! are kept as text.

use crate::sink::ResponseSink;
use crate::types::is_json_content_type;
use http::header::CONTENT_TYPE;
use mnemosyne_core::conventions::CACHEABLE_HEADERS;
use mnemosyne_core::{Additional, CachedOutcome};
use serde_json::Value;
use std::collections::BTreeMap;

/// Builds the cache record for a response about to be sent on `sink`.
///
/// - `statusCode` is the sink's current status.
/// - Allowlisted headers are collected under lowercase names; repeated
///   values are joined with `", "`.
/// - With a JSON content type the payload is parsed. A payload that fails to
///   parse, or parses to a bare JSON string, is kept as its original text so
///   replaying it reproduces the same bytes.
/// - Any other payload is stored as text, unchanged.
/// - The payload lands in `body` below 400 and in `error` otherwise.
///
/// # Example
///
/// ```
/// use mnemosyne_middleware::stages::idempotency::normalize;
/// use mnemosyne_middleware::{ResponseSink, ResponseWriter};
/// use http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
/// use serde_json::json;
///
/// let mut sink = ResponseWriter::new();
/// sink.set_status(StatusCode::CREATED);
/// sink.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
///
/// let outcome = normalize(&sink, br#"{"id":7}"#);
/// assert_eq!(outcome.status_code(), Some(201));
/// assert_eq!(outcome.body, Some(json!({"id": 7})));
/// assert_eq!(outcome.error, None);
/// ```
pub fn normalize<S: ResponseSink + ?Sized>(sink: &S, payload: &[u8]) -> CachedOutcome {
    let status = sink.status();
    let headers = collect_cacheable_headers(sink);

    let declares_json = sink
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(is_json_content_type);

    let text = decode_text(payload);
    let value = if declares_json {
        parse_json(text)
    } else {
        Value::String(text)
    };

    let additional = Additional {
        status_code: Some(status.as_u16()),
        headers,
    };

    if status.as_u16() >= 400 {
        CachedOutcome {
            additional,
            body: None,
            error: Some(value),
        }
    } else {
        CachedOutcome {
            additional,
            body: Some(value),
            error: None,
        }
    }
}

fn collect_cacheable_headers<S: ResponseSink + ?Sized>(sink: &S) -> BTreeMap<String, String> {
    let mut collected = BTreeMap::new();

    for name in CACHEABLE_HEADERS {
        let values: Vec<&str> = sink
            .headers()
            .get_all(*name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();

        if !values.is_empty() {
            collected.insert((*name).to_string(), values.join(", "));
        }
    }

    collected
}

fn decode_text(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(error) => {
            tracing::warn!(
                error = %error,
                bytes = payload.len(),
                "response payload is not UTF-8; caching it lossily"
            );
            String::from_utf8_lossy(payload).into_owned()
        }
    }
}

fn parse_json(text: String) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::String(_)) | Err(_) => Value::String(text),
        Ok(value) => value,
    }
}
