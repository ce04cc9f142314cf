//! The canonical, engine-storable form of a completed response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Response metadata stored next to the payload.
///
/// Serializes flat: `{"statusCode": 200, "content-type": "application/json"}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Additional {
    /// The original response status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Allowlisted response headers, keyed by lowercase name.
    #[serde(flatten)]
    pub headers: BTreeMap<String, String>,
}

/// A cached response, as produced after a first-time request and replayed
/// for its duplicates.
///
/// When built by the normalizer exactly one of `body` and `error` is set:
/// `body` for statuses below 400, `error` otherwise.
///
/// # Example
///
/// ```
/// use mnemosyne_core::CachedOutcome;
/// use serde_json::json;
///
/// let outcome = CachedOutcome::success(201, json!({"id": 7}))
///     .with_header("location", "/orders/7");
///
/// let wire = serde_json::to_value(&outcome).unwrap();
/// assert_eq!(wire, json!({
///     "additional": {"statusCode": 201, "location": "/orders/7"},
///     "body": {"id": 7}
/// }));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CachedOutcome {
    /// Status code and selected headers.
    #[serde(default)]
    pub additional: Additional,

    /// Payload of a successful response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Payload of a failed response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl CachedOutcome {
    /// Creates an outcome for a successful response.
    #[must_use]
    pub fn success(status_code: u16, body: Value) -> Self {
        Self {
            additional: Additional {
                status_code: Some(status_code),
                headers: BTreeMap::new(),
            },
            body: Some(body),
            error: None,
        }
    }

    /// Creates an outcome for a failed response.
    #[must_use]
    pub fn failure(status_code: u16, error: Value) -> Self {
        Self {
            additional: Additional {
                status_code: Some(status_code),
                headers: BTreeMap::new(),
            },
            body: None,
            error: Some(error),
        }
    }

    /// Adds a header to the outcome. The name is stored lowercase.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.additional
            .headers
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Returns the stored status code.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.additional.status_code
    }

    /// Returns the stored headers.
    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.additional.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_sets_only_body() {
        let outcome = CachedOutcome::success(200, json!({"ok": true}));
        assert_eq!(outcome.status_code(), Some(200));
        assert_eq!(outcome.body, Some(json!({"ok": true})));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_failure_sets_only_error() {
        let outcome = CachedOutcome::failure(422, json!({"reason": "bad"}));
        assert_eq!(outcome.status_code(), Some(422));
        assert!(outcome.body.is_none());
        assert_eq!(outcome.error, Some(json!({"reason": "bad"})));
    }

    #[test]
    fn test_headers_are_lowercased() {
        let outcome = CachedOutcome::success(200, json!(null)).with_header("Content-Type", "text/plain");
        assert_eq!(
            outcome.headers().get("content-type").map(String::as_str),
            Some("text/plain")
        );
    }

    #[test]
    fn test_deserializes_engine_record() {
        let record = json!({
            "additional": {"statusCode": 200, "content-type": "application/json"},
            "body": {"ok": true}
        });

        let outcome: CachedOutcome = serde_json::from_value(record).unwrap();
        assert_eq!(outcome.status_code(), Some(200));
        assert_eq!(outcome.headers().len(), 1);
        assert_eq!(outcome.body, Some(json!({"ok": true})));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_record_without_status() {
        let outcome: CachedOutcome =
            serde_json::from_value(json!({"additional": {}, "body": "hi"})).unwrap();
        assert!(outcome.status_code().is_none());
        assert_eq!(outcome.body, Some(json!("hi")));
    }
}
