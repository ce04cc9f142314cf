//! Header replication onto a live response.

use crate::sink::ResponseSink;
use http::{HeaderName, HeaderValue};
use std::collections::BTreeMap;

/// Sets every header in `headers` whose value is non-empty on `sink`.
///
/// Names or values that are not valid HTTP tokens are skipped.
///
/// # Example
///
/// ```
/// use mnemosyne_middleware::stages::idempotency::replicate_headers;
/// use mnemosyne_middleware::{ResponseSink, ResponseWriter};
/// use std::collections::BTreeMap;
///
/// let mut headers = BTreeMap::new();
/// headers.insert("etag".to_string(), "\"v1\"".to_string());
/// headers.insert("location".to_string(), String::new());
///
/// let mut sink = ResponseWriter::new();
/// replicate_headers(&mut sink, &headers);
///
/// assert_eq!(sink.headers()["etag"], "\"v1\"");
/// assert!(!sink.headers().contains_key("location"));
/// ```
pub fn replicate_headers<S: ResponseSink + ?Sized>(
    sink: &mut S,
    headers: &BTreeMap<String, String>,
) {
    for (name, value) in headers {
        if value.is_empty() {
            continue;
        }

        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::debug!(header = %name, "skipping cached header with invalid name");
            continue;
        };

        let Ok(header_value) = HeaderValue::from_str(value) else {
            tracing::debug!(header = %name, "skipping cached header with invalid value");
            continue;
        };

        sink.set_header(header_name, header_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ResponseWriter;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn test_copies_all_non_empty_headers() {
        let mut sink = ResponseWriter::new();
        replicate_headers(
            &mut sink,
            &headers(&[
                ("content-type", "application/json"),
                ("cache-control", "no-store"),
                ("x-powered-by", ""),
            ]),
        );

        assert_eq!(sink.headers().len(), 2);
        assert_eq!(sink.headers()["content-type"], "application/json");
        assert_eq!(sink.headers()["cache-control"], "no-store");
    }

    #[test]
    fn test_mixed_case_names_are_accepted() {
        let mut sink = ResponseWriter::new();
        replicate_headers(&mut sink, &headers(&[("Content-Type", "text/plain")]));
        assert_eq!(sink.headers()["content-type"], "text/plain");
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let mut sink = ResponseWriter::new();
        replicate_headers(
            &mut sink,
            &headers(&[
                ("bad name", "value"),
                ("etag", "line\nbreak"),
                ("vary", "origin"),
            ]),
        );

        assert_eq!(sink.headers().len(), 1);
        assert_eq!(sink.headers()["vary"], "origin");
    }

    #[test]
    fn test_overwrites_existing_value() {
        let mut sink = ResponseWriter::new();
        sink.set_header(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/html"),
        );
        replicate_headers(&mut sink, &headers(&[("content-type", "application/json")]));
        assert_eq!(sink.headers()["content-type"], "application/json");
    }
}
