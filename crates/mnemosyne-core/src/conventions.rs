//! Conventions shared between the engine and the interception layer.
//!
//! Both sides must agree on these values: which failure code maps to which
//! status, which response headers are worth caching, and the names of the
//! protocol headers.

use crate::error::FailureCode;
use http::StatusCode;

/// Request header carrying the client-chosen idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Response header marking a replayed response.
pub const REPLAYED_HEADER: &str = "idempotent-replayed";

/// `retry-after` value sent when a request with the same key is in flight.
pub const IN_PROGRESS_RETRY_AFTER_SECS: u64 = 1;

/// Response headers eligible for storage and replay.
///
/// `content-length` is excluded; the transport recomputes it for the
/// replayed body.
pub const CACHEABLE_HEADERS: &[&str] = &[
    "content-type",
    "cache-control",
    "etag",
    "last-modified",
    "location",
    "vary",
    "access-control-allow-origin",
    "x-powered-by",
];

/// Failure code to HTTP status table.
const STATUS_TABLE: &[(&str, u16)] = &[
    ("IDEMPOTENCY_KEY_MISSING", 400),
    ("IDEMPOTENCY_KEY_LEN_EXCEEDED", 400),
    ("IDEMPOTENCY_FINGERPRINT_MISMATCH", 422),
    ("REQUEST_IN_PROGRESS", 409),
];

/// Maps a failure code to its HTTP status. Unmapped codes yield 500.
///
/// # Example
///
/// ```
/// use mnemosyne_core::{conventions, FailureCode};
/// use http::StatusCode;
///
/// assert_eq!(conventions::status_for(&FailureCode::RequestInProgress), StatusCode::CONFLICT);
/// assert_eq!(
///     conventions::status_for(&FailureCode::Other("NOPE".into())),
///     StatusCode::INTERNAL_SERVER_ERROR,
/// );
/// ```
#[must_use]
pub fn status_for(code: &FailureCode) -> StatusCode {
    STATUS_TABLE
        .iter()
        .find(|(name, _)| *name == code.as_str())
        .and_then(|(_, status)| StatusCode::from_u16(*status).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
