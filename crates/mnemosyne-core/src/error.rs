//! Error types for the idempotency engine contract.
//!
//! This module provides [`EngineError`], the error type every
//! [`IdempotencyEngine`](crate::IdempotencyEngine) call returns, and
//! [`FailureCode`], the machine-readable code carried by recognized
//! idempotency failures.
//!
//! # Recognized vs. unrecognized failures
//!
//! | Variant | Meaning | HTTP status |
//! |---|---|---|
//! | `Idempotency { code, .. }` | The engine rejected the request by protocol | from [`conventions::status_for`](crate::conventions::status_for) |
//! | `Other(..)` | Anything else (storage down, bug, timeout) | 500 |

use crate::conventions;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;

/// Machine-readable code of a recognized idempotency failure.
///
/// Serializes to the engine's wire form (`REQUEST_IN_PROGRESS`, ...). Codes the
/// engine emits that this crate does not know are kept verbatim in
/// [`FailureCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailureCode {
    /// The request carried no idempotency key.
    KeyMissing,
    /// The idempotency key exceeded the engine's length limit.
    KeyTooLong,
    /// The key was reused with a different request payload.
    FingerprintMismatch,
    /// A request with the same key is currently being processed.
    RequestInProgress,
    /// Any code not listed above.
    Other(String),
}

impl FailureCode {
    /// Returns the wire form of this code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::KeyMissing => "IDEMPOTENCY_KEY_MISSING",
            Self::KeyTooLong => "IDEMPOTENCY_KEY_LEN_EXCEEDED",
            Self::FingerprintMismatch => "IDEMPOTENCY_FINGERPRINT_MISMATCH",
            Self::RequestInProgress => "REQUEST_IN_PROGRESS",
            Self::Other(code) => code,
        }
    }

    /// Parses a wire-form code. Unknown codes become [`FailureCode::Other`].
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code {
            "IDEMPOTENCY_KEY_MISSING" => Self::KeyMissing,
            "IDEMPOTENCY_KEY_LEN_EXCEEDED" => Self::KeyTooLong,
            "IDEMPOTENCY_FINGERPRINT_MISMATCH" => Self::FingerprintMismatch,
            "REQUEST_IN_PROGRESS" => Self::RequestInProgress,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true if this code signals a concurrent request with the same key.
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        matches!(self, Self::RequestInProgress)
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FailureCode {
    fn from(code: String) -> Self {
        Self::parse(&code)
    }
}

impl From<FailureCode> for String {
    fn from(code: FailureCode) -> Self {
        code.as_str().to_string()
    }
}

/// Error returned by [`IdempotencyEngine`](crate::IdempotencyEngine) calls.
///
/// # Example
///
/// ```
/// use mnemosyne_core::{EngineError, FailureCode};
/// use http::StatusCode;
///
/// let err = EngineError::in_progress("request abc is still running");
/// assert_eq!(err.code(), Some(&FailureCode::RequestInProgress));
/// assert_eq!(err.status_code(), StatusCode::CONFLICT);
/// assert_eq!(err.retry_after_secs(), Some(1));
/// ```
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine rejected the request under the idempotency protocol.
    #[error("idempotency failure ({code}): {message}")]
    Idempotency {
        /// The failure code.
        code: FailureCode,
        /// Human-readable error message.
        message: String,
    },

    /// Any failure outside the protocol (storage, timeouts, bugs).
    #[error("engine error: {0}")]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Creates a recognized idempotency failure.
    #[must_use]
    pub fn idempotency(code: FailureCode, message: impl Into<String>) -> Self {
        Self::Idempotency {
            code,
            message: message.into(),
        }
    }

    /// Creates a `REQUEST_IN_PROGRESS` failure.
    #[must_use]
    pub fn in_progress(message: impl Into<String>) -> Self {
        Self::idempotency(FailureCode::RequestInProgress, message)
    }

    /// Creates an unrecognized failure from a message.
    #[must_use]
    pub fn other(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Other(anyhow::Error::msg(message))
    }

    /// Returns the failure code of a recognized failure.
    #[must_use]
    pub const fn code(&self) -> Option<&FailureCode> {
        match self {
            Self::Idempotency { code, .. } => Some(code),
            Self::Other(_) => None,
        }
    }

    /// Returns true for failures raised under the idempotency protocol.
    #[must_use]
    pub const fn is_recognized(&self) -> bool {
        matches!(self, Self::Idempotency { .. })
    }

    /// Returns the HTTP status this failure maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Idempotency { code, .. } => conventions::status_for(code),
            Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the `retry-after` hint in seconds, if the failure carries one.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.code()
            .filter(|code| code.is_in_progress())
            .map(|_| conventions::IN_PROGRESS_RETRY_AFTER_SECS)
    }
}
