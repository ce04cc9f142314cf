//! Errors forwarded through the pipeline's error channel.
//!
//! A stage that cannot continue the chain hands a [`PipelineError`] to
//! [`Next::fail`](crate::Next::fail) instead of building an error response
//! itself. The pipeline's [`ErrorHandler`](crate::ErrorHandler) decides how
//! the error becomes a response.

use http::StatusCode;
use mnemosyne_core::EngineError;
use serde_json::Value;
use thiserror::Error;

/// An error travelling down the pipeline's error channel.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The idempotency engine failed to evaluate the request.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A duplicate request whose original response was a failure.
    ///
    /// `payload` is the cached error body, replayed as-is.
    #[error("replayed error response")]
    Replayed {
        /// The cached error payload.
        payload: Value,
    },

    /// The request declared a JSON body that does not parse.
    #[error("malformed JSON body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    /// The request body exceeded the configured limit.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// Any other failure.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// Returns the HTTP status this error maps to when the response does not
    /// already carry an error status.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Engine(error) => error.status_code(),
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Replayed { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a machine-readable error code for the error envelope.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::Engine(EngineError::Idempotency { code, .. }) => code.to_string(),
            Self::Engine(EngineError::Other(_)) => "ENGINE_ERROR".to_string(),
            Self::Replayed { .. } => "REPLAYED_ERROR".to_string(),
            Self::MalformedBody(_) => "MALFORMED_BODY".to_string(),
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE".to_string(),
            Self::Internal(_) => "INTERNAL_ERROR".to_string(),
        }
    }
}
