//! Error types for the model gateway.

use thiserror::Error;

/// Errors raised while talking to the model provider.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The HTTP request or stream read failed.
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a failing HTTP status.
    #[error("model API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// The event stream violated the protocol (malformed frame, early end).
    #[error("model stream protocol error: {0}")]
    Protocol(String),

    /// A non-streaming response could not be interpreted.
    #[error("unexpected model response: {0}")]
    InvalidResponse(String),

    /// Both the streaming and the fallback path failed; the turn is lost.
    #[error("model unavailable: streaming failed ({streaming}); fallback failed ({fallback})")]
    Unavailable {
        /// Failure of the streaming attempt.
        streaming: String,
        /// Failure of the non-streaming retry.
        fallback: String,
    },
}

/// Result type for model gateway operations.
pub type ModelResult<T> = Result<T, ModelError>;
