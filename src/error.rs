//! Error types for the request lifecycle.
//!
//! Errors fall into two propagation classes:
//!
//! | Class | Variants | Raised |
//! |-------|----------|--------|
//! | Synchronous | [`HttpError::Validation`], [`HttpError::Configuration`], [`HttpError::AlreadySent`] | at the API call that caused them, before any I/O |
//! | Asynchronous | [`HttpError::Transport`], [`HttpError::Timeout`], [`HttpError::Aborted`], [`HttpError::Verification`] | through the result of [`Request::send`](crate::Request::send) |
//!
//! Nothing in this crate retries on failure.

use thiserror::Error;

/// Errors produced by the HTTP client.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// An enumerated value or port was rejected at assignment.
    #[error("validation error: {0}")]
    Validation(String),

    /// A crypto operation was requested without a key or without a crypto capability.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network level failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport gave up waiting for a response.
    #[error("request timed out")]
    Timeout,

    /// The request was cancelled through [`AbortSignal`](crate::client::AbortSignal).
    #[error("request aborted")]
    Aborted,

    /// The response signature did not verify.
    #[error("could not validate response (signature: {signature})")]
    Verification {
        /// Signature header value received from the server.
        signature: String,
    },

    /// The crypto capability failed while processing a body.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// JSON serialization failed.
    #[error("json error: {0}")]
    Json(String),

    /// `send()` was invoked on a request that already left the configured state.
    #[error("request already sent")]
    AlreadySent,
}

impl HttpError {
    /// Errors that flow through the async result channel.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HttpError::Transport(_) | HttpError::Timeout | HttpError::Aborted
        )
    }

    /// Errors raised synchronously at assignment time.
    pub fn is_validation(&self) -> bool {
        matches!(self, HttpError::Validation(_))
    }

    /// Convenience constructor for validation failures.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        HttpError::Validation(message.into())
    }

    /// Convenience constructor for configuration failures.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        HttpError::Configuration(message.into())
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout
        } else {
            HttpError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for HttpError {
    fn from(err: url::ParseError) -> Self {
        HttpError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::Json(err.to_string())
    }
}

/// Result type alias for HTTP client operations
pub type Result<T> = std::result::Result<T, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(HttpError::Timeout.is_transport());
        assert!(HttpError::Aborted.is_transport());
        assert!(!HttpError::invalid("port").is_transport());
        assert!(HttpError::invalid("port").is_validation());
    }

    #[test]
    fn test_verification_message() {
        let err = HttpError::Verification {
            signature: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "could not validate response (signature: abc)"
        );
    }
}
