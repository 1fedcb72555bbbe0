//! Error types for the admission pipeline

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline and its startup path
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Request rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Handler error: {0}")]
    Handler(#[from] anyhow::Error),

    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Timed out reading request body after {0:?}")]
    BodyTimeout(std::time::Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Terminal, per-request outcomes produced before a handler runs.
///
/// None of these are retried by the pipeline; each one maps to a fixed
/// 4xx status and is rendered by a [`StatusResponder`](crate::response::StatusResponder).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Rate limit exceeded. Retry after {retry_after_secs}s. Limit: {limit} requests per window")]
    RateLimitExceeded { limit: u64, retry_after_secs: u64 },

    #[error("Unsupported media type: {}", .content_type.as_deref().unwrap_or("<missing>"))]
    UnsupportedMediaType { content_type: Option<String> },

    #[error("Malformed JSON body: {0}")]
    MalformedBody(String),

    #[error("Request body is empty")]
    EmptyBody,

    #[error("Route not found")]
    RouteNotFound,
}

impl Rejection {
    /// HTTP status code for this rejection
    pub fn status_code(&self) -> StatusCode {
        match self {
            Rejection::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Rejection::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Rejection::EmptyBody => StatusCode::UNPROCESSABLE_ENTITY,
            Rejection::RouteNotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Stable label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Rejection::UnsupportedMediaType { .. } => "unsupported_media_type",
            Rejection::MalformedBody(_) => "malformed_body",
            Rejection::EmptyBody => "empty_body",
            Rejection::RouteNotFound => "route_not_found",
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_status_codes() {
        assert_eq!(
            Rejection::RateLimitExceeded { limit: 5, retry_after_secs: 10 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            Rejection::UnsupportedMediaType { content_type: None }.status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(Rejection::MalformedBody("eof".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Rejection::EmptyBody.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(Rejection::RouteNotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unsupported_media_type_message() {
        let with = Rejection::UnsupportedMediaType { content_type: Some("text/plain".into()) };
        assert_eq!(with.to_string(), "Unsupported media type: text/plain");

        let without = Rejection::UnsupportedMediaType { content_type: None };
        assert_eq!(without.to_string(), "Unsupported media type: <missing>");
    }
}
