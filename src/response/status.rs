//! Error responses for rejected requests

use super::ResponseAccumulator;
use crate::error::{Rejection, Result};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};

/// Body of every 4xx terminal response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: "error",
            code: status.as_u16(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Renders a rejection into the response
pub trait StatusResponder: Send + Sync {
    fn respond(&self, rejection: &Rejection, response: &mut ResponseAccumulator) -> Result<()>;
}

/// Default responder producing [`ErrorBody`] JSON
#[derive(Debug, Clone, Default)]
pub struct JsonStatusResponder;

impl JsonStatusResponder {
    fn body_for(rejection: &Rejection) -> ErrorBody {
        let status = rejection.status_code();
        match rejection {
            Rejection::RateLimitExceeded { limit, retry_after_secs } => {
                ErrorBody::new(status, "Too many requests")
                    .with_details(json!({"limit": limit, "retry_after": retry_after_secs}))
            }
            Rejection::UnsupportedMediaType { content_type } => {
                ErrorBody::new(status, "Unsupported media type")
                    .with_details(json!({"Content-Type": content_type}))
            }
            Rejection::MalformedBody(reason) => {
                ErrorBody::new(status, "Bad request").with_details(json!({"reason": reason}))
            }
            Rejection::EmptyBody => ErrorBody::new(status, "Unprocessable entity"),
            Rejection::RouteNotFound => ErrorBody::new(status, "Not found"),
        }
    }
}

impl StatusResponder for JsonStatusResponder {
    fn respond(&self, rejection: &Rejection, response: &mut ResponseAccumulator) -> Result<()> {
        response.set_status(rejection.status_code());
        response.set_json_body(&Self::body_for(rejection))
    }
}
