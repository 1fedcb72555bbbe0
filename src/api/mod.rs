//! HTTP glue between axum and the admission pipeline

pub mod handlers;
pub mod routes;

pub use routes::{build_router, ApiState, RouteTable};

use crate::error::PipelineError;
use crate::response::ErrorBody;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

/// Host fault boundary: turns errors that escaped the pipeline into responses
pub struct AppError(PipelineError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PipelineError::Rejected(rejection) => rejection.status_code(),
            PipelineError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::BodyRead(_) => StatusCode::BAD_REQUEST,
            PipelineError::BodyTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            error!("Request failed: {}", self.0);
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(ErrorBody::new(status, message))).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}
