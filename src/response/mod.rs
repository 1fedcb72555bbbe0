//! Response accumulation and shaping

pub mod etag;
pub mod headers;
pub mod pagination;
pub mod shaper;
pub mod status;

pub use etag::{canonicalize, compute_etag};
pub use headers::ExposedHeaderSet;
pub use pagination::{HeaderPaginationWriter, PaginationDirective, PaginationWriter};
pub use shaper::{ResponseShaper, Shaped};
pub use status::{ErrorBody, JsonStatusResponder, StatusResponder};

use crate::error::{PipelineError, Result};
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use tracing::warn;

/// The single response being built for a request.
///
/// Every stage writes into the same accumulator; once [`finalize`](Self::finalize)
/// has been called further writes are ignored.
#[derive(Debug)]
pub struct ResponseAccumulator {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Bytes>,
    finalized: bool,
}

impl Default for ResponseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
            finalized: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn set_status(&mut self, status: StatusCode) {
        if self.writable("status") {
            self.status = status;
        }
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.writable("header") {
            self.headers.insert(name, value);
        }
    }

    /// Mutable header access for collaborators that write several headers
    pub fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        if self.writable("headers") {
            Some(&mut self.headers)
        } else {
            None
        }
    }

    /// Serialize `value` as the JSON body
    pub fn set_json_body<T: Serialize>(&mut self, value: &T) -> Result<()> {
        if self.writable("body") {
            let bytes = serde_json::to_vec(value)?;
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            self.body = Some(Bytes::from(bytes));
        }
        Ok(())
    }

    /// Drop any body, e.g. for a 304
    pub fn clear_body(&mut self) {
        if self.writable("body") {
            self.body = None;
            self.headers.remove(header::CONTENT_TYPE);
        }
    }

    /// Mark the response complete. Finalizing twice is an error.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(PipelineError::Internal(
                "response already finalized".to_string(),
            ));
        }
        self.finalized = true;
        Ok(())
    }

    /// Write an error body with `status` and finalize, for handlers that
    /// need to end a request with a non-success outcome.
    pub fn finalize_error(&mut self, status: StatusCode, message: impl Into<String>) -> Result<()> {
        self.set_status(status);
        self.set_json_body(&ErrorBody::new(status, message))?;
        self.finalize()
    }

    fn writable(&self, what: &str) -> bool {
        if self.finalized {
            warn!("Ignoring {} write to an already finalized response", what);
        }
        !self.finalized
    }
}

impl IntoResponse for ResponseAccumulator {
    fn into_response(self) -> Response {
        let body = self.body.map(Body::from).unwrap_or_else(Body::empty);
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
