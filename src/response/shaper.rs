//! Post-handler response shaping

use super::etag::{compute_etag, matches};
use super::{ExposedHeaderSet, PaginationWriter, ResponseAccumulator};
use crate::error::Result;
use crate::pipeline::{HandlerOutput, RequestContext};
use axum::http::{header, HeaderValue, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Success envelope written around handler data
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub status: &'static str,
    pub data: &'a Value,
}

/// How the shaper left the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shaped {
    /// Envelope written
    Success,
    /// ETag matched `If-None-Match`
    NotModified,
    /// Response was already finalized; nothing touched
    Skipped,
}

/// Turns handler output into the terminal response
pub struct ResponseShaper {
    exposed: Arc<ExposedHeaderSet>,
    pagination: Arc<dyn PaginationWriter>,
}

impl ResponseShaper {
    pub fn new(exposed: Arc<ExposedHeaderSet>, pagination: Arc<dyn PaginationWriter>) -> Self {
        Self { exposed, pagination }
    }

    pub fn exposed_headers(&self) -> &ExposedHeaderSet {
        &self.exposed
    }

    /// Shape and finalize the response. Idempotent against a response that
    /// is already finalized.
    pub fn shape(
        &self,
        ctx: &RequestContext,
        output: &HandlerOutput,
        response: &mut ResponseAccumulator,
    ) -> Result<Shaped> {
        if response.is_finalized() {
            debug!("Response already finalized, skipping shaping");
            return Ok(Shaped::Skipped);
        }

        match HeaderValue::from_str(&self.exposed.joined()) {
            Ok(value) => response.set_header(header::ACCESS_CONTROL_EXPOSE_HEADERS, value),
            Err(e) => warn!("Exposed header list is not a valid header value: {}", e),
        }

        if ctx.method() == Method::GET {
            if let (Some(directive), Some(headers)) = (&output.pagination, response.headers_mut()) {
                self.pagination.write_headers(directive, headers);
            }

            let etag = compute_etag(&output.data);
            if let Ok(value) = HeaderValue::from_str(&etag) {
                response.set_header(header::ETAG, value);
            }

            if matches(ctx.if_none_match(), &etag) {
                debug!("ETag {} matched, responding 304", etag);
                response.set_status(StatusCode::NOT_MODIFIED);
                response.clear_body();
                response.finalize()?;
                return Ok(Shaped::NotModified);
            }
        }

        response.set_status(output.status);
        response.set_json_body(&Envelope {
            status: "success",
            data: &output.data,
        })?;
        response.finalize()?;
        Ok(Shaped::Success)
    }
}
