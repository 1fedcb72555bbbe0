//! Request admission pipeline
//!
//! A request runs through a fixed, ordered list of [`BeforeStage`]s
//! (rate limiting, then content validation). The first rejection ends the
//! request with a 4xx response; otherwise the handler runs and the
//! [`ResponseShaper`] produces the terminal response.

pub mod context;
pub mod handler;
pub mod stage;

pub use context::RequestContext;
pub use handler::{Handler, HandlerOutput};
pub use stage::{BeforeStage, ContentValidationStage, RateLimitStage};

use crate::config::Config;
use crate::error::{PipelineError, Rejection, Result};
use crate::middleware::{resolver_from_config, RateLimiter, RequestValidator};
use crate::observability::MetricsCollector;
use crate::response::{
    ExposedHeaderSet, HeaderPaginationWriter, JsonStatusResponder, PaginationWriter,
    ResponseAccumulator, ResponseShaper, Shaped, StatusResponder,
};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Terminal outcome of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Handler ran and the response was shaped (or finalized by the handler)
    Handled,
    /// ETag matched, 304 without body
    NotModified,
    /// A before stage refused the request
    Rejected(Rejection),
    /// No route matched
    NotFound,
}

/// Finalized response plus how it came about
#[derive(Debug)]
pub struct PipelineResponse {
    pub outcome: Outcome,
    pub response: ResponseAccumulator,
}

impl IntoResponse for PipelineResponse {
    fn into_response(self) -> Response {
        self.response.into_response()
    }
}

/// The admission pipeline, built once at startup and shared by reference
pub struct Pipeline {
    stages: Vec<Arc<dyn BeforeStage>>,
    shaper: ResponseShaper,
    responder: Arc<dyn StatusResponder>,
    metrics: Arc<MetricsCollector>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Standard pipeline: one rate limit stage followed by content validation
    pub fn from_config(
        config: &Config,
        limiter: Arc<RateLimiter>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        let resolver = resolver_from_config(&config.rate_limit.identity)?;

        let mut builder = Pipeline::builder()
            .metrics(metrics)
            .stage(Arc::new(RateLimitStage::new(
                limiter,
                resolver,
                config.rate_limit.key_prefix.clone(),
            )))
            .stage(Arc::new(ContentValidationStage::new(RequestValidator::new(
                config.validation.clone(),
            ))))
            .expose_header("ETag");

        if config.response.expose_rate_limit_headers {
            builder = builder
                .expose_header("X-RateLimit-Limit")
                .expose_header("X-RateLimit-Remaining")
                .expose_header("X-RateLimit-Reset");
        }

        for name in &config.response.expose_headers {
            builder = builder.expose_header(name.clone());
        }

        builder
            .expose_pagination_headers(config.response.expose_pagination_headers)
            .build()
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn exposed_headers(&self) -> &ExposedHeaderSet {
        self.shaper.exposed_headers()
    }

    /// Run the stages, the handler and the shaper for one request.
    ///
    /// Handler failures are returned as [`PipelineError::Handler`] for the
    /// host to turn into a server error.
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        handler: &dyn Handler,
    ) -> Result<PipelineResponse> {
        let started = Instant::now();
        let mut response = ResponseAccumulator::new();

        for stage in &self.stages {
            if let Err(rejection) = stage.check(ctx, &mut response).await {
                warn!(
                    request_id = %ctx.request_id(),
                    method = %ctx.method(),
                    path = ctx.path(),
                    stage = stage.name(),
                    reason = rejection.kind(),
                    "Request rejected: {}",
                    rejection
                );
                let result = self.reject(rejection, response);
                self.metrics.record_request(started.elapsed());
                return result;
            }
        }

        let output = match handler.handle(ctx, &mut response).await {
            Ok(output) => output,
            Err(e) => {
                self.metrics.record_handler_error();
                self.metrics.record_request(started.elapsed());
                return Err(PipelineError::Handler(e));
            }
        };

        let outcome = match self.shaper.shape(ctx, &output, &mut response)? {
            Shaped::NotModified => {
                self.metrics.record_not_modified();
                Outcome::NotModified
            }
            Shaped::Success | Shaped::Skipped => {
                self.metrics.record_handled();
                Outcome::Handled
            }
        };

        debug!(
            request_id = %ctx.request_id(),
            status = response.status().as_u16(),
            "Request handled"
        );
        self.metrics.record_request(started.elapsed());

        Ok(PipelineResponse { outcome, response })
    }

    /// Response for an unmatched route; no stage runs
    pub fn not_found(&self, ctx: &RequestContext) -> Result<PipelineResponse> {
        debug!(request_id = %ctx.request_id(), path = ctx.path(), "No route matched");
        let mut result = self.reject(Rejection::RouteNotFound, ResponseAccumulator::new())?;
        result.outcome = Outcome::NotFound;
        self.metrics.record_request(std::time::Duration::ZERO);
        Ok(result)
    }

    fn reject(
        &self,
        rejection: Rejection,
        mut response: ResponseAccumulator,
    ) -> Result<PipelineResponse> {
        self.responder.respond(&rejection, &mut response)?;
        response.finalize()?;
        self.metrics.record_rejection(&rejection);
        Ok(PipelineResponse {
            outcome: Outcome::Rejected(rejection),
            response,
        })
    }
}

/// Assembles a [`Pipeline`]. The exposed header set can only change here.
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn BeforeStage>>,
    exposed: ExposedHeaderSet,
    pagination: Arc<dyn PaginationWriter>,
    expose_pagination: bool,
    responder: Arc<dyn StatusResponder>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            exposed: ExposedHeaderSet::new(),
            pagination: Arc::new(HeaderPaginationWriter),
            expose_pagination: true,
            responder: Arc::new(JsonStatusResponder),
            metrics: None,
        }
    }

    /// Append a stage; stages run in insertion order
    pub fn stage(mut self, stage: Arc<dyn BeforeStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn expose_header(mut self, name: impl Into<String>) -> Self {
        self.exposed.add(name);
        self
    }

    pub fn unexpose_header(mut self, name: &str) -> Self {
        self.exposed.remove(name);
        self
    }

    pub fn pagination_writer(mut self, writer: Arc<dyn PaginationWriter>) -> Self {
        self.pagination = writer;
        self
    }

    /// Add the pagination writer's header names to the exposed set on build
    pub fn expose_pagination_headers(mut self, expose: bool) -> Self {
        self.expose_pagination = expose;
        self
    }

    pub fn status_responder(mut self, responder: Arc<dyn StatusResponder>) -> Self {
        self.responder = responder;
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(mut self) -> Result<Pipeline> {
        if self.expose_pagination {
            for name in self.pagination.header_names() {
                self.exposed.add(name);
            }
        }

        if axum::http::HeaderValue::from_str(&self.exposed.joined()).is_err() {
            return Err(PipelineError::Config(
                "Exposed header names do not form a valid header value".to_string(),
            ));
        }

        Ok(Pipeline {
            stages: self.stages,
            shaper: ResponseShaper::new(Arc::new(self.exposed), self.pagination),
            responder: self.responder,
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}
