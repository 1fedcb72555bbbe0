//! Admission stages run before dispatch

use super::RequestContext;
use crate::error::Rejection;
use crate::middleware::{IdentityResolver, RateLimiter, RequestValidator};
use crate::response::ResponseAccumulator;
use async_trait::async_trait;
use std::sync::Arc;

/// Identity used when a resolver finds nothing
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// One pre-handler check. A rejection ends the request.
#[async_trait]
pub trait BeforeStage: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    async fn check(
        &self,
        ctx: &RequestContext,
        response: &mut ResponseAccumulator,
    ) -> Result<(), Rejection>;
}

/// Counts the request against a limiter and writes the quota headers
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
    resolver: Arc<dyn IdentityResolver>,
    key_prefix: String,
}

impl RateLimitStage {
    pub fn new(
        limiter: Arc<RateLimiter>,
        resolver: Arc<dyn IdentityResolver>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            limiter,
            resolver,
            key_prefix: key_prefix.into(),
        }
    }

    /// Limiter key for a request, `<prefix>:<identity>`
    pub fn key_for(&self, ctx: &RequestContext) -> String {
        let identity = self
            .resolver
            .resolve(ctx)
            .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string());
        if self.key_prefix.is_empty() {
            identity
        } else {
            format!("{}:{}", self.key_prefix, identity)
        }
    }
}

#[async_trait]
impl BeforeStage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn check(
        &self,
        ctx: &RequestContext,
        response: &mut ResponseAccumulator,
    ) -> Result<(), Rejection> {
        let admission = self.limiter.admit(&self.key_for(ctx));

        if let Some(headers) = response.headers_mut() {
            admission.apply_headers(headers);
        }

        if admission.allowed {
            Ok(())
        } else {
            Err(Rejection::RateLimitExceeded {
                limit: admission.limit,
                retry_after_secs: admission.retry_after_secs(),
            })
        }
    }
}

/// Content-type and body checks for mutating methods
pub struct ContentValidationStage {
    validator: RequestValidator,
}

impl ContentValidationStage {
    pub fn new(validator: RequestValidator) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl BeforeStage for ContentValidationStage {
    fn name(&self) -> &'static str {
        "content_validation"
    }

    async fn check(
        &self,
        ctx: &RequestContext,
        _response: &mut ResponseAccumulator,
    ) -> Result<(), Rejection> {
        self.validator.validate(ctx)
    }
}
