//! Client identity resolution for rate limiting

use crate::config::IdentitySource;
use crate::error::{PipelineError, Result};
use crate::pipeline::RequestContext;
use axum::http::HeaderName;
use std::sync::Arc;

/// Derives the key a rate limit window is scoped to
pub trait IdentityResolver: Send + Sync {
    /// `None` when the request carries no usable identity
    fn resolve(&self, ctx: &RequestContext) -> Option<String>;
}

/// Scopes by the remote socket address
#[derive(Debug, Clone, Default)]
pub struct PeerAddress;

impl IdentityResolver for PeerAddress {
    fn resolve(&self, ctx: &RequestContext) -> Option<String> {
        ctx.peer_addr().map(|addr| addr.ip().to_string())
    }
}

/// Scopes by the first `X-Forwarded-For` hop, falling back to the peer address.
///
/// Only trustworthy behind a proxy that overwrites the header.
#[derive(Debug, Clone, Default)]
pub struct ForwardedFor;

impl IdentityResolver for ForwardedFor {
    fn resolve(&self, ctx: &RequestContext) -> Option<String> {
        ctx.header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .map(str::to_string)
            .or_else(|| PeerAddress.resolve(ctx))
    }
}

/// Scopes by the value of a request header, e.g. an API key
#[derive(Debug, Clone)]
pub struct HeaderIdentity {
    name: HeaderName,
}

impl HeaderIdentity {
    pub fn new(name: HeaderName) -> Self {
        Self { name }
    }
}

impl IdentityResolver for HeaderIdentity {
    fn resolve(&self, ctx: &RequestContext) -> Option<String> {
        ctx.header(&self.name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// Build the resolver selected in configuration
pub fn resolver_from_config(source: &IdentitySource) -> Result<Arc<dyn IdentityResolver>> {
    let resolver: Arc<dyn IdentityResolver> = match source {
        IdentitySource::PeerAddress => Arc::new(PeerAddress),
        IdentitySource::ForwardedFor => Arc::new(ForwardedFor),
        IdentitySource::Header { name } => {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                PipelineError::Config(format!("Invalid identity header name '{}'", name))
            })?;
            Arc::new(HeaderIdentity::new(name))
        }
    };
    Ok(resolver)
}
