//! Route handler contract

use super::RequestContext;
use crate::response::{PaginationDirective, ResponseAccumulator};
use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// What a handler hands back to the response shaper
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    /// Wrapped as `data` in the success envelope
    pub data: Value,
    /// Pagination metadata for list responses
    pub pagination: Option<PaginationDirective>,
    /// Success status, 200 unless the handler says otherwise
    pub status: StatusCode,
}

impl HandlerOutput {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            pagination: None,
            status: StatusCode::OK,
        }
    }

    /// Serialize any value as the output data
    pub fn json<T: Serialize>(data: &T) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::to_value(data)?))
    }

    pub fn with_pagination(mut self, directive: PaginationDirective) -> Self {
        self.pagination = Some(directive);
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

/// A route handler.
///
/// Handlers may write extra headers into `response`; a handler that
/// finalizes it takes over the response and shaping is skipped. Errors
/// are not turned into 4xx responses, they propagate to the host.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        ctx: &RequestContext,
        response: &mut ResponseAccumulator,
    ) -> anyhow::Result<HandlerOutput>;
}
