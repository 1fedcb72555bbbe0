//! REST Pipeline - request admission and response shaping for JSON APIs
//!
//! Every request passes through an ordered list of before stages
//! (per-identity fixed-window rate limiting, then JSON content validation)
//! before its handler runs. Handler output is shaped into a uniform
//! success envelope with an ETag, `304 Not Modified` support, exposed
//! header advertisement and pagination headers.
//!
//! ## Features
//!
//! - **Rate Limiting**: Fixed-window counters per client identity, with
//!   `X-RateLimit-*` and `Retry-After` headers
//! - **Input Validation**: Content-type and JSON body checks ahead of handlers
//! - **Conditional Responses**: Content-derived ETags and `If-None-Match`
//! - **Observability**: Structured logging and Prometheus metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rest_pipeline::prelude::*;
//! use rest_pipeline::api::handlers::{mount_items, ItemStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default_config();
//!     let limiter = Arc::new(RateLimiter::new(RateLimitConfig::from(&config.rate_limit)));
//!     let pipeline = Pipeline::from_config(&config, limiter, Arc::new(MetricsCollector::new()))?;
//!
//!     let routes = mount_items(RouteTable::new(), Arc::new(ItemStore::new()));
//!     let app = build_router(ApiState::new(Arc::new(pipeline), &config.server), routes)?;
//!
//!     start_server(&config.server, app, Arc::new(ShutdownCoordinator::new())).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod pipeline;
pub mod response;
pub mod server;
pub mod shutdown;

pub use config::Config;
pub use error::{PipelineError, Rejection, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{build_router, ApiState, RouteTable};
    pub use crate::config::Config;
    pub use crate::error::{PipelineError, Rejection, Result};
    pub use crate::middleware::{IdentityResolver, RateLimitConfig, RateLimiter, RequestValidator};
    pub use crate::observability::MetricsCollector;
    pub use crate::pipeline::{Handler, HandlerOutput, Pipeline, RequestContext};
    pub use crate::response::{PaginationDirective, ResponseAccumulator};
    pub use crate::server::start_server;
    pub use crate::shutdown::ShutdownCoordinator;
}
