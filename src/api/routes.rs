//! API route configuration

use axum::{
    extract::{ConnectInfo, Path, Request},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, MethodFilter, MethodRouter},
    Json, Router,
};
use http_body_util::LengthLimitError;
use indexmap::IndexMap;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::AppError;
use crate::config::ServerConfig;
use crate::error::{PipelineError, Result};
use crate::middleware::apply_method_override;
use crate::pipeline::{Handler, Pipeline, RequestContext};

/// Paths served outside the pipeline
const RESERVED_PATHS: &[&str] = &["/health", "/metrics"];

/// Registered handlers, mounted onto the router by [`build_router`]
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
}

struct RouteEntry {
    method: Method,
    path: String,
    handler: Arc<dyn Handler>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `path` (axum syntax, e.g. `/items/:id`)
    pub fn route(mut self, method: Method, path: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.routes.push(RouteEntry {
            method,
            path: path.into(),
            handler,
        });
        self
    }

    pub fn get(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(Method::GET, path, Arc::new(handler))
    }

    pub fn post(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(Method::POST, path, Arc::new(handler))
    }

    pub fn put(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(Method::PUT, path, Arc::new(handler))
    }

    pub fn patch(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(Method::PATCH, path, Arc::new(handler))
    }

    pub fn delete(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(Method::DELETE, path, Arc::new(handler))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// State shared by every mounted route
#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<Pipeline>,
    pub max_body_bytes: usize,
    pub body_read_timeout: Duration,
    /// Resolve `X-HTTP-Method-Override` / `_method` on POST before routing
    pub method_override: bool,
}

impl ApiState {
    pub fn new(pipeline: Arc<Pipeline>, server: &ServerConfig) -> Self {
        Self {
            pipeline,
            max_body_bytes: server.max_body_bytes(),
            body_read_timeout: server.body_read_timeout(),
            method_override: true,
        }
    }

    pub fn with_method_override(mut self, enabled: bool) -> Self {
        self.method_override = enabled;
        self
    }
}

fn method_filter(method: &Method) -> Result<MethodFilter> {
    let filter = match *method {
        Method::GET => MethodFilter::GET,
        Method::POST => MethodFilter::POST,
        Method::PUT => MethodFilter::PUT,
        Method::PATCH => MethodFilter::PATCH,
        Method::DELETE => MethodFilter::DELETE,
        Method::HEAD => MethodFilter::HEAD,
        Method::OPTIONS => MethodFilter::OPTIONS,
        Method::TRACE => MethodFilter::TRACE,
        _ => {
            return Err(PipelineError::Config(format!(
                "Method {} cannot be routed",
                method
            )))
        }
    };
    Ok(filter)
}

/// Build the complete API router.
///
/// Every registered route runs through the pipeline. Unmatched paths and
/// methods not registered for a path get the pipeline's not-found
/// response. Route conflicts are reported here, before any traffic is
/// served. With method override enabled the effective method is resolved
/// before routing.
pub fn build_router(state: ApiState, routes: RouteTable) -> Result<Router> {
    let mut by_path: IndexMap<String, Vec<(Method, Arc<dyn Handler>)>> = IndexMap::new();

    for route in routes.routes {
        if RESERVED_PATHS.contains(&route.path.as_str()) {
            return Err(PipelineError::Config(format!("Path {} is reserved", route.path)));
        }

        let handlers = by_path.entry(route.path.clone()).or_default();
        if handlers.iter().any(|(m, _)| *m == route.method) {
            return Err(PipelineError::Config(format!(
                "Duplicate route {} {}",
                route.method, route.path
            )));
        }
        handlers.push((route.method, route.handler));
    }

    let metrics_state = state.clone();
    let mut router = Router::new()
        .route("/health", get(liveness_handler))
        .route(
            "/metrics",
            get(move || async move { metrics_state.pipeline.metrics().export_prometheus() }),
        );

    for (path, handlers) in by_path {
        let fallback_state = state.clone();
        let mut method_router: MethodRouter = MethodRouter::new()
            .fallback(move |req: Request| not_found(fallback_state.clone(), req));
        for (method, handler) in handlers {
            let filter = method_filter(&method)?;
            let state = state.clone();
            info!("Mounted {} {}", method, path);
            method_router = method_router.on(
                filter,
                move |params: Option<Path<HashMap<String, String>>>, req: Request| {
                    let params = params.map(|Path(p)| p).unwrap_or_default();
                    dispatch(state.clone(), handler.clone(), params, req)
                },
            );
        }
        router = router.route(&path, method_router);
    }

    let fallback_state = state.clone();
    let router = router
        .fallback(move |req: Request| not_found(fallback_state.clone(), req))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(state.max_body_bytes)),
        );

    if !state.method_override {
        return Ok(router);
    }

    // Layers on a router run after routing, so the rewrite sits on an
    // outer router whose only target is the real one
    Ok(Router::new()
        .fallback_service(router)
        .layer(axum::middleware::map_request(apply_method_override)))
}

/// Liveness probe handler - always returns 200
async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "alive"})))
}

async fn dispatch(
    state: ApiState,
    handler: Arc<dyn Handler>,
    params: HashMap<String, String>,
    req: Request,
) -> Response {
    let ctx = match read_context(&state, req).await {
        Ok(ctx) => ctx.with_path_params(params),
        Err(e) => return AppError::from(e).into_response(),
    };

    match state.pipeline.execute(&ctx, handler.as_ref()).await {
        Ok(result) => result.into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

async fn not_found(state: ApiState, req: Request) -> Response {
    let peer_addr = peer_addr(&req);
    let (parts, _) = req.into_parts();
    let ctx = RequestContext::new(parts.method, parts.uri, parts.headers, Default::default())
        .with_peer_addr(peer_addr);

    match state.pipeline.not_found(&ctx) {
        Ok(result) => result.into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

fn peer_addr(req: &Request) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Buffer the body, bounded in size and time, and build the context
async fn read_context(state: &ApiState, req: Request) -> Result<RequestContext> {
    let peer_addr = peer_addr(&req);
    let (parts, body) = req.into_parts();
    let limit = state.max_body_bytes;

    let bytes = match tokio::time::timeout(
        state.body_read_timeout,
        axum::body::to_bytes(body, limit),
    )
    .await
    {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => return Err(body_error(e, limit)),
        Err(_) => return Err(PipelineError::BodyTimeout(state.body_read_timeout)),
    };

    Ok(RequestContext::new(parts.method, parts.uri, parts.headers, bytes).with_peer_addr(peer_addr))
}

/// Classify a body read failure: a length limit hit anywhere in the
/// source chain is a 413, anything else a broken body
fn body_error(err: axum::Error, limit: usize) -> PipelineError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            warn!("Request body exceeds {} bytes", limit);
            return PipelineError::BodyTooLarge { limit };
        }
        source = e.source();
    }

    warn!("Failed to read request body: {}", err);
    PipelineError::BodyRead(err.to_string())
}
