//! Router-level tests for the admission pipeline
//!
//! These drive the complete axum router, including the `items` resource,
//! with `tower::ServiceExt::oneshot`; no socket is bound.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use rest_pipeline::{
    api::{build_router, handlers::{mount_items, ItemStore}, ApiState, RouteTable},
    config::{Config, IdentitySource},
    middleware::{RateLimitConfig, RateLimiter},
    observability::MetricsCollector,
    pipeline::Pipeline,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<ItemStore>,
    limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
}

/// Helper to create test configuration
fn create_test_config(max_requests: u64) -> Config {
    let mut config = Config::default_config();
    config.rate_limit.max_requests = max_requests;
    config.logging.format = "compact".to_string();
    config
}

fn build_app(config: &Config) -> TestApp {
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::from(&config.rate_limit)));
    let metrics = Arc::new(MetricsCollector::new());
    let pipeline = Pipeline::from_config(config, limiter.clone(), metrics.clone()).unwrap();
    let store = Arc::new(ItemStore::new());
    let routes = mount_items(RouteTable::new(), store.clone());
    let state = ApiState::new(Arc::new(pipeline), &config.server)
        .with_method_override(config.validation.method_override);
    let router = build_router(state, routes).unwrap();

    TestApp {
        router,
        store,
        limiter,
        metrics,
    }
}

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    request(method, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    request(method, uri).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, req: Request<Body>) -> axum::response::Response {
    app.router.clone().oneshot(req).await.unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_str<'a>(response: &'a axum::response::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_get_returns_envelope_with_etag() {
    let app = build_app(&create_test_config(100));
    app.store.insert("widget".to_string(), None).await;

    let response = send(&app, empty_request(Method::GET, "/items/1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(header_str(&response, "etag").is_some());

    let exposed = header_str(&response, "access-control-expose-headers").unwrap();
    assert!(exposed.contains("ETag"));
    assert!(exposed.contains("X-RateLimit-Remaining"));
    assert!(exposed.contains("X-Pagination-Total-Count"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["name"], "widget");
}

#[tokio::test]
async fn test_conditional_get_returns_not_modified() {
    let app = build_app(&create_test_config(100));
    app.store.insert("widget".to_string(), None).await;

    let first = send(&app, empty_request(Method::GET, "/items/1")).await;
    let etag = header_str(&first, "etag").unwrap().to_string();

    let second = send(
        &app,
        request(Method::GET, "/items/1")
            .header(header::IF_NONE_MATCH, etag.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(header_str(&second, "etag"), Some(etag.as_str()));
    let bytes = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());

    // A stale tag gets the full response
    let stale = send(
        &app,
        request(Method::GET, "/items/1")
            .header(header::IF_NONE_MATCH, "STALE")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::OK);
    assert_eq!(app.metrics.get_metrics().not_modified, 1);
}

#[tokio::test]
async fn test_post_with_wrong_content_type_is_rejected() {
    let app = build_app(&create_test_config(100));

    let response = send(
        &app,
        request(Method::POST, "/items")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("name=widget"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], 415);
    assert_eq!(body["details"]["Content-Type"], "text/plain");
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_malformed_and_empty_bodies() {
    let app = build_app(&create_test_config(100));

    let malformed = send(&app, json_request(Method::POST, "/items", "{not json")).await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let empty_object = send(&app, json_request(Method::POST, "/items", "{}")).await;
    assert_eq!(empty_object.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let empty_array = send(&app, json_request(Method::PUT, "/items/1", "[]")).await;
    assert_eq!(empty_array.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_create_then_list_with_pagination() {
    let app = build_app(&create_test_config(100));

    for i in 0..5 {
        let response = send(
            &app,
            json_request(Method::POST, "/items", &json!({"name": format!("item-{}", i)}).to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        // Mutations carry no ETag
        assert!(header_str(&response, "etag").is_none());
    }

    let response = send(&app, empty_request(Method::GET, "/items?page=2&page_size=2")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-pagination-page"), Some("2"));
    assert_eq!(header_str(&response, "x-pagination-page-size"), Some("2"));
    assert_eq!(header_str(&response, "x-pagination-total-count"), Some("5"));
    assert_eq!(header_str(&response, "x-pagination-page-count"), Some("3"));

    let body = body_json(response).await;
    let ids: Vec<u64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 4]);
}

#[tokio::test]
async fn test_rate_limit_runs_before_validation() {
    let app = build_app(&create_test_config(2));

    for expected_remaining in ["1", "0"] {
        let response = send(&app, empty_request(Method::GET, "/items")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "x-ratelimit-limit"), Some("2"));
        assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some(expected_remaining));
        assert!(header_str(&response, "x-ratelimit-reset").is_some());
    }

    // Would be a 415, but the limiter answers first
    let response = send(
        &app,
        request(Method::POST, "/items")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("x"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(header_str(&response, "retry-after").is_some());
    assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some("0"));

    let body = body_json(response).await;
    assert_eq!(body["code"], 429);
    assert_eq!(body["details"]["limit"], 2);
    assert_eq!(app.metrics.rejections("rate_limit_exceeded"), 1);
}

#[tokio::test]
async fn test_peer_addresses_have_separate_windows() {
    let app = build_app(&create_test_config(1));

    let from = |ip: [u8; 4]| {
        let mut req = empty_request(Method::GET, "/items");
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
        req
    };

    assert_eq!(send(&app, from([10, 0, 0, 1])).await.status(), StatusCode::OK);
    assert_eq!(send(&app, from([10, 0, 0, 1])).await.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(send(&app, from([10, 0, 0, 2])).await.status(), StatusCode::OK);

    assert_eq!(app.limiter.usage("ip:10.0.0.1").map(|(count, _)| count), Some(2));
}

#[tokio::test]
async fn test_header_identity_scopes_windows() {
    let mut config = create_test_config(1);
    config.rate_limit.identity = IdentitySource::Header {
        name: "x-api-key".to_string(),
    };
    config.rate_limit.key_prefix = "key".to_string();
    let app = build_app(&config);

    let with_key = |key: &str| {
        request(Method::GET, "/items")
            .header("x-api-key", key)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&app, with_key("alpha")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, with_key("beta")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, with_key("alpha")).await.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(app.limiter.usage("key:beta").is_some());
}

#[tokio::test]
async fn test_unknown_route_is_not_found_and_not_counted() {
    let app = build_app(&create_test_config(1));

    for _ in 0..3 {
        let response = send(&app, empty_request(Method::GET, "/does-not-exist")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(header_str(&response, "x-ratelimit-limit").is_none());
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], 404);
    }

    assert_eq!(app.limiter.stats().total_clients, 0);
    let response = send(&app, empty_request(Method::GET, "/items")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_item_finalized_by_handler() {
    let app = build_app(&create_test_config(100));

    let response = send(&app, empty_request(Method::GET, "/items/42")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(header_str(&response, "etag").is_none());

    let body = body_json(response).await;
    assert_eq!(body["message"], "Item not found");
}

#[tokio::test]
async fn test_update_and_delete_item() {
    let app = build_app(&create_test_config(100));
    app.store.insert("widget".to_string(), Some("blue".to_string())).await;

    let response = send(&app, json_request(Method::PATCH, "/items/1", r#"{"name":"gadget"}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "gadget");
    assert_eq!(body["data"]["description"], "blue");

    let response = send(&app, json_request(Method::PUT, "/items/1", r#"{"name":"gizmo"}"#)).await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "gizmo");
    assert!(body["data"].get("description").is_none());

    let response = send(&app, empty_request(Method::DELETE, "/items/1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_health_and_metrics_bypass_pipeline() {
    let app = build_app(&create_test_config(1));

    for _ in 0..3 {
        let response = send(&app, empty_request(Method::GET, "/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "alive"}));
    }

    send(&app, empty_request(Method::GET, "/items")).await;
    send(&app, empty_request(Method::GET, "/items")).await;

    let response = send(&app, empty_request(Method::GET, "/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("rest_pipeline_requests_total 2"));
    assert!(text.contains(r#"rest_pipeline_rejections_total{reason="rate_limit_exceeded"} 1"#));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = create_test_config(100);
    config.server.max_body_size_kb = 1;
    let app = build_app(&config);

    let name = "x".repeat(4096);
    let response = send(
        &app,
        json_request(Method::POST, "/items", &json!({ "name": name }).to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_unregistered_method_gets_not_found() {
    let app = build_app(&create_test_config(100));
    app.store.insert("widget".to_string(), None).await;

    let response = send(&app, json_request(Method::POST, "/items/1", r#"{"name":"x"}"#)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(header_str(&response, "x-ratelimit-limit").is_none());
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], 404);

    let response = send(&app, empty_request(Method::DELETE, "/items")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], 404);

    assert_eq!(app.limiter.stats().total_clients, 0);
    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn test_method_override_header_turns_post_into_get() {
    let app = build_app(&create_test_config(100));
    app.store.insert("widget".to_string(), None).await;

    // No content type: as a POST this would be a 415
    let response = send(
        &app,
        request(Method::POST, "/items")
            .header("x-http-method-override", "GET")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let etag = header_str(&response, "etag").unwrap().to_string();
    assert_eq!(header_str(&response, "x-pagination-total-count"), Some("1"));

    let response = send(
        &app,
        request(Method::POST, "/items")
            .header("x-http-method-override", "GET")
            .header(header::IF_NONE_MATCH, etag.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn test_method_override_query_parameter() {
    let app = build_app(&create_test_config(100));
    app.store.insert("widget".to_string(), Some("blue".to_string())).await;

    let response = send(
        &app,
        json_request(Method::POST, "/items/1?_method=PATCH", r#"{"name":"gadget"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["name"], "gadget");
    assert_eq!(body["data"]["description"], "blue");

    // Overridden to PUT, the body rules still apply
    let response = send(&app, json_request(Method::POST, "/items/1?_method=PUT", "{}")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_method_override_can_be_disabled() {
    let mut config = create_test_config(100);
    config.validation.method_override = false;
    let app = build_app(&config);

    let response = send(
        &app,
        request(Method::POST, "/items")
            .header("x-http-method-override", "GET")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_disabled_limiter_counts_but_never_denies() {
    let mut config = create_test_config(2);
    config.rate_limit.enabled = false;
    let app = build_app(&config);

    for expected_remaining in ["1", "0", "0", "0", "0"] {
        let response = send(&app, empty_request(Method::GET, "/items")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "x-ratelimit-limit"), Some("2"));
        assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some(expected_remaining));
        assert!(header_str(&response, "retry-after").is_none());
    }

    assert_eq!(app.limiter.usage("ip:unknown").map(|(count, _)| count), Some(5));
    assert_eq!(app.metrics.rejections("rate_limit_exceeded"), 0);
}
