//! HTTP method override for clients that can only send GET and POST

use axum::extract::{Query, Request};
use axum::http::{HeaderMap, HeaderName, Method, Uri};
use serde::Deserialize;
use tracing::debug;

/// Header naming the effective method of a POST request
pub const X_HTTP_METHOD_OVERRIDE: HeaderName = HeaderName::from_static("x-http-method-override");

#[derive(Debug, Deserialize)]
struct MethodParam {
    #[serde(rename = "_method")]
    method: Option<String>,
}

/// Effective method of a request.
///
/// Only POST can be overridden. A non-empty `X-HTTP-Method-Override`
/// header wins over the `_method` query parameter. Unknown method names
/// leave the request as POST.
pub fn effective_method(method: &Method, headers: &HeaderMap, uri: &Uri) -> Method {
    if *method != Method::POST {
        return method.clone();
    }

    let requested = headers
        .get(X_HTTP_METHOD_OVERRIDE)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| {
            Query::<MethodParam>::try_from_uri(uri)
                .ok()
                .and_then(|Query(param)| param.method)
        });

    requested
        .and_then(|name| parse_method(&name))
        .unwrap_or_else(|| method.clone())
}

fn parse_method(name: &str) -> Option<Method> {
    let method = match name.trim().to_ascii_uppercase().as_str() {
        "GET" => Method::GET,
        "HEAD" => Method::HEAD,
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "PATCH" => Method::PATCH,
        "DELETE" => Method::DELETE,
        "OPTIONS" => Method::OPTIONS,
        _ => return None,
    };
    Some(method)
}

/// Rewrite the request method before routing
pub async fn apply_method_override(mut req: Request) -> Request {
    let method = effective_method(req.method(), req.headers(), req.uri());
    if method != *req.method() {
        debug!("Method override: {} -> {}", req.method(), method);
        *req.method_mut() = method;
    }
    req
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(method: Method, header: Option<&str>, uri: &str) -> Method {
        let mut headers = HeaderMap::new();
        if let Some(value) = header {
            headers.insert(X_HTTP_METHOD_OVERRIDE, value.parse().unwrap());
        }
        effective_method(&method, &headers, &uri.parse().unwrap())
    }

    #[test]
    fn test_header_overrides_post() {
        assert_eq!(resolve(Method::POST, Some("GET"), "/items"), Method::GET);
        assert_eq!(resolve(Method::POST, Some("patch"), "/items/1"), Method::PATCH);
    }

    #[test]
    fn test_query_parameter_overrides_post() {
        assert_eq!(resolve(Method::POST, None, "/items/1?_method=DELETE"), Method::DELETE);
    }

    #[test]
    fn test_header_wins_over_query_parameter() {
        assert_eq!(resolve(Method::POST, Some("PUT"), "/items/1?_method=DELETE"), Method::PUT);
    }

    #[test]
    fn test_only_post_is_overridden() {
        assert_eq!(resolve(Method::GET, Some("DELETE"), "/items/1"), Method::GET);
        assert_eq!(resolve(Method::PUT, None, "/items/1?_method=GET"), Method::PUT);
    }

    #[test]
    fn test_unknown_method_keeps_post() {
        assert_eq!(resolve(Method::POST, Some("FETCH"), "/items"), Method::POST);
        assert_eq!(resolve(Method::POST, Some("  "), "/items"), Method::POST);
        assert_eq!(resolve(Method::POST, None, "/items?page=2"), Method::POST);
    }

    #[tokio::test]
    async fn test_request_is_rewritten() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/items")
            .header(X_HTTP_METHOD_OVERRIDE, "GET")
            .body(axum::body::Body::empty())
            .unwrap();

        let req = apply_method_override(req).await;
        assert_eq!(req.method(), Method::GET);
    }
}
