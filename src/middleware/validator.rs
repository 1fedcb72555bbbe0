//! Request body validation for mutating methods

use crate::config::ValidationConfig;
use crate::error::Rejection;
use crate::pipeline::RequestContext;
use axum::http::Method;
use serde_json::Value;
use tracing::{debug, warn};

/// The only media type accepted for request bodies
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content-type and body-presence rules for POST, PUT and PATCH
#[derive(Debug, Clone)]
pub struct RequestValidator {
    strict_content_type: bool,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl RequestValidator {
    /// Create a new validator
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            strict_content_type: config.strict_content_type,
        }
    }

    /// Methods that must carry a JSON body
    pub fn requires_body(method: &Method) -> bool {
        matches!(*method, Method::POST | Method::PUT | Method::PATCH)
    }

    /// Validate a request. Methods without a body always pass.
    pub fn validate(&self, ctx: &RequestContext) -> Result<(), Rejection> {
        if !Self::requires_body(ctx.method()) {
            return Ok(());
        }

        self.validate_content_type(ctx.content_type())?;
        Self::validate_body(ctx)?;

        debug!("Request body validation passed");
        Ok(())
    }

    /// Check the `Content-Type` header without touching the body
    pub fn validate_content_type(&self, content_type: Option<&str>) -> Result<(), Rejection> {
        let accepted = match content_type {
            Some(value) if self.strict_content_type => value == JSON_CONTENT_TYPE,
            Some(value) => value
                .split(';')
                .next()
                .map(|essence| essence.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
                .unwrap_or(false),
            None => false,
        };

        if !accepted {
            warn!("Validation failed: unsupported content type {:?}", content_type);
            return Err(Rejection::UnsupportedMediaType {
                content_type: content_type.map(str::to_string),
            });
        }

        Ok(())
    }

    fn validate_body(ctx: &RequestContext) -> Result<(), Rejection> {
        let body = ctx.json_body().map_err(|e| {
            warn!("Validation failed: malformed JSON body ({})", e);
            Rejection::MalformedBody(e.to_string())
        })?;

        if is_empty_payload(body) {
            warn!("Validation failed: empty JSON payload");
            return Err(Rejection::EmptyBody);
        }

        Ok(())
    }
}

/// A payload is empty unless it is an object or array with at least one element
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap};
    use bytes::Bytes;

    fn context(method: Method, content_type: Option<&str>, body: &str) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.insert(header::CONTENT_TYPE, ct.parse().unwrap());
        }
        RequestContext::new(method, "/items".parse().unwrap(), headers, Bytes::from(body.to_string()))
    }

    fn strict() -> RequestValidator {
        RequestValidator::default()
    }

    #[test]
    fn test_methods_without_body_pass() {
        for method in [Method::GET, Method::DELETE, Method::HEAD, Method::OPTIONS] {
            let ctx = context(method, Some("text/plain"), "garbage");
            assert!(strict().validate(&ctx).is_ok());
        }
    }

    #[test]
    fn test_valid_json_body() {
        for method in [Method::POST, Method::PUT, Method::PATCH] {
            let ctx = context(method, Some("application/json"), r#"{"name":"widget"}"#);
            assert!(strict().validate(&ctx).is_ok());
        }
        let ctx = context(Method::POST, Some("application/json"), "[1]");
        assert!(strict().validate(&ctx).is_ok());
    }

    #[test]
    fn test_wrong_content_type_rejected_before_parsing() {
        let ctx = context(Method::POST, Some("text/plain"), "{not json");
        assert_eq!(
            strict().validate(&ctx),
            Err(Rejection::UnsupportedMediaType { content_type: Some("text/plain".to_string()) })
        );

        let ctx = context(Method::PUT, None, r#"{"a":1}"#);
        assert_eq!(
            strict().validate(&ctx),
            Err(Rejection::UnsupportedMediaType { content_type: None })
        );
    }

    #[test]
    fn test_strict_mode_rejects_parameters_and_case() {
        let ctx = context(Method::POST, Some("application/json; charset=utf-8"), r#"{"a":1}"#);
        assert!(matches!(strict().validate(&ctx), Err(Rejection::UnsupportedMediaType { .. })));

        let ctx = context(Method::POST, Some("Application/JSON"), r#"{"a":1}"#);
        assert!(matches!(strict().validate(&ctx), Err(Rejection::UnsupportedMediaType { .. })));
    }

    #[test]
    fn test_lenient_mode_accepts_parameters_and_case() {
        let lenient = RequestValidator::new(ValidationConfig {
            strict_content_type: false,
            ..ValidationConfig::default()
        });

        let ctx = context(Method::POST, Some("application/json; charset=utf-8"), r#"{"a":1}"#);
        assert!(lenient.validate(&ctx).is_ok());

        let ctx = context(Method::POST, Some("Application/JSON"), r#"{"a":1}"#);
        assert!(lenient.validate(&ctx).is_ok());

        let ctx = context(Method::POST, Some("text/json"), r#"{"a":1}"#);
        assert!(lenient.validate(&ctx).is_err());
    }

    #[test]
    fn test_malformed_body() {
        for body in ["{not json", "", "{\"a\":"] {
            let ctx = context(Method::POST, Some("application/json"), body);
            assert!(matches!(strict().validate(&ctx), Err(Rejection::MalformedBody(_))), "{}", body);
        }
    }

    #[test]
    fn test_empty_payload() {
        for body in ["{}", "[]", "null", "\"\"", "0"] {
            let ctx = context(Method::PATCH, Some("application/json"), body);
            assert_eq!(strict().validate(&ctx), Err(Rejection::EmptyBody), "{}", body);
        }
    }
}
