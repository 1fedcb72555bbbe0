//! Admission checks run before a handler

pub mod identity;
pub mod method_override;
pub mod rate_limiter;
pub mod validator;

pub use identity::{resolver_from_config, ForwardedFor, HeaderIdentity, IdentityResolver, PeerAddress};
pub use method_override::{apply_method_override, effective_method, X_HTTP_METHOD_OVERRIDE};
pub use rate_limiter::{Admission, RateLimitConfig, RateLimitStats, RateLimiter};
pub use validator::{RequestValidator, JSON_CONTENT_TYPE};
