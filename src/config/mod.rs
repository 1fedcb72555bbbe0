//! Configuration management for the admission pipeline

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod loader;
pub mod validation;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Maximum request body size in KB
    #[serde(default = "default_max_body_size_kb")]
    pub max_body_size_kb: usize,

    /// Upper bound on reading a request body, in milliseconds
    #[serde(default = "default_body_read_timeout_ms")]
    pub body_read_timeout_ms: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Deny requests over the limit. When false, requests are still counted
    /// and the quota headers still sent.
    ///
    /// Defaults to `true`, so over-limit requests are refused out of the box.
    /// Count-only limiting, the usual default for this kind of IP limiter,
    /// needs `enabled = false`.
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,

    /// Maximum requests per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Interval of the stale-record sweep in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Prefix prepended to every identity key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Where the client identity comes from
    #[serde(default)]
    pub identity: IdentitySource,
}

/// Source of the rate limit identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentitySource {
    /// Remote socket address of the connection
    #[default]
    PeerAddress,
    /// First entry of `X-Forwarded-For`, falling back to the peer address
    ForwardedFor,
    /// Value of an arbitrary request header, e.g. an API key
    Header { name: String },
}

/// Request validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Require `Content-Type` to be exactly `application/json`
    #[serde(default = "default_strict_content_type")]
    pub strict_content_type: bool,

    /// Let a POST request name its effective method through the
    /// `X-HTTP-Method-Override` header or a `_method` query parameter
    #[serde(default = "default_true")]
    pub method_override: bool,
}

/// Response shaping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Extra header names exposed to cross-origin callers
    #[serde(default)]
    pub expose_headers: Vec<String>,

    /// Expose the `X-RateLimit-*` headers
    #[serde(default = "default_true")]
    pub expose_rate_limit_headers: bool,

    /// Expose the pagination headers
    #[serde(default = "default_true")]
    pub expose_pagination_headers: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_server_host() -> String { "0.0.0.0".to_string() }
fn default_server_port() -> u16 { 8080 }
fn default_max_body_size_kb() -> usize { 1024 }
fn default_body_read_timeout_ms() -> u64 { 5000 }
fn default_rate_limit_enabled() -> bool { true }
fn default_max_requests() -> u64 { 100 }
fn default_window_secs() -> u64 { 60 }
fn default_cleanup_interval() -> u64 { 300 } // 5 minutes
fn default_key_prefix() -> String { "ip".to_string() }
fn default_strict_content_type() -> bool { true }
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            max_body_size_kb: default_max_body_size_kb(),
            body_read_timeout_ms: default_body_read_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Maximum body size in bytes
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_size_kb.saturating_mul(1024)
    }

    /// Body read timeout as a `Duration`
    pub fn body_read_timeout(&self) -> Duration {
        Duration::from_millis(self.body_read_timeout_ms)
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            cleanup_interval_secs: default_cleanup_interval(),
            key_prefix: default_key_prefix(),
            identity: IdentitySource::default(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_content_type: default_strict_content_type(),
            method_override: default_true(),
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            expose_headers: Vec::new(),
            expose_rate_limit_headers: true,
            expose_pagination_headers: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        loader::load_config(path)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        loader::load_config_with_env(path)
    }

    /// Validate this configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        validation::validate_config(self)
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            rate_limit: RateLimitSettings::default(),
            validation: ValidationConfig::default(),
            response: ResponseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
