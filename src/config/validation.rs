//! Configuration validation

use super::*;
use crate::error::{PipelineError, Result};
use axum::http::HeaderName;

/// Accepted values for `logging.format`
const LOG_FORMATS: &[&str] = &["json", "compact", "pretty"];

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server_config(&config.server)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_response_config(&config.response)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validate server configuration
fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.host.is_empty() {
        return Err(PipelineError::Config(
            "Server host cannot be empty".to_string()
        ));
    }

    if config.port == 0 {
        return Err(PipelineError::Config(
            "Server port must be greater than 0".to_string()
        ));
    }

    if config.max_body_size_kb == 0 {
        return Err(PipelineError::Config(
            "Maximum body size must be greater than 0".to_string()
        ));
    }

    if config.body_read_timeout_ms == 0 {
        return Err(PipelineError::Config(
            "Body read timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate rate limit configuration
fn validate_rate_limit_config(config: &RateLimitSettings) -> Result<()> {
    if config.enabled && config.max_requests == 0 {
        return Err(PipelineError::Config(
            "Rate limit max_requests must be greater than 0 when enabled".to_string()
        ));
    }

    if config.window_secs == 0 {
        return Err(PipelineError::Config(
            "Rate limit window must be greater than 0".to_string()
        ));
    }

    if config.cleanup_interval_secs == 0 {
        return Err(PipelineError::Config(
            "Rate limit cleanup interval must be greater than 0".to_string()
        ));
    }

    if let IdentitySource::Header { name } = &config.identity {
        validate_header_name(name, "rate_limit.identity.name")?;
    }

    Ok(())
}

/// Validate response configuration
fn validate_response_config(config: &ResponseConfig) -> Result<()> {
    for name in &config.expose_headers {
        validate_header_name(name, "response.expose_headers")?;
    }
    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &LoggingConfig) -> Result<()> {
    if !LOG_FORMATS.contains(&config.format.as_str()) {
        return Err(PipelineError::Config(format!(
            "Unknown log format '{}' (expected one of: {})",
            config.format,
            LOG_FORMATS.join(", ")
        )));
    }
    Ok(())
}

fn validate_header_name(name: &str, field: &str) -> Result<()> {
    HeaderName::from_bytes(name.as_bytes())
        .map(|_| ())
        .map_err(|_| PipelineError::Config(format!("Invalid header name '{}' in {}", name, field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        assert!(validate_config(&Config::default_config()).is_ok());
    }

    #[test]
    fn test_zero_limit_only_rejected_when_enabled() {
        let mut config = Config::default_config();
        config.rate_limit.max_requests = 0;
        assert!(validate_config(&config).is_err());

        config.rate_limit.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = Config::default_config();
        config.rate_limit.window_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_header_names_rejected() {
        let mut config = Config::default_config();
        config.response.expose_headers = vec!["X-Total Count".to_string()];
        assert!(validate_config(&config).is_err());

        let mut config = Config::default_config();
        config.rate_limit.identity = IdentitySource::Header { name: String::new() };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = Config::default_config();
        config.logging.format = "xml".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = Config::default_config();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }
}
