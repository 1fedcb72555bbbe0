//! Configuration loader with environment variable support

use super::{validation::validate_config, Config};
use crate::error::Result;
use config::{Environment, File};
use std::path::Path;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "REST_PIPELINE";

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config = config::Config::builder()
        .add_source(File::from(path.as_ref()))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from a TOML file with environment variable overrides
///
/// `REST_PIPELINE__RATE_LIMIT__MAX_REQUESTS=10` overrides `rate_limit.max_requests`.
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config = config::Config::builder()
        .add_source(File::from(path.as_ref()))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
        )
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;
    Ok(cfg)
}
