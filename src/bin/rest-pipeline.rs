//! REST Pipeline Server Binary
//!
//! Runs the admission pipeline in front of the in-memory `items` resource.

use rest_pipeline::{
    api::{build_router, handlers::{mount_items, ItemStore}, ApiState, RouteTable},
    config::Config,
    middleware::{RateLimitConfig, RateLimiter},
    observability::{init_observability, MetricsCollector},
    pipeline::Pipeline,
    server::start_server,
    shutdown::ShutdownCoordinator,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration, falling back to defaults without a file
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let from_file = Path::new(&config_path).exists();
    let config = if from_file {
        Config::from_file_with_env(&config_path)?
    } else {
        Config::default_config()
    };
    config.validate()?;

    init_observability(&config.logging.level, &config.logging.format);

    info!("Starting REST Pipeline Server");
    if from_file {
        info!("Configuration loaded and validated from {}", config_path);
    } else {
        info!("No configuration file at {}, using defaults", config_path);
    }

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let metrics = Arc::new(MetricsCollector::new());

    // Initialize rate limiter
    let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::from(&config.rate_limit)));
    let _cleanup = rate_limiter.clone().start_cleanup_task(
        Duration::from_secs(config.rate_limit.cleanup_interval_secs),
        shutdown.subscribe(),
    );
    info!(
        "Rate limiter initialized: {} requests per {}s (enabled: {})",
        config.rate_limit.max_requests, config.rate_limit.window_secs, config.rate_limit.enabled
    );

    let pipeline = Arc::new(Pipeline::from_config(&config, rate_limiter, metrics)?);
    info!("Exposed headers: {}", pipeline.exposed_headers().joined());

    let routes = mount_items(RouteTable::new(), Arc::new(ItemStore::new()));
    let state = ApiState::new(pipeline, &config.server)
        .with_method_override(config.validation.method_override);
    let app = build_router(state, routes)?;

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { shutdown.wait_for_signal().await }
    });

    start_server(&config.server, app, shutdown).await?;

    Ok(())
}
