//! Per-identity fixed window rate limiter

use crate::config::RateLimitSettings;
use crate::shutdown::ShutdownNotifier;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Maximum requests allowed in the current window
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Requests left in the current window
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Unix timestamp at which the current window ends
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u64,
    /// Time window duration
    pub window_duration: Duration,
    /// Whether over-limit requests are denied
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_duration: Duration::from_secs(60),
            enabled: true,
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            max_requests: settings.max_requests,
            window_duration: Duration::from_secs(settings.window_secs),
            enabled: settings.enabled,
        }
    }
}

/// Window state for one identity
#[derive(Debug, Clone)]
struct RequestRecord {
    count: u64,
    window_start: Instant,
    window_started_at: DateTime<Utc>,
}

impl RequestRecord {
    fn starting_at(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            window_started_at: Utc::now(),
        }
    }

    fn restart(&mut self, now: Instant) {
        self.count = 0;
        self.window_start = now;
        self.window_started_at = Utc::now();
    }
}

/// Result of a single admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured limit
    pub limit: u64,
    /// Requests counted in the current window, this one included
    pub count: u64,
    /// `max(0, limit - count)`
    pub remaining: u64,
    /// End of the current window
    pub reset_at: DateTime<Utc>,
    /// Time left until the window resets
    pub retry_after: Duration,
}

impl Admission {
    /// Write the `X-RateLimit-*` headers, plus `Retry-After` when denied
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_at.timestamp()));

        if !self.allowed {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs()));
        }
    }

    /// Seconds until reset, rounded up so clients never retry early
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Rate limiter implementation with lock-free DashMap
///
/// The read-modify-write of a record happens while the shard lock of its
/// entry is held, so concurrent requests for one identity are serialized.
pub struct RateLimiter {
    config: RateLimitConfig,
    records: Arc<DashMap<String, RequestRecord>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            records: Arc::new(DashMap::new()),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count a request for `identity` and decide whether it is admitted.
    ///
    /// Counting happens even when limiting is disabled so the derived
    /// headers stay meaningful.
    pub fn admit(&self, identity: &str) -> Admission {
        let now = Instant::now();
        let window = self.config.window_duration;

        let mut entry = self
            .records
            .entry(identity.to_string())
            .or_insert_with(|| RequestRecord::starting_at(now));
        let record = entry.value_mut();

        // Check if window has expired
        if now.duration_since(record.window_start) >= window {
            record.restart(now);
        }

        record.count = record.count.saturating_add(1);

        let count = record.count;
        let limit = self.config.max_requests;
        let allowed = !self.config.enabled || count <= limit;
        let retry_after = window.saturating_sub(now.duration_since(record.window_start));
        let reset_at = record.window_started_at
            + chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        drop(entry);

        if allowed {
            debug!("Request allowed for client: {} ({}/{})", identity, count, limit);
        } else {
            warn!(
                "Rate limit exceeded for client: {} ({} requests in window)",
                identity, count
            );
        }

        Admission {
            allowed,
            limit,
            count,
            remaining: limit.saturating_sub(count),
            reset_at,
            retry_after,
        }
    }

    /// Get current usage for a client
    pub fn usage(&self, identity: &str) -> Option<(u64, Duration)> {
        self.records.get(identity).map(|record| {
            let elapsed = Instant::now().duration_since(record.window_start);
            (record.count, elapsed)
        })
    }

    /// Reset rate limit for a client
    pub fn reset(&self, identity: &str) {
        self.records.remove(identity);
        debug!("Rate limit reset for client: {}", identity);
    }

    /// Remove records whose window has expired, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.records.len();

        self.records.retain(|_, record| {
            now.duration_since(record.window_start) < self.config.window_duration
        });

        let removed = before.saturating_sub(self.records.len());
        debug!("Cleaned up {} expired rate limit records", removed);
        removed
    }

    /// Start background cleanup task, stopped by `shutdown`
    pub fn start_cleanup_task(
        self: Arc<Self>,
        interval: Duration,
        shutdown: ShutdownNotifier,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.cleanup_expired();
                    }
                    _ = shutdown.wait() => {
                        info!("Rate limiter cleanup task stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Get statistics
    pub fn stats(&self) -> RateLimitStats {
        let total_clients = self.records.len();
        let total_requests: u64 = self.records.iter().map(|r| r.value().count).sum();

        RateLimitStats {
            total_clients,
            total_requests,
            config: self.config.clone(),
        }
    }
}

/// Rate limit statistics
#[derive(Debug, Clone)]
pub struct RateLimitStats {
    pub total_clients: usize,
    pub total_requests: u64,
    pub config: RateLimitConfig,
}
