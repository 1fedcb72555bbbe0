//! Metrics collection and reporting

use crate::error::Rejection;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pipeline metrics snapshot
#[derive(Debug, Clone)]
pub struct SystemMetrics {
    /// Requests that entered the pipeline
    pub total_requests: u64,

    /// Requests answered with the success envelope
    pub handled: u64,

    /// Conditional GETs answered with 304
    pub not_modified: u64,

    /// Requests rejected before reaching a handler, 404s included
    pub rejected: u64,

    /// Handler failures propagated to the host
    pub handler_errors: u64,

    /// Average response time (ms)
    pub avg_response_time_ms: f64,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

/// Latency histogram buckets (in milliseconds)
const LATENCY_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0];

/// Rejection kinds in export order
const REJECTION_KINDS: &[&str] = &[
    "rate_limit_exceeded",
    "unsupported_media_type",
    "malformed_body",
    "empty_body",
    "route_not_found",
];

/// Histogram for tracking latency distribution
#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: Vec<(f64, Arc<AtomicU64>)>,
    sum: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    fn new(buckets: &[f64]) -> Self {
        let bucket_counters = buckets
            .iter()
            .map(|&b| (b, Arc::new(AtomicU64::new(0))))
            .collect();

        Self {
            buckets: bucket_counters,
            sum: Arc::new(AtomicU64::new(0)),
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    fn observe(&self, value: f64) {
        self.sum.fetch_add(value as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        // Cumulative: every bucket >= value is incremented
        for (bucket, counter) in &self.buckets {
            if value <= *bucket {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn export_prometheus(&self, name: &str, help: &str) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} histogram", name);

        for (bucket, counter) in &self.buckets {
            let count = counter.load(Ordering::Relaxed);
            let _ = writeln!(output, "{}_bucket{{le=\"{}\"}} {}", name, bucket, count);
        }

        let total_count = self.count.load(Ordering::Relaxed);
        let _ = writeln!(output, "{}_bucket{{le=\"+Inf\"}} {}", name, total_count);

        let sum = self.sum.load(Ordering::Relaxed) as f64;
        let _ = writeln!(output, "{}_sum {:.3}", name, sum);
        let _ = writeln!(output, "{}_count {}", name, total_count);

        output
    }
}

/// Metrics collector
pub struct MetricsCollector {
    start_time: Instant,
    total_requests: AtomicU64,
    total_response_time_ms: AtomicU64,
    handled: AtomicU64,
    not_modified: AtomicU64,
    handler_errors: AtomicU64,
    rejections: [AtomicU64; 5],
    request_latency: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            total_response_time_ms: AtomicU64::new(0),
            handled: AtomicU64::new(0),
            not_modified: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            rejections: Default::default(),
            request_latency: Histogram::new(LATENCY_BUCKETS),
        }
    }

    /// Record a request that went through the pipeline
    pub fn record_request(&self, response_time: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let ms = response_time.as_millis() as u64;
        self.total_response_time_ms.fetch_add(ms, Ordering::Relaxed);
        self.request_latency.observe(ms as f64);
    }

    pub fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_modified(&self) {
        self.not_modified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, rejection: &Rejection) {
        if let Some(slot) = REJECTION_KINDS.iter().position(|k| *k == rejection.kind()) {
            self.rejections[slot].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Rejections counted for a kind label, e.g. `empty_body`
    pub fn rejections(&self, kind: &str) -> u64 {
        REJECTION_KINDS
            .iter()
            .position(|k| *k == kind)
            .map(|slot| self.rejections[slot].load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> SystemMetrics {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_response_time = self.total_response_time_ms.load(Ordering::Relaxed);

        let avg_response_time_ms = if total_requests > 0 {
            total_response_time as f64 / total_requests as f64
        } else {
            0.0
        };

        SystemMetrics {
            total_requests,
            handled: self.handled.load(Ordering::Relaxed),
            not_modified: self.not_modified.load(Ordering::Relaxed),
            rejected: self.rejections.iter().map(|c| c.load(Ordering::Relaxed)).sum(),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            avg_response_time_ms,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Export metrics in Prometheus format
    pub fn export_prometheus(&self) -> String {
        let metrics = self.get_metrics();

        let mut output = format!(
            "# HELP rest_pipeline_requests_total Total number of requests\n\
             # TYPE rest_pipeline_requests_total counter\n\
             rest_pipeline_requests_total {}\n\
             \n\
             # HELP rest_pipeline_handled_total Requests answered by a handler\n\
             # TYPE rest_pipeline_handled_total counter\n\
             rest_pipeline_handled_total {}\n\
             \n\
             # HELP rest_pipeline_not_modified_total Conditional requests answered with 304\n\
             # TYPE rest_pipeline_not_modified_total counter\n\
             rest_pipeline_not_modified_total {}\n\
             \n\
             # HELP rest_pipeline_handler_errors_total Handler failures\n\
             # TYPE rest_pipeline_handler_errors_total counter\n\
             rest_pipeline_handler_errors_total {}\n\
             \n\
             # HELP rest_pipeline_avg_response_time_ms Average response time in milliseconds\n\
             # TYPE rest_pipeline_avg_response_time_ms gauge\n\
             rest_pipeline_avg_response_time_ms {:.2}\n\
             \n\
             # HELP rest_pipeline_uptime_seconds Uptime in seconds\n\
             # TYPE rest_pipeline_uptime_seconds counter\n\
             rest_pipeline_uptime_seconds {}\n\
             \n\
             # HELP rest_pipeline_rejections_total Requests rejected before dispatch\n\
             # TYPE rest_pipeline_rejections_total counter\n",
            metrics.total_requests,
            metrics.handled,
            metrics.not_modified,
            metrics.handler_errors,
            metrics.avg_response_time_ms,
            metrics.uptime_secs,
        );

        for kind in REJECTION_KINDS {
            let _ = writeln!(
                output,
                "rest_pipeline_rejections_total{{reason=\"{}\"}} {}",
                kind,
                self.rejections(kind)
            );
        }
        output.push('\n');

        output.push_str(&self.request_latency.export_prometheus(
            "rest_pipeline_request_duration_ms",
            "Request duration in milliseconds"
        ));

        output
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
