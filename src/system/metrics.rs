//! Prometheus metrics
//!
//! All metrics live in a private registry so `gather()` only reports what
//! this service registers.

use crate::core::error::Result;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Counters for ticket, note and user operations plus HTTP traffic
pub struct Metrics {
    /// Ticket numbers handed out by the counter
    pub tickets_allocated: IntCounter,
    /// Notes persisted
    pub notes_created: IntCounter,
    /// Partial note updates applied
    pub notes_updated: IntCounter,
    /// Notes removed
    pub notes_deleted: IntCounter,
    /// Users registered
    pub users_created: IntCounter,
    /// User updates applied
    pub users_updated: IntCounter,
    /// Users removed
    pub users_deleted: IntCounter,
    /// HTTP requests by method and status code
    pub http_requests: IntCounterVec,
    /// HTTP request latency in seconds
    pub request_duration: Histogram,
}

impl Metrics {
    /// Create and register every metric
    pub fn new() -> Result<Self> {
        let metrics = Self {
            tickets_allocated: counter("tn_tickets_allocated_total", "Ticket numbers allocated")?,
            notes_created: counter("tn_notes_created_total", "Notes created")?,
            notes_updated: counter("tn_notes_updated_total", "Notes updated")?,
            notes_deleted: counter("tn_notes_deleted_total", "Notes deleted")?,
            users_created: counter("tn_users_created_total", "Users created")?,
            users_updated: counter("tn_users_updated_total", "Users updated")?,
            users_deleted: counter("tn_users_deleted_total", "Users deleted")?,
            http_requests: IntCounterVec::new(
                Opts::new("tn_http_requests_total", "HTTP requests handled"),
                &["method", "status"],
            )?,
            request_duration: Histogram::with_opts(
                HistogramOpts::new(
                    "tn_http_request_duration_seconds",
                    "HTTP request duration in seconds",
                )
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            )?,
        };

        for collector in [
            &metrics.tickets_allocated,
            &metrics.notes_created,
            &metrics.notes_updated,
            &metrics.notes_deleted,
            &metrics.users_created,
            &metrics.users_updated,
            &metrics.users_deleted,
        ] {
            REGISTRY.register(Box::new(collector.clone()))?;
        }
        REGISTRY.register(Box::new(metrics.http_requests.clone()))?;
        REGISTRY.register(Box::new(metrics.request_duration.clone()))?;

        Ok(metrics)
    }

    /// Get the global metrics instance
    pub fn global() -> &'static Metrics {
        static INSTANCE: Lazy<Metrics> =
            Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
        &INSTANCE
    }
}

fn counter(name: &str, help: &str) -> Result<IntCounter> {
    Ok(IntCounter::new(name, help)?)
}

/// Timer for measuring operation duration with automatic histogram recording
pub struct Timer {
    start: Instant,
    histogram: Histogram,
}

impl Timer {
    /// Start a new timer
    pub fn start(histogram: Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    /// Record the elapsed time and consume the timer
    pub fn finish(self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Register all metrics up front so the first scrape sees them at zero
pub fn init_registry() {
    let _ = Metrics::global();
}

/// Encode every registered metric in the Prometheus text format
pub fn gather() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::core::error::Error::internal(e.to_string()))
}
