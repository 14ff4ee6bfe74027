//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, path, and status
//! - HTTP request latency histograms
//! - Chat events published and publish failures
//! - Inbound events dropped by the dispatcher
//! - Notification outcomes (sent, suppressed, failed)

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace("rental_chat"),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace("rental_chat")
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Chat events published, by message kind
pub static CHAT_EVENTS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chat_events_published_total", "Chat events published to user channels")
            .namespace("rental_chat"),
        &["kind"],
    )
    .expect("Failed to create CHAT_EVENTS_PUBLISHED_TOTAL metric")
});

/// Publish failures, by transport error kind
pub static CHAT_PUBLISH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chat_publish_failures_total", "Chat events that could not be published")
            .namespace("rental_chat"),
        &["reason"],
    )
    .expect("Failed to create CHAT_PUBLISH_FAILURES_TOTAL metric")
});

/// Inbound events dropped before reaching a handler
pub static CHAT_INBOUND_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chat_inbound_dropped_total", "Inbound chat events dropped by the dispatcher")
            .namespace("rental_chat"),
        &["reason"], // "malformed", "lagged"
    )
    .expect("Failed to create CHAT_INBOUND_DROPPED_TOTAL metric")
});

/// Notification decisions
pub static CHAT_NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chat_notifications_total", "Chat email notification outcomes")
            .namespace("rental_chat"),
        &["outcome"], // "sent", "suppressed", "failed"
    )
    .expect("Failed to create CHAT_NOTIFICATIONS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(CHAT_EVENTS_PUBLISHED_TOTAL.clone()))
        .expect("Failed to register CHAT_EVENTS_PUBLISHED_TOTAL");
    registry
        .register(Box::new(CHAT_PUBLISH_FAILURES_TOTAL.clone()))
        .expect("Failed to register CHAT_PUBLISH_FAILURES_TOTAL");
    registry
        .register(Box::new(CHAT_INBOUND_DROPPED_TOTAL.clone()))
        .expect("Failed to register CHAT_INBOUND_DROPPED_TOTAL");
    registry
        .register(Box::new(CHAT_NOTIFICATIONS_TOTAL.clone()))
        .expect("Failed to register CHAT_NOTIFICATIONS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn record_published(kind: &str) {
    Lazy::force(&REGISTRY);
    CHAT_EVENTS_PUBLISHED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_publish_failure(reason: &str) {
    Lazy::force(&REGISTRY);
    CHAT_PUBLISH_FAILURES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_inbound_dropped(reason: &str, count: u64) {
    Lazy::force(&REGISTRY);
    CHAT_INBOUND_DROPPED_TOTAL
        .with_label_values(&[reason])
        .inc_by(count);
}

pub fn record_notification(outcome: &str) {
    Lazy::force(&REGISTRY);
    CHAT_NOTIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
}
