//! Suggestion Metrics
//!
//! Prometheus metrics for the suggestion engines and the periodic sweep

use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};

static SWEEP_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "suggestion_sweep_duration_seconds",
        "Duration of a full suggestion sweep over all users",
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    )
    .expect("Failed to register suggestion sweep duration metric")
});

static SWEEP_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "suggestion_sweep_failures_total",
        "Per-user suggestion failures during sweeps",
        &["engine"]
    )
    .expect("Failed to register suggestion sweep failures metric")
});

static SWEEPS_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "suggestion_sweeps_skipped_total",
        "Sweeps skipped because a previous sweep was still running"
    )
    .expect("Failed to register skipped sweeps metric")
});

static SUGGESTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "suggestions_produced_total",
        "Suggestions written back to user documents",
        &["kind"]
    )
    .expect("Failed to register suggestions produced metric")
});

pub fn record_sweep_duration(duration: Duration) {
    SWEEP_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record a per-user failure for the given engine (friends/events)
pub fn record_sweep_failure(engine: &str) {
    SWEEP_FAILURES_TOTAL.with_label_values(&[engine]).inc();
}

pub fn record_sweep_skipped() {
    SWEEPS_SKIPPED_TOTAL.inc();
}

/// Record suggestions produced by kind (friends/events)
pub fn record_suggestions(kind: &str, count: usize) {
    SUGGESTIONS_TOTAL
        .with_label_values(&[kind])
        .inc_by(count as u64);
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
