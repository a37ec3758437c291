//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Gateway request outcomes by method
//! - Push notifications by kind
//! - Session lifecycle transitions
//! - Scheduler work runs by outcome
//! - Number of accounts with an armed wake timer

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Gateway requests by method and outcome ("ok", "timeout", "remote_error", ...)
pub static GATEWAY_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gateway_requests_total", "Total number of gateway requests")
            .namespace("farm_runner"),
        &["method", "outcome"],
    )
    .expect("Failed to create GATEWAY_REQUESTS_TOTAL metric")
});

/// Push notifications handled, by kind
pub static PUSH_NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("push_notifications_total", "Total number of recognized push notifications")
            .namespace("farm_runner"),
        &["kind"],
    )
    .expect("Failed to create PUSH_NOTIFICATIONS_TOTAL metric")
});

/// Session status transitions, by target status
pub static SESSION_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("session_transitions_total", "Total number of session status transitions")
            .namespace("farm_runner"),
        &["status"],
    )
    .expect("Failed to create SESSION_TRANSITIONS_TOTAL metric")
});

/// Work callback runs, by outcome ("ok", "error", "panic")
pub static SCHEDULER_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scheduler_runs_total", "Total number of scheduled work runs")
            .namespace("farm_runner"),
        &["outcome"],
    )
    .expect("Failed to create SCHEDULER_RUNS_TOTAL metric")
});

/// Accounts currently holding a wake timer
pub static SCHEDULED_ACCOUNTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "scheduled_accounts",
            "Number of accounts with an armed wake timer",
        )
        .namespace("farm_runner"),
    )
    .expect("Failed to create SCHEDULED_ACCOUNTS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(GATEWAY_REQUESTS_TOTAL.clone()))
        .expect("Failed to register GATEWAY_REQUESTS_TOTAL");
    registry
        .register(Box::new(PUSH_NOTIFICATIONS_TOTAL.clone()))
        .expect("Failed to register PUSH_NOTIFICATIONS_TOTAL");
    registry
        .register(Box::new(SESSION_TRANSITIONS_TOTAL.clone()))
        .expect("Failed to register SESSION_TRANSITIONS_TOTAL");
    registry
        .register(Box::new(SCHEDULER_RUNS_TOTAL.clone()))
        .expect("Failed to register SCHEDULER_RUNS_TOTAL");
    registry
        .register(Box::new(SCHEDULED_ACCOUNTS.clone()))
        .expect("Failed to register SCHEDULED_ACCOUNTS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_request(method: &str, outcome: &str) {
    GATEWAY_REQUESTS_TOTAL.with_label_values(&[method, outcome]).inc();
}

pub fn record_push_notification(kind: &str) {
    PUSH_NOTIFICATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_session_transition(status: &str) {
    SESSION_TRANSITIONS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_scheduler_run(outcome: &str) {
    SCHEDULER_RUNS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn set_scheduled_accounts(count: usize) {
    SCHEDULED_ACCOUNTS.set(count as i64);
}
