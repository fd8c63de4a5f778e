//! # Metrics
//!
//! Prometheus metrics for monitoring the controller and the receive adapter.
//!
//! ## Metrics Exposed
//!
//! - `gitlab_source_reconciliations_total` - Total number of reconciliations
//! - `gitlab_source_reconciliation_errors_total` - Total number of reconciliation errors
//! - `gitlab_source_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `gitlab_source_requeues_total` - Requeues by reason
//! - `gitlab_source_webhook_operations_total` - GitLab hook API calls by operation and outcome
//! - `gitlab_source_receive_adapters_created_total` - Receive adapter services created
//! - `gitlab_adapter_events_received_total` - Webhook deliveries accepted, by event type
//! - `gitlab_adapter_requests_rejected_total` - Webhook deliveries rejected, by reason
//! - `gitlab_adapter_send_failures_total` - CloudEvents the sink did not acknowledge

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gitlab_source_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gitlab_source_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "gitlab_source_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("gitlab_source_requeues_total", "Total number of requeues by reason"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static WEBHOOK_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gitlab_source_webhook_operations_total",
            "Total number of GitLab hook API calls",
        ),
        &["operation", "outcome"],
    )
    .expect("Failed to create WEBHOOK_OPERATIONS_TOTAL metric - this should never happen")
});

static RECEIVE_ADAPTERS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gitlab_source_receive_adapters_created_total",
        "Total number of receive adapter services created",
    )
    .expect("Failed to create RECEIVE_ADAPTERS_CREATED_TOTAL metric - this should never happen")
});

static EVENTS_RECEIVED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gitlab_adapter_events_received_total",
            "Total number of webhook deliveries translated into CloudEvents",
        ),
        &["event_type"],
    )
    .expect("Failed to create EVENTS_RECEIVED_TOTAL metric - this should never happen")
});

static REQUESTS_REJECTED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gitlab_adapter_requests_rejected_total",
            "Total number of webhook deliveries rejected",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUESTS_REJECTED_TOTAL metric - this should never happen")
});

static SEND_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gitlab_adapter_send_failures_total",
        "Total number of CloudEvents the sink did not acknowledge",
    )
    .expect("Failed to create SEND_FAILURES_TOTAL metric - this should never happen")
});

/// Register controller metrics
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WEBHOOK_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECEIVE_ADAPTERS_CREATED_TOTAL.clone()))?;

    Ok(())
}

/// Register receive adapter metrics
pub fn register_adapter_metrics() -> Result<()> {
    REGISTRY.register(Box::new(EVENTS_RECEIVED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUESTS_REJECTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SEND_FAILURES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_webhook_operation(operation: &str, outcome: &str) {
    WEBHOOK_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn increment_receive_adapters_created() {
    RECEIVE_ADAPTERS_CREATED_TOTAL.inc();
}

pub fn increment_events_received(event_type: &str) {
    EVENTS_RECEIVED_TOTAL.with_label_values(&[event_type]).inc();
}

pub fn increment_requests_rejected(reason: &str) {
    REQUESTS_REJECTED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_send_failures() {
    SEND_FAILURES_TOTAL.inc();
}

/// Encode every registered metric in the Prometheus text format
pub fn gather_text() -> Result<Vec<u8>> {
    use prometheus::Encoder;
    let mut buffer = Vec::new();
    prometheus::TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}
