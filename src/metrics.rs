// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the reconciliation engine.
//!
//! All metrics use the namespace prefix `kube_ensure` and are registered in
//! [`METRICS_REGISTRY`]. The embedding operator decides whether and how to
//! expose them; [`gather_metrics`] renders the registry in text format.
//!
//! # Metrics Categories
//!
//! - **Resource Lifecycle Metrics** - creates, updates, deletes and no-op ensures
//! - **Concurrency Metrics** - optimistic-concurrency conflicts that were retried
//! - **Discovery Metrics** - group versions that could not be listed
//! - **Performance Metrics** - per-object ensure latency

use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all engine metrics
const METRICS_NAMESPACE: &str = "kube_ensure";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Resource Lifecycle Metrics
// ============================================================================

/// Total number of objects created
///
/// Labels:
/// - `kind`: `Kind.group` of the object
pub static RESOURCES_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_created_total"),
        "Total number of objects created by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of objects updated
///
/// Labels:
/// - `kind`: `Kind.group` of the object
pub static RESOURCES_UPDATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_updated_total"),
        "Total number of objects updated by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of objects deleted
///
/// Labels:
/// - `kind`: `Kind.group` of the object
pub static RESOURCES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_deleted_total"),
        "Total number of objects deleted by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of ensures that found the live object already up to date
///
/// Labels:
/// - `kind`: `Kind.group` of the object
pub static RESOURCES_UNCHANGED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_unchanged_total"),
        "Total number of ensures that required no write, by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Concurrency Metrics
// ============================================================================

/// Total number of optimistic-concurrency conflicts that triggered a retry
///
/// Labels:
/// - `kind`: `Kind.group` of the object
pub static CONFLICT_RETRIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_conflict_retries_total"),
        "Total number of write conflicts retried, by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Discovery Metrics
// ============================================================================

/// Total number of group versions that failed to list during discovery
pub static DISCOVERY_FAILURES_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_discovery_failures_total"),
        "Total number of group versions that could not be discovered",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Performance Metrics
// ============================================================================

/// Duration of a single object ensure in seconds
///
/// Labels:
/// - `kind`: `Kind.group` of the object
pub static ENSURE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_ensure_duration_seconds"),
        "Duration of a single object ensure in seconds by kind",
    )
    .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]);
    let histogram = HistogramVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record an object creation
pub fn record_resource_created(kind: &str) {
    RESOURCES_CREATED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record an object update
pub fn record_resource_updated(kind: &str) {
    RESOURCES_UPDATED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record an object deletion
pub fn record_resource_deleted(kind: &str) {
    RESOURCES_DELETED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record an ensure that needed no write
pub fn record_resource_unchanged(kind: &str) {
    RESOURCES_UNCHANGED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a conflict that is about to be retried
pub fn record_conflict_retry(kind: &str) {
    CONFLICT_RETRIES_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a group version that discovery could not list
pub fn record_discovery_failure() {
    DISCOVERY_FAILURES_TOTAL.inc();
}

/// Record how long ensuring one object took
///
/// # Arguments
/// * `kind` - `Kind.group` of the object
/// * `duration` - Wall time from lookup to final write
pub fn record_ensure_duration(kind: &str, duration: Duration) {
    ENSURE_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
