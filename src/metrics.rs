//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{Counter, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Upload Metrics
    pub static ref UPLOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bytego_uploads_total", "Total number of upload requests by outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref UPLOAD_BYTES_TOTAL: Counter = Counter::new(
        "bytego_upload_bytes_total",
        "Total bytes relayed to object storage"
    ).expect("metric can be created");
    pub static ref UPLOAD_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "bytego_upload_duration_seconds",
            "Upload handling duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["outcome"]
    ).expect("metric can be created");

    // Auth Metrics
    pub static ref AUTH_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "bytego_auth_failures_total",
        "Total number of rejected shared secrets"
    ).expect("metric can be created");
    pub static ref AUTH_BANS_TOTAL: IntCounter = IntCounter::new(
        "bytego_auth_bans_total",
        "Total number of IP bans imposed"
    ).expect("metric can be created");
    pub static ref AUTH_TRACKED_IPS: IntGauge = IntGauge::new(
        "bytego_auth_tracked_ips",
        "Current number of IPs in the lockout table"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bytego_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(UPLOADS_TOTAL.clone()))
            .expect("UPLOADS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(UPLOAD_BYTES_TOTAL.clone()))
            .expect("UPLOAD_BYTES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(UPLOAD_DURATION_SECONDS.clone()))
            .expect("UPLOAD_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
            .expect("AUTH_FAILURES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(AUTH_BANS_TOTAL.clone()))
            .expect("AUTH_BANS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(AUTH_TRACKED_IPS.clone()))
            .expect("AUTH_TRACKED_IPS can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");
    });
}
