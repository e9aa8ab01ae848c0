//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Once;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login Metrics
    pub static ref LOGINS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sessiongate_logins_total", "Total number of login attempts"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref IDENTITY_REQUEST_DURATION_SECONDS: prometheus::Histogram = prometheus::Histogram::with_opts(
        HistogramOpts::new(
            "sessiongate_identity_request_duration_seconds",
            "Identity provider user-info request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("metric can be created");

    // Session Metrics
    pub static ref SESSIONS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "sessiongate_sessions_created_total",
        "Total number of sessions minted"
    ).expect("metric can be created");
    pub static ref SESSION_LOOKUPS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sessiongate_session_lookups_total", "Total number of session lookups"),
        &["result"]
    ).expect("metric can be created");
    pub static ref SESSIONS_STORED: IntGauge = IntGauge::new(
        "sessiongate_sessions_stored",
        "Current number of records in the session store"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sessiongate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration only happens the first time.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(LOGINS_TOTAL.clone()))
            .expect("LOGINS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(IDENTITY_REQUEST_DURATION_SECONDS.clone()))
            .expect("IDENTITY_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_CREATED_TOTAL.clone()))
            .expect("SESSIONS_CREATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SESSION_LOOKUPS_TOTAL.clone()))
            .expect("SESSION_LOOKUPS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_STORED.clone()))
            .expect("SESSIONS_STORED can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
