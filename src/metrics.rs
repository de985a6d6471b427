//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Guard Metrics
    pub static ref GUARD_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("calgate_guard_decisions_total", "Total number of session guard decisions"),
        &["decision"]
    ).expect("metric can be created");

    // Authentication Metrics
    pub static ref AUTH_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("calgate_auth_attempts_total", "Total number of authentication attempts"),
        &["operation", "outcome"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("calgate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers collectors.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(GUARD_DECISIONS_TOTAL.clone()))
            .expect("GUARD_DECISIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(AUTH_ATTEMPTS_TOTAL.clone()))
            .expect("AUTH_ATTEMPTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
