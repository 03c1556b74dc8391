//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Conversions (outcome, duration, produced bytes)
//! - Engine loading
//! - Remote fetches

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

// =============================================================================
// Conversions
// =============================================================================

/// Conversions total by result.
pub static CONVERSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("audora_conversions_total", "Total conversion attempts"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Conversion duration in seconds, engine load and fetch included.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "audora_conversion_duration_seconds",
            "Duration of conversion attempts",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
        &["result"],
    )
    .unwrap()
});

/// Bytes of audio produced.
pub static OUTPUT_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("audora_output_bytes_total", "Total bytes of produced audio").unwrap()
});

// =============================================================================
// Engine
// =============================================================================

/// Engine loads by result.
pub static ENGINE_LOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("audora_engine_loads_total", "Total engine load attempts"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Fetcher
// =============================================================================

/// Remote fetches by result.
pub static FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("audora_fetches_total", "Total remote media fetches"),
        &["result"], // "success", "scheme", "network", "status", "content_type", "body", "client"
    )
    .unwrap()
});

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_core_metrics(&registry);
    registry
});

/// Register all core metrics with the given registry.
pub fn register_core_metrics(registry: &Registry) {
    registry.register(Box::new(CONVERSIONS.clone())).ok();
    registry.register(Box::new(CONVERSION_DURATION.clone())).ok();
    registry.register(Box::new(OUTPUT_BYTES.clone())).ok();
    registry.register(Box::new(ENGINE_LOADS.clone())).ok();
    registry.register(Box::new(FETCHES.clone())).ok();
}

/// The crate-level registry with every core metric registered.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Renders the crate-level registry in the Prometheus text format.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&registry().gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
