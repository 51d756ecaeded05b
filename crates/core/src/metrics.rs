//! Prometheus metrics for the queue engine.
//!
//! This module provides metrics for:
//! - Joins, promotions, releases and expirations
//! - Wait-line and active-window sizes
//! - Background task health

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Queue Flow
// =============================================================================

/// Join calls by result.
pub static QUEUE_JOINS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("peakguard_queue_joins_total", "Total queue join calls"),
        &["result"], // "created", "existing"
    )
    .unwrap()
});

/// Tickets promoted into the active window.
pub static QUEUE_PROMOTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "peakguard_queue_promotions_total",
        "Total tickets promoted from waiting to active",
    )
    .unwrap()
});

/// Tickets expired by reason.
pub static QUEUE_EXPIRATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("peakguard_queue_expirations_total", "Total tickets expired"),
        &["reason"], // "released", "idle_waiting", "idle_active", "lifetime_exceeded", "reset"
    )
    .unwrap()
});

/// Release calls by outcome.
pub static QUEUE_RELEASES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("peakguard_queue_releases_total", "Total release calls"),
        &["outcome"], // "released", "left_queue", "no_op"
    )
    .unwrap()
});

/// Expired tickets removed after the retention window.
pub static QUEUE_PURGED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "peakguard_queue_purged_total",
        "Total expired tickets purged from the store",
    )
    .unwrap()
});

// =============================================================================
// Queue Size
// =============================================================================

/// Tickets currently waiting.
pub static QUEUE_WAITING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("peakguard_queue_waiting", "Number of waiting tickets").unwrap()
});

/// Tickets currently active.
pub static QUEUE_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("peakguard_queue_active", "Number of active tickets").unwrap()
});

// =============================================================================
// Background Tasks
// =============================================================================

/// Failed promotion ticks / sweeps.
pub static QUEUE_TICK_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "peakguard_queue_tick_failures_total",
            "Background queue ticks that failed and were skipped",
        ),
        &["task"], // "promotion", "sweep"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(QUEUE_JOINS.clone()),
        Box::new(QUEUE_PROMOTIONS.clone()),
        Box::new(QUEUE_EXPIRATIONS.clone()),
        Box::new(QUEUE_RELEASES.clone()),
        Box::new(QUEUE_PURGED.clone()),
        Box::new(QUEUE_WAITING.clone()),
        Box::new(QUEUE_ACTIVE.clone()),
        Box::new(QUEUE_TICK_FAILURES.clone()),
    ]
}
