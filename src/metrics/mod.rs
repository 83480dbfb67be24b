//! Prometheus metrics for the company board.
//!
//! - Subscriber metrics (active subscribers, evictions, how subscriptions end)
//! - Notification metrics (published payloads, frames delivered)
//! - Record store metrics (writes by operation and status)

mod helpers;

pub use helpers::{encode_metrics, BroadcastMetrics, StorageMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "htmx";

lazy_static! {
    // ============================================================================
    // Subscriber Metrics
    // ============================================================================

    /// Subscribers currently in the broadcast registry
    pub static ref SUBSCRIBERS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_subscribers_active", METRIC_PREFIX),
        "Number of subscribers currently registered"
    ).unwrap();

    /// Subscribers evicted for not keeping up
    pub static ref SUBSCRIBERS_EVICTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_subscribers_evicted_total", METRIC_PREFIX),
        "Total subscribers evicted as slow consumers"
    ).unwrap();

    /// Ended subscriptions by outcome
    pub static ref SUBSCRIPTIONS_CLOSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_subscriptions_closed_total", METRIC_PREFIX),
        "Total subscriptions ended, by outcome",
        &["outcome"]
    ).unwrap();

    /// Subscription lifetime
    pub static ref SUBSCRIPTION_DURATION: Histogram = register_histogram!(
        format!("{}_subscription_duration_seconds", METRIC_PREFIX),
        "Subscription duration in seconds",
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0]
    ).unwrap();

    // ============================================================================
    // Notification Metrics
    // ============================================================================

    /// Payloads handed to publish
    pub static ref NOTIFICATIONS_PUBLISHED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_published_total", METRIC_PREFIX),
        "Total notification payloads published"
    ).unwrap();

    /// Frames written to subscriber connections
    pub static ref NOTIFICATIONS_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_delivered_total", METRIC_PREFIX),
        "Total notification frames written to subscribers"
    ).unwrap();

    // ============================================================================
    // Record Store Metrics
    // ============================================================================

    /// Record store writes by operation
    pub static ref STORAGE_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_storage_writes_total", METRIC_PREFIX),
        "Total record store writes",
        &["operation", "status"]
    ).unwrap();
}
