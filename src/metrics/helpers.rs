use prometheus::{Encoder, TextEncoder};

use super::*;

/// Render every registered metric in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Broadcaster metric helpers
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    pub fn record_published() {
        NOTIFICATIONS_PUBLISHED_TOTAL.inc();
    }

    pub fn record_delivered() {
        NOTIFICATIONS_DELIVERED_TOTAL.inc();
    }

    pub fn record_evicted(count: usize) {
        SUBSCRIBERS_EVICTED_TOTAL.inc_by(count as u64);
    }

    pub fn record_closed(outcome: &str, duration_secs: f64) {
        SUBSCRIPTIONS_CLOSED_TOTAL.with_label_values(&[outcome]).inc();
        SUBSCRIPTION_DURATION.observe(duration_secs);
    }
}

/// Record store metric helpers
pub struct StorageMetrics;

impl StorageMetrics {
    pub fn record_write(operation: &str, success: bool) {
        let status = if success { "ok" } else { "error" };
        STORAGE_WRITES_TOTAL
            .with_label_values(&[operation, status])
            .inc();
    }
}
