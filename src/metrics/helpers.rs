//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    ANNOUNCEMENTS_DELIVERED_TOTAL, ANNOUNCEMENTS_DROPPED_TOTAL, ANNOUNCEMENTS_FAILED_TOTAL,
    ANNOUNCEMENT_SUBSCRIBERS, CALLS_TOTAL, QUEUES_BY_STATUS, QUEUE_OPERATIONS_TOTAL,
    QUEUE_OPERATION_LATENCY, SKIPS_TOTAL, TICKETS_ISSUED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording queue metrics
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record the outcome of one serialized queue operation.
    /// `outcome` is `"ok"` or the error code.
    pub fn record_operation(operation: &str, outcome: &str, elapsed: Duration) {
        QUEUE_OPERATIONS_TOTAL
            .with_label_values(&[operation, outcome])
            .inc();
        QUEUE_OPERATION_LATENCY
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_call() {
        CALLS_TOTAL.inc();
    }

    pub fn record_skip() {
        SKIPS_TOTAL.inc();
    }

    pub fn record_ticket_issued() {
        TICKETS_ISSUED_TOTAL.inc();
    }

    /// Update the per-status queue gauges
    pub fn set_status_counts(active: usize, paused: usize, stopped: usize) {
        QUEUES_BY_STATUS
            .with_label_values(&["active"])
            .set(active as i64);
        QUEUES_BY_STATUS
            .with_label_values(&["paused"])
            .set(paused as i64);
        QUEUES_BY_STATUS
            .with_label_values(&["stopped"])
            .set(stopped as i64);
    }
}

/// Helper struct for recording announcement metrics
pub struct AnnouncementMetrics;

impl AnnouncementMetrics {
    pub fn record_delivered(sink: &str) {
        ANNOUNCEMENTS_DELIVERED_TOTAL
            .with_label_values(&[sink])
            .inc();
    }

    pub fn record_failed(sink: &str) {
        ANNOUNCEMENTS_FAILED_TOTAL.with_label_values(&[sink]).inc();
    }

    pub fn record_dropped() {
        ANNOUNCEMENTS_DROPPED_TOTAL.inc();
    }

    /// Set the number of connected stream subscribers
    pub fn set_subscribers(count: usize) {
        ANNOUNCEMENT_SUBSCRIBERS.set(count as i64);
    }
}
