//! Prometheus metrics for the queue service.
//!
//! - Queue operation metrics (outcome and latency per operation)
//! - Calling metrics (calls, skips, issued tickets)
//! - Announcement delivery metrics per sink
//! - Queue status gauges, refreshed on scrape

mod helpers;

pub use helpers::{encode_metrics, AnnouncementMetrics, QueueMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "sirama";

lazy_static! {
    // ============================================================================
    // Queue Operation Metrics
    // ============================================================================

    /// Committed or rejected queue operations, by operation and outcome code
    pub static ref QUEUE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_queue_operations_total", METRIC_PREFIX),
        "Total queue operations by operation and outcome",
        &["operation", "outcome"]
    ).unwrap();

    /// Time spent holding the per-queue lock, from load to save
    pub static ref QUEUE_OPERATION_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_queue_operation_latency_seconds", METRIC_PREFIX),
        "Queue operation latency in seconds",
        &["operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    ).unwrap();

    // ============================================================================
    // Calling Metrics
    // ============================================================================

    /// Patients called to a service point
    pub static ref CALLS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_calls_total", METRIC_PREFIX),
        "Total numbers called"
    ).unwrap();

    /// Numbers skipped
    pub static ref SKIPS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_skips_total", METRIC_PREFIX),
        "Total numbers skipped"
    ).unwrap();

    /// Tickets handed out
    pub static ref TICKETS_ISSUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_tickets_issued_total", METRIC_PREFIX),
        "Total queue tickets issued"
    ).unwrap();

    /// Queues per status (active, paused, stopped)
    pub static ref QUEUES_BY_STATUS: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_queues", METRIC_PREFIX),
        "Number of queues by status",
        &["status"]
    ).unwrap();

    // ============================================================================
    // Announcement Metrics
    // ============================================================================

    /// Announcements delivered, by sink
    pub static ref ANNOUNCEMENTS_DELIVERED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_announcements_delivered_total", METRIC_PREFIX),
        "Total announcements delivered by sink",
        &["sink"]
    ).unwrap();

    /// Announcements a sink failed to deliver after retries
    pub static ref ANNOUNCEMENTS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_announcements_failed_total", METRIC_PREFIX),
        "Total announcement delivery failures by sink",
        &["sink"]
    ).unwrap();

    /// Announcements dropped because the delivery queue was full
    pub static ref ANNOUNCEMENTS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_announcements_dropped_total", METRIC_PREFIX),
        "Total announcements dropped before delivery"
    ).unwrap();

    /// Connected SSE announcement subscribers
    pub static ref ANNOUNCEMENT_SUBSCRIBERS: IntGauge = register_int_gauge!(
        format!("{}_announcement_subscribers", METRIC_PREFIX),
        "Number of connected announcement stream subscribers"
    ).unwrap();
}
