//! Prometheus metrics endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use crate::metrics::{self, AnnouncementMetrics, QueueMetrics};
use crate::queue::aggregate;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_metrics_from_state(&state).await;

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Refresh the gauges that are derived from current state
async fn update_metrics_from_state(state: &AppState) {
    match state.controller.list().await {
        Ok(queues) => {
            let stats = aggregate(&queues);
            QueueMetrics::set_status_counts(
                stats.active_queues,
                stats.paused_queues,
                stats.stopped_queues,
            );
        }
        Err(e) => tracing::warn!(error = %e, "Failed to refresh queue gauges"),
    }

    AnnouncementMetrics::set_subscribers(state.broadcast.subscriber_count());
}
