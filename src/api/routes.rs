use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{require_auth, AppState};

use super::announcements::announcement_stream;
use super::health::health;
use super::metrics::prometheus_metrics;
use super::queues::{
    active_queues, bulk_action, call_next, create_queue, delete_queue, get_queue, issue_ticket,
    list_queues, queue_action, queue_statistics, skip, update_queue,
};

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Queue management
        .nest("/queue-managements", queue_routes(state))
}

fn queue_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_queues).post(create_queue))
        // Polled by the control panel
        .route("/active", get(active_queues))
        .route("/statistics", get(queue_statistics))
        .route("/bulk-action", post(bulk_action))
        .route("/announcements", get(announcement_stream))
        // Single queue
        .route(
            "/{id}",
            get(get_queue).put(update_queue).delete(delete_queue),
        )
        .route("/{id}/action", post(queue_action))
        .route("/{id}/call-next", post(call_next))
        .route("/{id}/skip", post(skip))
        .route("/{id}/issue", post(issue_ticket))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
