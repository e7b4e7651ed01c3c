//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
    pub announcements: AnnouncementHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub pool_size: u32,
    pub idle_connections: usize,
}

#[derive(Debug, Serialize)]
pub struct AnnouncementHealthResponse {
    pub backend: String,
    pub subscribers: usize,
}

/// GET /health - Liveness plus a store round-trip
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let reachable = match state.controller.list().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the queue store");
            false
        }
    };

    let postgres = state.postgres_pool.as_ref().map(|pool| {
        let (pool_size, idle_connections) = pool.usage();
        PostgresHealthResponse {
            pool_size,
            idle_connections,
        }
    });

    let status = if reachable { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        store: StoreHealthResponse {
            backend: state.controller.store().backend_type().to_string(),
            reachable,
        },
        postgres,
        announcements: AnnouncementHealthResponse {
            backend: state.settings.announcer.backend.clone(),
            subscribers: state.broadcast.subscriber_count(),
        },
    })
}
