//! Queue management endpoints under `/queue-managements`.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::queue::{
    aggregate, ActionOptions, BulkActionResult, CallResult, NewQueue, QueueAction, QueueId,
    QueueState, QueueStats, QueueUpdate,
};
use crate::server::AppState;

use super::response::{ApiJson, ApiPath, ApiResponse};

/// Body of `POST /{id}/action` and `POST /bulk-action`
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: QueueAction,
    /// Only used by `reset`
    #[serde(default)]
    pub zero_counters: bool,
}

impl ActionRequest {
    fn options(&self) -> ActionOptions {
        ActionOptions {
            zero_counters: self.zero_counters,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub ticket_number: u32,
    pub queue: QueueState,
}

/// GET /queue-managements - All queues
#[tracing::instrument(name = "http.list_queues", skip_all)]
pub async fn list_queues(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<QueueState>>>> {
    let queues = state.controller.list().await?;
    Ok(Json(ApiResponse::ok(queues)))
}

/// POST /queue-managements - Create a queue (starts paused)
#[tracing::instrument(name = "http.create_queue", skip_all)]
pub async fn create_queue(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewQueue>,
) -> Result<(StatusCode, Json<ApiResponse<QueueState>>)> {
    let queue = state.controller.create(new).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Queue created", queue)),
    ))
}

/// GET /queue-managements/active - Active queues, served from the snapshot cache
#[tracing::instrument(name = "http.active_queues", skip_all)]
pub async fn active_queues(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<QueueState>>>> {
    let controller = state.controller.clone();
    let queues = state
        .active_cache
        .get_or_refresh(controller.generation(), || async move {
            controller.list_active().await
        })
        .await?;
    Ok(Json(ApiResponse::ok(queues)))
}

/// GET /queue-managements/statistics - Aggregate statistics, served from the snapshot cache
#[tracing::instrument(name = "http.queue_statistics", skip_all)]
pub async fn queue_statistics(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<QueueStats>>> {
    let controller = state.controller.clone();
    let stats = state
        .stats_cache
        .get_or_refresh(controller.generation(), || async move {
            controller.list().await.map(|queues| aggregate(&queues))
        })
        .await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// POST /queue-managements/bulk-action - Apply an action to every queue.
///
/// Partial failure is reported per queue with `success: false`; the request
/// itself still succeeds.
#[tracing::instrument(name = "http.bulk_action", skip_all, fields(action = %request.action))]
pub async fn bulk_action(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ActionRequest>,
) -> Result<Json<ApiResponse<BulkActionResult>>> {
    let result = state
        .controller
        .apply_all(request.action, request.options())
        .await?;

    let message = format!(
        "{} applied to {} queue(s), {} failed",
        request.action,
        result.succeeded.len(),
        result.failed.len()
    );

    Ok(Json(ApiResponse {
        success: result.is_complete_success(),
        message: Some(message),
        data: Some(result),
    }))
}

/// GET /queue-managements/{id}
#[tracing::instrument(name = "http.get_queue", skip_all, fields(queue_id = id))]
pub async fn get_queue(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QueueId>,
) -> Result<Json<ApiResponse<QueueState>>> {
    let queue = state.controller.get(id).await?;
    Ok(Json(ApiResponse::ok(queue)))
}

/// PUT /queue-managements/{id} - Update fields; `status` goes through the transition table
#[tracing::instrument(name = "http.update_queue", skip_all, fields(queue_id = id))]
pub async fn update_queue(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QueueId>,
    ApiJson(update): ApiJson<QueueUpdate>,
) -> Result<Json<ApiResponse<QueueState>>> {
    let queue = state.controller.update(id, update).await?;
    Ok(Json(ApiResponse::with_message("Queue updated", queue)))
}

/// DELETE /queue-managements/{id}
#[tracing::instrument(name = "http.delete_queue", skip_all, fields(queue_id = id))]
pub async fn delete_queue(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QueueId>,
) -> Result<Json<ApiResponse<()>>> {
    state.controller.delete(id).await?;
    Ok(Json(ApiResponse::message("Queue deleted")))
}

/// POST /queue-managements/{id}/action - start, pause, stop or reset
#[tracing::instrument(
    name = "http.queue_action",
    skip_all,
    fields(queue_id = id, action = %request.action)
)]
pub async fn queue_action(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QueueId>,
    ApiJson(request): ApiJson<ActionRequest>,
) -> Result<Json<ApiResponse<QueueState>>> {
    let queue = state
        .controller
        .apply_action_with(id, request.action, request.options())
        .await?;
    let message = format!("Queue is now {}", queue.status);
    Ok(Json(ApiResponse::with_message(message, queue)))
}

/// POST /queue-managements/{id}/call-next
#[tracing::instrument(name = "http.call_next", skip_all, fields(queue_id = id))]
pub async fn call_next(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QueueId>,
) -> Result<Json<ApiResponse<CallResult>>> {
    let result = state.dispatcher.call_next(id).await?;
    let message = format!(
        "Calling number {} for {}",
        result.announcement.number, result.announcement.service_type
    );
    Ok(Json(ApiResponse::with_message(message, result)))
}

/// POST /queue-managements/{id}/skip
#[tracing::instrument(name = "http.skip", skip_all, fields(queue_id = id))]
pub async fn skip(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QueueId>,
) -> Result<Json<ApiResponse<QueueState>>> {
    let queue = state.skip_handler.skip(id).await?;
    let message = format!("Number {} skipped", queue.current_number);
    Ok(Json(ApiResponse::with_message(message, queue)))
}

/// POST /queue-managements/{id}/issue - Hand out the next ticket
#[tracing::instrument(name = "http.issue_ticket", skip_all, fields(queue_id = id))]
pub async fn issue_ticket(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QueueId>,
) -> Result<(StatusCode, Json<ApiResponse<TicketResponse>>)> {
    let queue = state.controller.issue_ticket(id).await?;
    let ticket_number = queue.last_issued_number.unwrap_or(queue.current_number);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            format!("Ticket {} issued", ticket_number),
            TicketResponse {
                ticket_number,
                queue,
            },
        )),
    ))
}
