use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::queue::QueueError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
    code: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

fn masked(log_msg: &str, public: &str) -> String {
    if is_production() {
        public.to_string()
    } else {
        log_msg.to_string()
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::Queue(e) => match e {
                QueueError::InvalidTransition { .. }
                | QueueError::QueueNotActive { .. }
                | QueueError::QueueEmpty { .. }
                | QueueError::Conflict { .. }
                | QueueError::CapacityExceeded { .. } => StatusCode::CONFLICT,
                QueueError::NotFound(_) => StatusCode::NOT_FOUND,
                QueueError::Validation(_) => StatusCode::BAD_REQUEST,
                QueueError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Auth(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Timeout(_) => "REQUEST_TIMEOUT",
            AppError::Queue(QueueError::Storage(_)) | AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Queue(e) => e.code(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let log_message = self.to_string();

        let client_message = match &self {
            AppError::Config(_) => masked(&log_message, "Configuration error"),
            AppError::Internal(_) | AppError::Queue(QueueError::Storage(_)) => {
                masked(&log_message, "Internal server error")
            }
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::Validation(msg)
            | AppError::NotFound(msg) => msg.clone(),
            AppError::Timeout(_) => log_message.clone(),
            AppError::Queue(e) => e.to_string(),
        };

        // Always log the detailed error server-side
        if status.is_server_error() {
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        } else {
            tracing::warn!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API request rejected"
            );
        }

        let body = ErrorResponse {
            success: false,
            message: client_message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{QueueAction, QueueStatus};

    #[test]
    fn test_queue_error_status_mapping() {
        let cases = [
            (
                QueueError::InvalidTransition {
                    from: QueueStatus::Stopped,
                    action: QueueAction::Pause,
                },
                StatusCode::CONFLICT,
                "INVALID_TRANSITION",
            ),
            (
                QueueError::QueueNotActive {
                    queue_id: 1,
                    status: QueueStatus::Paused,
                },
                StatusCode::CONFLICT,
                "QUEUE_NOT_ACTIVE",
            ),
            (QueueError::QueueEmpty { queue_id: 1 }, StatusCode::CONFLICT, "QUEUE_EMPTY"),
            (QueueError::Conflict { queue_id: 1 }, StatusCode::CONFLICT, "CONFLICT"),
            (QueueError::NotFound(9), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                QueueError::Validation("bad".to_string()),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                QueueError::Storage("db down".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (err, status, code) in cases {
            let app_err = AppError::from(err);
            assert_eq!(app_err.status(), status);
            assert_eq!(app_err.code(), code);
        }
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let response = AppError::Queue(QueueError::QueueEmpty { queue_id: 4 }).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "QUEUE_EMPTY");
        assert!(json["message"].as_str().unwrap().contains('4'));
    }
}
