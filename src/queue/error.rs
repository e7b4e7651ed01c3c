use thiserror::Error;

use crate::store::StoreError;

use super::models::{QueueAction, QueueId, QueueStatus};

/// Errors produced by queue operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueueError {
    #[error("Cannot {action} a queue that is {from}")]
    InvalidTransition { from: QueueStatus, action: QueueAction },

    #[error("Queue {queue_id} is {status}, not active")]
    QueueNotActive { queue_id: QueueId, status: QueueStatus },

    #[error("Queue {queue_id} has no next number to call")]
    QueueEmpty { queue_id: QueueId },

    #[error("Queue {0} not found")]
    NotFound(QueueId),

    #[error("Queue {queue_id} was modified concurrently, refresh and retry")]
    Conflict { queue_id: QueueId },

    #[error("Queue {queue_id} reached its daily capacity of {capacity}")]
    CapacityExceeded { queue_id: QueueId, capacity: u32 },

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl QueueError {
    /// Machine-readable code used in API responses and bulk results.
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::InvalidTransition { .. } => "INVALID_TRANSITION",
            QueueError::QueueNotActive { .. } => "QUEUE_NOT_ACTIVE",
            QueueError::QueueEmpty { .. } => "QUEUE_EMPTY",
            QueueError::NotFound(_) => "NOT_FOUND",
            QueueError::Conflict { .. } => "CONFLICT",
            QueueError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            QueueError::Validation(_) => "VALIDATION_ERROR",
            QueueError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { queue_id, .. } => QueueError::Conflict { queue_id },
            StoreError::NotFound(queue_id) => QueueError::NotFound(queue_id),
            other => QueueError::Storage(other.to_string()),
        }
    }
}
