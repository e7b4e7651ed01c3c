//! Storage backends for queue records.
//!
//! The lifecycle controller is the only writer. Every write carries the
//! version the caller read, so two service instances sharing a backend
//! cannot silently overwrite each other.

mod factory;
mod memory_backend;
mod postgres_backend;

pub use factory::create_queue_store;
pub use memory_backend::MemoryQueueStore;
pub use postgres_backend::PostgresQueueStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::queue::{QueueId, QueueState};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version moved on since the record was read
    #[error("Version conflict on queue {queue_id} (expected {expected})")]
    VersionConflict { queue_id: QueueId, expected: u64 },

    #[error("Queue {0} not found")]
    NotFound(QueueId),

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A stored row could not be mapped back to a queue record
    #[error("Corrupt record for queue {queue_id}: {reason}")]
    Corrupt { queue_id: QueueId, reason: String },
}

/// Backend trait for queue record storage.
///
/// Implementations must be `Send + Sync`; they are shared by every request
/// handler. `save` must be a compare-and-swap on `version`.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Backend type identifier, used in logs and health output.
    fn backend_type(&self) -> &'static str;

    /// All queues, ordered by id.
    async fn list(&self) -> Result<Vec<QueueState>, StoreError>;

    async fn get(&self, id: QueueId) -> Result<Option<QueueState>, StoreError>;

    /// Persist a new record and return it with its assigned id.
    async fn insert(&self, state: QueueState) -> Result<QueueState, StoreError>;

    /// Replace a record if its stored version still equals `expected_version`.
    async fn save(&self, state: &QueueState, expected_version: u64) -> Result<(), StoreError>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, id: QueueId) -> Result<bool, StoreError>;
}
