//! Queue store factory

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::postgres::PostgresPool;

use super::memory_backend::MemoryQueueStore;
use super::postgres_backend::PostgresQueueStore;
use super::{QueueStore, StoreError};

/// Create a queue store based on configuration.
///
/// - `"postgres"`: `PostgresQueueStore` when a pool is provided, otherwise
///   falls back to memory with a warning
/// - `"memory"` (default): `MemoryQueueStore`
///
/// The PostgreSQL schema is created on first use.
pub async fn create_queue_store(
    settings: &StoreConfig,
    postgres_pool: Option<&PostgresPool>,
) -> Result<Arc<dyn QueueStore>, StoreError> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(
                    backend = "postgres",
                    database = %pool.database_url_masked(),
                    "Creating PostgreSQL queue store"
                );
                let store = PostgresQueueStore::new(pool.pool().clone());
                store.ensure_schema().await?;
                Ok(Arc::new(store))
            } else {
                tracing::warn!(
                    "PostgreSQL store requested but no pool provided, falling back to memory"
                );
                Ok(Arc::new(MemoryQueueStore::new()))
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory queue store");
            Ok(Arc::new(MemoryQueueStore::new()))
        }
    }
}
