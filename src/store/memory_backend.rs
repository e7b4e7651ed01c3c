//! In-memory queue store using DashMap.
//!
//! Records are lost on restart. Suitable for single-instance deployments and
//! tests.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::queue::{QueueId, QueueState};

use super::{QueueStore, StoreError};

pub struct MemoryQueueStore {
    queues: DashMap<QueueId, QueueState>,
    next_id: AtomicI64,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Seed the store with existing records, keeping their ids.
    pub fn with_queues(queues: impl IntoIterator<Item = QueueState>) -> Self {
        let store = Self::new();
        let mut max_id = 0;
        for queue in queues {
            max_id = max_id.max(queue.id);
            store.queues.insert(queue.id, queue);
        }
        store.next_id.store(max_id + 1, Ordering::SeqCst);
        store
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<QueueState>, StoreError> {
        let mut queues: Vec<QueueState> = self.queues.iter().map(|r| r.value().clone()).collect();
        queues.sort_by_key(|q| q.id);
        Ok(queues)
    }

    async fn get(&self, id: QueueId) -> Result<Option<QueueState>, StoreError> {
        Ok(self.queues.get(&id).map(|r| r.value().clone()))
    }

    async fn insert(&self, mut state: QueueState) -> Result<QueueState, StoreError> {
        state.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.queues.insert(state.id, state.clone());

        tracing::debug!(queue_id = state.id, "Queue inserted into memory store");
        Ok(state)
    }

    async fn save(&self, state: &QueueState, expected_version: u64) -> Result<(), StoreError> {
        let mut entry = self
            .queues
            .get_mut(&state.id)
            .ok_or(StoreError::NotFound(state.id))?;

        if entry.version != expected_version {
            return Err(StoreError::VersionConflict {
                queue_id: state.id,
                expected: expected_version,
            });
        }

        *entry = state.clone();
        Ok(())
    }

    async fn delete(&self, id: QueueId) -> Result<bool, StoreError> {
        Ok(self.queues.remove(&id).is_some())
    }
}
