//! Queue lifecycle controller.
//!
//! Owns every write to a queue record. Mutations against one queue are
//! serialized by a per-queue async mutex held across load, mutate and save;
//! different queues never share a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::metrics::QueueMetrics;
use crate::store::QueueStore;

use super::error::QueueError;
use super::models::{NewQueue, QueueAction, QueueId, QueueState, QueueStatus, QueueUpdate};
use super::transitions::next_status;

/// Options for a lifecycle action
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionOptions {
    /// Only meaningful for `reset`: zero the daily counters as well
    pub zero_counters: bool,
}

/// A queue the bulk action could not be applied to
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkFailure {
    pub queue_id: QueueId,
    pub code: String,
    pub message: String,
}

/// Per-queue outcome of a bulk action
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkActionResult {
    pub action: QueueAction,
    pub succeeded: Vec<QueueId>,
    pub failed: Vec<BulkFailure>,
}

impl BulkActionResult {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct QueueLifecycleController {
    store: Arc<dyn QueueStore>,
    locks: DashMap<QueueId, Arc<Mutex<()>>>,
    /// Bumped after every committed write; read-side caches key on it
    generation: AtomicU64,
}

impl QueueLifecycleController {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    /// Number of committed writes since startup.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn lock_for(&self, queue_id: QueueId) -> Arc<Mutex<()>> {
        self.locks.entry(queue_id).or_default().clone()
    }

    /// Drop the lock entry for a queue that turned out not to exist, unless
    /// another caller is already waiting on it.
    fn release_missing(&self, queue_id: QueueId) {
        self.locks
            .remove_if(&queue_id, |_, lock| Arc::strong_count(lock) <= 2);
    }

    fn committed(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Run `op` against a private copy of the queue while holding its lock.
    ///
    /// The copy is written back only when `op` succeeds; on error the stored
    /// record is untouched.
    pub(crate) async fn mutate<T, F>(
        &self,
        queue_id: QueueId,
        operation: &'static str,
        op: F,
    ) -> Result<(QueueState, T), QueueError>
    where
        F: FnOnce(&mut QueueState) -> Result<T, QueueError>,
    {
        let start = Instant::now();
        let lock = self.lock_for(queue_id);
        let _guard = lock.lock().await;

        let result = self.load_apply_save(queue_id, op).await;
        if matches!(result, Err(QueueError::NotFound(_))) {
            self.release_missing(queue_id);
        }

        match &result {
            Ok((state, _)) => {
                self.committed();
                QueueMetrics::record_operation(operation, "ok", start.elapsed());
                tracing::debug!(
                    queue_id = queue_id,
                    operation = operation,
                    status = %state.status,
                    current_number = state.current_number,
                    version = state.version,
                    "Queue mutation committed"
                );
            }
            Err(e) => {
                QueueMetrics::record_operation(operation, e.code(), start.elapsed());
                tracing::debug!(
                    queue_id = queue_id,
                    operation = operation,
                    error = %e,
                    "Queue mutation rejected"
                );
            }
        }

        result
    }

    async fn load_apply_save<T, F>(
        &self,
        queue_id: QueueId,
        op: F,
    ) -> Result<(QueueState, T), QueueError>
    where
        F: FnOnce(&mut QueueState) -> Result<T, QueueError>,
    {
        let current = self
            .store
            .get(queue_id)
            .await?
            .ok_or(QueueError::NotFound(queue_id))?;

        let mut next = current.clone();
        let output = op(&mut next)?;

        next.refresh_estimated_wait();
        next.version = current.version + 1;
        next.updated_at = Utc::now();

        self.store.save(&next, current.version).await?;
        Ok((next, output))
    }

    pub async fn get(&self, queue_id: QueueId) -> Result<QueueState, QueueError> {
        self.store
            .get(queue_id)
            .await?
            .ok_or(QueueError::NotFound(queue_id))
    }

    pub async fn list(&self) -> Result<Vec<QueueState>, QueueError> {
        Ok(self.store.list().await?)
    }

    pub async fn list_active(&self) -> Result<Vec<QueueState>, QueueError> {
        let mut queues = self.store.list().await?;
        queues.retain(QueueState::is_active);
        Ok(queues)
    }

    /// Apply a lifecycle action with default options.
    pub async fn apply_action(
        &self,
        queue_id: QueueId,
        action: QueueAction,
    ) -> Result<QueueState, QueueError> {
        self.apply_action_with(queue_id, action, ActionOptions::default())
            .await
    }

    #[tracing::instrument(
        name = "queue.apply_action",
        skip_all,
        fields(queue_id = queue_id, action = %action)
    )]
    pub async fn apply_action_with(
        &self,
        queue_id: QueueId,
        action: QueueAction,
        options: ActionOptions,
    ) -> Result<QueueState, QueueError> {
        let (state, from) = self
            .mutate(queue_id, action.as_str(), |state| {
                let from = state.status;
                state.status = next_status(from, action)?;
                if action == QueueAction::Reset && options.zero_counters {
                    state.zero_counters();
                }
                Ok(from)
            })
            .await?;

        tracing::info!(
            queue_id = queue_id,
            action = %action,
            from = %from,
            to = %state.status,
            "Queue status changed"
        );

        Ok(state)
    }

    /// Apply `action` to every known queue independently.
    ///
    /// A failure on one queue is recorded and never stops the others.
    #[tracing::instrument(name = "queue.apply_all", skip_all, fields(action = %action))]
    pub async fn apply_all(
        &self,
        action: QueueAction,
        options: ActionOptions,
    ) -> Result<BulkActionResult, QueueError> {
        let queue_ids: Vec<QueueId> = self.store.list().await?.iter().map(|q| q.id).collect();

        let mut pending: FuturesUnordered<_> = queue_ids
            .into_iter()
            .map(|queue_id| async move {
                (queue_id, self.apply_action_with(queue_id, action, options).await)
            })
            .collect();

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        while let Some((queue_id, result)) = pending.next().await {
            match result {
                Ok(_) => succeeded.push(queue_id),
                Err(e) => failed.push(BulkFailure {
                    queue_id,
                    code: e.code().to_string(),
                    message: e.to_string(),
                }),
            }
        }

        succeeded.sort_unstable();
        failed.sort_by_key(|f| f.queue_id);

        tracing::info!(
            action = %action,
            succeeded = succeeded.len(),
            failed = failed.len(),
            "Bulk queue action finished"
        );

        Ok(BulkActionResult {
            action,
            succeeded,
            failed,
        })
    }

    #[tracing::instrument(name = "queue.create", skip_all, fields(service_type = %new.service_type))]
    pub async fn create(&self, new: NewQueue) -> Result<QueueState, QueueError> {
        new.validate()?;
        let mut new = new;
        new.service_type = new.service_type.trim().to_string();

        let state = self.store.insert(QueueState::from_new(new, Utc::now())).await?;
        self.committed();

        tracing::info!(
            queue_id = state.id,
            service_type = %state.service_type,
            "Queue created"
        );
        Ok(state)
    }

    /// Update configuration fields. A `status` in the update is routed through
    /// the transition table; writing the current status again is a no-op.
    #[tracing::instrument(name = "queue.update", skip_all, fields(queue_id = queue_id))]
    pub async fn update(
        &self,
        queue_id: QueueId,
        update: QueueUpdate,
    ) -> Result<QueueState, QueueError> {
        let (state, _) = self
            .mutate(queue_id, "update", |state| {
                update.apply_fields(state)?;
                if let Some(target) = update.status {
                    if target != state.status {
                        state.status = next_status(state.status, target.target_action())?;
                    }
                }
                Ok(())
            })
            .await?;

        Ok(state)
    }

    #[tracing::instrument(name = "queue.delete", skip_all, fields(queue_id = queue_id))]
    pub async fn delete(&self, queue_id: QueueId) -> Result<(), QueueError> {
        let lock = self.lock_for(queue_id);
        {
            let _guard = lock.lock().await;
            if !self.store.delete(queue_id).await? {
                self.release_missing(queue_id);
                return Err(QueueError::NotFound(queue_id));
            }
            self.committed();
        }
        self.locks.remove(&queue_id);

        tracing::info!(queue_id = queue_id, "Queue deleted");
        Ok(())
    }

    /// Hand out the next ticket number for this queue.
    ///
    /// Paused queues still take registrations; stopped queues do not.
    #[tracing::instrument(name = "queue.issue_ticket", skip_all, fields(queue_id = queue_id))]
    pub async fn issue_ticket(&self, queue_id: QueueId) -> Result<QueueState, QueueError> {
        let (state, ticket) = self
            .mutate(queue_id, "issue_ticket", |state| {
                if state.status == QueueStatus::Stopped {
                    return Err(QueueError::QueueNotActive {
                        queue_id,
                        status: state.status,
                    });
                }

                let issued = state
                    .last_issued_number
                    .unwrap_or(state.current_number)
                    .max(state.current_number);
                let ticket = issued + 1;

                if let Some(capacity) = state.daily_capacity() {
                    if ticket > capacity {
                        return Err(QueueError::CapacityExceeded { queue_id, capacity });
                    }
                }

                state.last_issued_number = Some(ticket);
                Ok(ticket)
            })
            .await?;

        QueueMetrics::record_ticket_issued();
        tracing::info!(queue_id = queue_id, ticket = ticket, "Ticket issued");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::fixtures::{new_queue, queue};
    use crate::store::MemoryQueueStore;

    fn controller_with(queues: Vec<QueueState>) -> QueueLifecycleController {
        QueueLifecycleController::new(Arc::new(MemoryQueueStore::with_queues(queues)))
    }

    #[tokio::test]
    async fn test_apply_action_changes_status() {
        let controller = controller_with(vec![queue(1, QueueStatus::Paused)]);

        let state = controller.apply_action(1, QueueAction::Start).await.unwrap();
        assert_eq!(state.status, QueueStatus::Active);
        assert_eq!(state.version, 1);

        let state = controller.apply_action(1, QueueAction::Stop).await.unwrap();
        assert_eq!(state.status, QueueStatus::Stopped);
        assert_eq!(controller.generation(), 2);
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_record_identical() {
        let controller = controller_with(vec![queue(1, QueueStatus::Stopped)]);
        let before = controller.get(1).await.unwrap();

        let err = controller.apply_action(1, QueueAction::Pause).await.unwrap_err();
        assert_eq!(
            err,
            QueueError::InvalidTransition {
                from: QueueStatus::Stopped,
                action: QueueAction::Pause
            }
        );

        let after = controller.get(1).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(controller.generation(), 0);
    }

    #[tokio::test]
    async fn test_reset_keeps_counters_by_default() {
        let mut paused = queue(1, QueueStatus::Paused);
        paused.current_number = 9;
        paused.last_called_number = 9;
        paused.total_served_today = 8;
        let controller = controller_with(vec![paused]);

        let state = controller.apply_action(1, QueueAction::Reset).await.unwrap();
        assert_eq!(state.status, QueueStatus::Active);
        assert_eq!(state.current_number, 9);
        assert_eq!(state.total_served_today, 8);
    }

    #[tokio::test]
    async fn test_reset_can_zero_counters() {
        let mut paused = queue(1, QueueStatus::Paused);
        paused.current_number = 9;
        paused.last_called_number = 9;
        paused.last_issued_number = Some(12);
        paused.total_served_today = 8;
        paused.total_skipped_today = 1;
        let controller = controller_with(vec![paused]);

        let state = controller
            .apply_action_with(1, QueueAction::Reset, ActionOptions { zero_counters: true })
            .await
            .unwrap();
        assert_eq!(state.status, QueueStatus::Active);
        assert_eq!(state.current_number, 0);
        assert_eq!(state.last_called_number, 0);
        assert_eq!(state.last_issued_number, Some(0));
        assert_eq!(state.total_served_today, 0);
        assert_eq!(state.total_skipped_today, 0);
    }

    #[tokio::test]
    async fn test_unknown_queue() {
        let controller = controller_with(vec![]);
        let err = controller.apply_action(42, QueueAction::Start).await.unwrap_err();
        assert_eq!(err, QueueError::NotFound(42));
    }

    #[tokio::test]
    async fn test_unknown_queue_leaves_no_lock_behind() {
        let controller = controller_with(vec![queue(1, QueueStatus::Active)]);

        for id in 1000..1200 {
            assert!(controller.apply_action(id, QueueAction::Start).await.is_err());
            assert!(controller.issue_ticket(id).await.is_err());
            assert!(controller.delete(id).await.is_err());
        }
        assert_eq!(controller.locks.len(), 0);

        // Existing queues keep their lock
        controller.apply_action(1, QueueAction::Pause).await.unwrap();
        assert_eq!(controller.locks.len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_action_reports_partial_failure() {
        let controller = controller_with(vec![
            queue(1, QueueStatus::Active),
            queue(2, QueueStatus::Stopped),
            queue(3, QueueStatus::Active),
            queue(4, QueueStatus::Active),
        ]);

        let result = controller
            .apply_all(QueueAction::Pause, ActionOptions::default())
            .await
            .unwrap();

        assert_eq!(result.succeeded, vec![1, 3, 4]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].queue_id, 2);
        assert_eq!(result.failed[0].code, "INVALID_TRANSITION");
        assert!(!result.is_complete_success());

        for id in [1, 3, 4] {
            assert_eq!(controller.get(id).await.unwrap().status, QueueStatus::Paused);
        }
        assert_eq!(controller.get(2).await.unwrap().status, QueueStatus::Stopped);
    }

    #[tokio::test]
    async fn test_create_validates_and_trims() {
        let controller = controller_with(vec![]);

        let mut bad = new_queue("  ");
        bad.average_consultation_time = 10;
        assert!(matches!(
            controller.create(bad).await,
            Err(QueueError::Validation(_))
        ));

        let state = controller.create(new_queue("  Poli Anak ")).await.unwrap();
        assert_eq!(state.id, 1);
        assert_eq!(state.service_type, "Poli Anak");
        assert_eq!(state.status, QueueStatus::Paused);
    }

    #[tokio::test]
    async fn test_update_routes_status_through_transitions() {
        let controller = controller_with(vec![queue(1, QueueStatus::Stopped)]);

        let update = QueueUpdate {
            status: Some(QueueStatus::Paused),
            max_queue_per_hour: Some(20),
            ..Default::default()
        };
        let err = controller.update(1, update).await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition { .. }));
        // Field changes in the same request are not applied either
        assert_eq!(controller.get(1).await.unwrap().max_queue_per_hour, 0);

        let update = QueueUpdate {
            status: Some(QueueStatus::Active),
            max_queue_per_hour: Some(20),
            ..Default::default()
        };
        let state = controller.update(1, update).await.unwrap();
        assert_eq!(state.status, QueueStatus::Active);
        assert_eq!(state.max_queue_per_hour, 20);
    }

    #[tokio::test]
    async fn test_update_same_status_is_noop_for_status() {
        let controller = controller_with(vec![queue(1, QueueStatus::Active)]);
        let update = QueueUpdate {
            status: Some(QueueStatus::Active),
            service_type: Some("Poli Mata".to_string()),
            ..Default::default()
        };
        let state = controller.update(1, update).await.unwrap();
        assert_eq!(state.status, QueueStatus::Active);
        assert_eq!(state.service_type, "Poli Mata");
    }

    #[tokio::test]
    async fn test_delete() {
        let controller = controller_with(vec![queue(1, QueueStatus::Active)]);
        controller.delete(1).await.unwrap();
        assert_eq!(controller.delete(1).await.unwrap_err(), QueueError::NotFound(1));
    }

    #[tokio::test]
    async fn test_issue_ticket() {
        let mut active = queue(1, QueueStatus::Active);
        active.current_number = 4;
        let controller = controller_with(vec![active, queue(2, QueueStatus::Stopped)]);

        let state = controller.issue_ticket(1).await.unwrap();
        assert_eq!(state.last_issued_number, Some(5));
        // One patient waiting at ten minutes each
        assert_eq!(state.estimated_wait_time, 10);

        let state = controller.issue_ticket(1).await.unwrap();
        assert_eq!(state.last_issued_number, Some(6));
        assert_eq!(state.estimated_wait_time, 20);

        let err = controller.issue_ticket(2).await.unwrap_err();
        assert!(matches!(err, QueueError::QueueNotActive { queue_id: 2, .. }));
    }

    #[tokio::test]
    async fn test_issue_ticket_respects_capacity() {
        let mut active = queue(1, QueueStatus::Active);
        active.max_queue_per_hour = 2;
        active.working_hours_end = crate::queue::fixtures::time("09:00");
        let controller = controller_with(vec![active]);

        controller.issue_ticket(1).await.unwrap();
        controller.issue_ticket(1).await.unwrap();
        let err = controller.issue_ticket(1).await.unwrap_err();
        assert_eq!(err, QueueError::CapacityExceeded { queue_id: 1, capacity: 2 });
    }

    #[tokio::test]
    async fn test_list_active() {
        let controller = controller_with(vec![
            queue(1, QueueStatus::Active),
            queue(2, QueueStatus::Paused),
            queue(3, QueueStatus::Active),
        ]);
        let active: Vec<_> = controller.list_active().await.unwrap().iter().map(|q| q.id).collect();
        assert_eq!(active, vec![1, 3]);
    }
}
