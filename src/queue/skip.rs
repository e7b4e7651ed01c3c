//! Skip: move past the current number without crediting it as served.

use std::sync::Arc;

use crate::metrics::QueueMetrics;

use super::controller::QueueLifecycleController;
use super::error::QueueError;
use super::models::{QueueId, QueueState};

pub struct SkipHandler {
    controller: Arc<QueueLifecycleController>,
}

impl SkipHandler {
    pub fn new(controller: Arc<QueueLifecycleController>) -> Self {
        Self { controller }
    }

    #[tracing::instrument(name = "queue.skip", skip_all, fields(queue_id = queue_id))]
    pub async fn skip(&self, queue_id: QueueId) -> Result<QueueState, QueueError> {
        let (queue, skipped) = self
            .controller
            .mutate(queue_id, "skip", skip_current)
            .await?;

        QueueMetrics::record_skip();
        tracing::info!(
            queue_id = queue_id,
            skipped_number = skipped,
            skipped_today = queue.total_skipped_today,
            "Skipped number"
        );

        Ok(queue)
    }
}

/// Advance past the next number. Returns the number that was skipped.
pub(crate) fn skip_current(state: &mut QueueState) -> Result<u32, QueueError> {
    if !state.is_active() {
        return Err(QueueError::QueueNotActive {
            queue_id: state.id,
            status: state.status,
        });
    }
    if !state.has_next_number() {
        return Err(QueueError::QueueEmpty { queue_id: state.id });
    }

    state.current_number += 1;
    state.total_skipped_today += 1;
    Ok(state.current_number)
}
