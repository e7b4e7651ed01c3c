//! Call-next: advance a queue to its next number and announce it.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::announcer::AnnouncementPublisher;
use crate::metrics::QueueMetrics;

use super::controller::QueueLifecycleController;
use super::error::QueueError;
use super::models::{Announcement, QueueId, QueueState};

/// Outcome of a successful call-next
#[derive(Debug, Clone, Serialize)]
pub struct CallResult {
    pub queue: QueueState,
    pub announcement: Announcement,
}

pub struct CallDispatcher {
    controller: Arc<QueueLifecycleController>,
    publisher: AnnouncementPublisher,
}

impl CallDispatcher {
    pub fn new(controller: Arc<QueueLifecycleController>, publisher: AnnouncementPublisher) -> Self {
        Self {
            controller,
            publisher,
        }
    }

    /// Call the next number on `queue_id`.
    ///
    /// The announcement is published after the queue lock is released; a
    /// failing sink never fails the call.
    #[tracing::instrument(name = "queue.call_next", skip_all, fields(queue_id = queue_id))]
    pub async fn call_next(&self, queue_id: QueueId) -> Result<CallResult, QueueError> {
        let (queue, announcement) = self
            .controller
            .mutate(queue_id, "call_next", advance_to_next)
            .await?;

        QueueMetrics::record_call();
        tracing::info!(
            queue_id = queue_id,
            number = announcement.number,
            service_type = %announcement.service_type,
            served_today = queue.total_served_today,
            "Called next number"
        );

        self.publisher.publish(announcement.clone());

        Ok(CallResult {
            queue,
            announcement,
        })
    }
}

/// Move `state` to its next number and build the announcement.
///
/// `total_served_today` is credited when the *next* number is called, which
/// counts the previously called patient as served. This mirrors what the
/// operator panels already report; changing it needs product sign-off.
pub(crate) fn advance_to_next(state: &mut QueueState) -> Result<Announcement, QueueError> {
    if !state.is_active() {
        return Err(QueueError::QueueNotActive {
            queue_id: state.id,
            status: state.status,
        });
    }
    if !state.has_next_number() {
        return Err(QueueError::QueueEmpty { queue_id: state.id });
    }

    let next = state.current_number + 1;
    state.current_number = next;
    state.last_called_number = next;
    state.total_served_today += 1;

    Ok(Announcement {
        queue_id: state.id,
        number: next,
        service_type: state.service_type.clone(),
        called_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::fixtures::queue;
    use crate::queue::QueueStatus;

    #[test]
    fn test_advance_updates_counters() {
        let mut state = queue(1, QueueStatus::Active);
        state.current_number = 5;
        state.last_called_number = 5;
        state.total_served_today = 10;
        state.total_skipped_today = 2;

        let announcement = advance_to_next(&mut state).unwrap();
        assert_eq!(announcement.number, 6);
        assert_eq!(announcement.service_type, "Poli Umum");
        assert_eq!(state.current_number, 6);
        assert_eq!(state.last_called_number, 6);
        assert_eq!(state.total_served_today, 11);
        assert_eq!(state.total_skipped_today, 2);
    }

    #[test]
    fn test_advance_requires_active() {
        for status in [QueueStatus::Paused, QueueStatus::Stopped] {
            let mut state = queue(1, status);
            let before = state.clone();
            let err = advance_to_next(&mut state).unwrap_err();
            assert_eq!(err, QueueError::QueueNotActive { queue_id: 1, status });
            assert_eq!(state, before);
        }
    }

    #[test]
    fn test_advance_on_exhausted_tickets() {
        let mut state = queue(1, QueueStatus::Active);
        state.current_number = 3;
        state.last_issued_number = Some(3);
        let err = advance_to_next(&mut state).unwrap_err();
        assert_eq!(err, QueueError::QueueEmpty { queue_id: 1 });
        assert_eq!(state.current_number, 3);
    }

    #[test]
    fn test_advance_on_reached_capacity() {
        let mut state = queue(1, QueueStatus::Active);
        state.max_queue_per_hour = 1;
        state.working_hours_end = crate::queue::fixtures::time("09:00");
        advance_to_next(&mut state).unwrap();
        let err = advance_to_next(&mut state).unwrap_err();
        assert_eq!(err, QueueError::QueueEmpty { queue_id: 1 });
    }
}
