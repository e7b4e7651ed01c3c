//! Cross-queue summaries for dashboard display.

use std::collections::BTreeMap;

use serde::Serialize;

use super::models::{QueueState, QueueStatus};

/// Per-service-type group in [`QueueStats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceTypeStats {
    pub count: usize,
    /// Mean `estimated_wait_time` over the group, minutes
    pub average_wait_time: f64,
    pub total_served_today: u64,
}

/// Aggregate view over a set of queues
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStats {
    pub total_queues: usize,
    pub active_queues: usize,
    pub paused_queues: usize,
    pub stopped_queues: usize,
    /// Mean `estimated_wait_time` over active queues, minutes
    pub average_wait_time: f64,
    pub total_served_today: u64,
    pub total_skipped_today: u64,
    pub by_service_type: BTreeMap<String, ServiceTypeStats>,
}

/// Summarize `queues`. Pure; the same input always yields the same output.
pub fn aggregate(queues: &[QueueState]) -> QueueStats {
    let mut stats = QueueStats {
        total_queues: queues.len(),
        ..Default::default()
    };

    let mut active_wait_sum = 0u64;
    let mut group_wait_sums: BTreeMap<&str, u64> = BTreeMap::new();

    for queue in queues {
        match queue.status {
            QueueStatus::Active => {
                stats.active_queues += 1;
                active_wait_sum += queue.estimated_wait_time as u64;
            }
            QueueStatus::Paused => stats.paused_queues += 1,
            QueueStatus::Stopped => stats.stopped_queues += 1,
        }

        stats.total_served_today += queue.total_served_today as u64;
        stats.total_skipped_today += queue.total_skipped_today as u64;

        let group = stats
            .by_service_type
            .entry(queue.service_type.clone())
            .or_default();
        group.count += 1;
        group.total_served_today += queue.total_served_today as u64;
        *group_wait_sums.entry(queue.service_type.as_str()).or_default() +=
            queue.estimated_wait_time as u64;
    }

    stats.average_wait_time = mean(active_wait_sum, stats.active_queues);
    for (service_type, group) in stats.by_service_type.iter_mut() {
        let sum = group_wait_sums.get(service_type.as_str()).copied().unwrap_or(0);
        group.average_wait_time = mean(sum, group.count);
    }

    stats
}

fn mean(sum: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}
