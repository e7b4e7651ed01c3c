use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::metrics::AnnouncementMetrics;
use crate::queue::Announcement;

use super::AnnouncementSink;

/// Delivery queue feeding one sink
#[derive(Clone)]
struct Lane {
    sink: &'static str,
    tx: mpsc::Sender<Announcement>,
}

/// Hands announcements to the sinks from background tasks, one per sink, so
/// the call-next path never waits on a sink and a slow sink never holds up
/// the others. Each sink still sees announcements in call order.
#[derive(Clone)]
pub struct AnnouncementPublisher {
    lanes: Arc<[Lane]>,
}

impl AnnouncementPublisher {
    /// Start one delivery task per sink. The returned handle completes once
    /// every task has stopped, which happens when `shutdown` fires or every
    /// publisher clone is dropped. Whatever is already queued is delivered.
    pub fn spawn(
        sinks: Vec<Arc<dyn AnnouncementSink>>,
        capacity: usize,
        shutdown: broadcast::Receiver<()>,
    ) -> (Self, JoinHandle<()>) {
        let names: Vec<&str> = sinks.iter().map(|s| s.name()).collect();

        let mut lanes = Vec::with_capacity(sinks.len());
        let mut workers = Vec::with_capacity(sinks.len());
        for sink in sinks {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            lanes.push(Lane {
                sink: sink.name(),
                tx,
            });
            workers.push(tokio::spawn(run(sink, rx, shutdown.resubscribe())));
        }

        tracing::info!(sinks = ?names, "Announcement publisher started");

        let handle = tokio::spawn(async move {
            for result in join_all(workers).await {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Announcement delivery task failed");
                }
            }
            tracing::info!("Announcement publisher stopped");
        });

        (
            Self {
                lanes: lanes.into(),
            },
            handle,
        )
    }

    /// Queue an announcement for every sink. A sink whose queue is full or
    /// closed misses it (and the drop is counted); the others still get it.
    pub fn publish(&self, announcement: Announcement) {
        for lane in self.lanes.iter() {
            if let Err(e) = lane.tx.try_send(announcement.clone()) {
                AnnouncementMetrics::record_dropped();
                tracing::warn!(sink = lane.sink, error = %e, "Announcement dropped");
            }
        }
    }
}

async fn run(
    sink: Arc<dyn AnnouncementSink>,
    mut rx: mpsc::Receiver<Announcement>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                rx.close();
                while let Some(announcement) = rx.recv().await {
                    deliver(sink.as_ref(), &announcement).await;
                }
                break;
            }
            next = rx.recv() => match next {
                Some(announcement) => deliver(sink.as_ref(), &announcement).await,
                None => break,
            },
        }
    }

    tracing::debug!(sink = sink.name(), "Announcement sink drained");
}

async fn deliver(sink: &dyn AnnouncementSink, announcement: &Announcement) {
    match sink.announce(announcement).await {
        Ok(()) => AnnouncementMetrics::record_delivered(sink.name()),
        Err(e) => {
            AnnouncementMetrics::record_failed(sink.name());
            tracing::error!(
                sink = sink.name(),
                queue_id = announcement.queue_id,
                number = announcement.number,
                error = %e,
                "Announcement delivery failed"
            );
        }
    }
}
