use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::queue::Announcement;

use super::{AnnounceError, AnnouncementSink};

/// In-process fan-out to every subscribed display stream.
///
/// Having no subscribers is not an error; slow subscribers lag and lose the
/// oldest announcements.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Announcement>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Announcement> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl AnnouncementSink for BroadcastSink {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn announce(&self, announcement: &Announcement) -> Result<(), AnnounceError> {
        let delivered = self.tx.send(announcement.clone()).unwrap_or(0);
        tracing::trace!(
            queue_id = announcement.queue_id,
            subscribers = delivered,
            "Announcement broadcast"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn announcement(number: u32) -> Announcement {
        Announcement {
            queue_id: 1,
            number,
            service_type: "Poli Umum".to_string(),
            called_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_no_subscribers_is_ok() {
        let sink = BroadcastSink::new(8);
        assert!(sink.announce(&announcement(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);

        sink.announce(&announcement(1)).await.unwrap();
        sink.announce(&announcement(2)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().number, 1);
        assert_eq!(rx.recv().await.unwrap().number, 2);
    }
}
