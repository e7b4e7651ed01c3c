//! Server-Sent Events stream of call-next announcements for hallway
//! displays and text-to-speech clients.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::announcer::BroadcastSink;
use crate::metrics::AnnouncementMetrics;
use crate::queue::QueueId;
use crate::server::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Default, Deserialize)]
pub struct AnnouncementQuery {
    /// Only stream announcements for this queue
    pub queue_id: Option<QueueId>,
    /// Only stream announcements for this service type
    pub service_type: Option<String>,
}

/// GET /queue-managements/announcements
#[tracing::instrument(
    name = "sse.announcements",
    skip_all,
    fields(queue_id = ?query.queue_id, service_type = ?query.service_type)
)]
pub async fn announcement_stream(
    State(state): State<AppState>,
    Query(query): Query<AnnouncementQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let connection_id = Uuid::new_v4();
    tracing::info!(connection_id = %connection_id, "Announcement stream opened");

    Sse::new(create_stream(state.broadcast.clone(), query, connection_id)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("heartbeat"),
    )
}

/// Keeps the subscriber gauge current and logs when the client goes away
struct SubscriberGuard {
    connection_id: Uuid,
    sink: BroadcastSink,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        // `rx` is declared before the guard and is still counted here
        AnnouncementMetrics::set_subscribers(self.sink.subscriber_count().saturating_sub(1));
        tracing::info!(connection_id = %self.connection_id, "Announcement stream closed");
    }
}

fn create_stream(
    sink: BroadcastSink,
    query: AnnouncementQuery,
    connection_id: Uuid,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let rx = sink.subscribe();
    AnnouncementMetrics::set_subscribers(sink.subscriber_count());

    async_stream::stream! {
        let mut rx = rx;
        let _guard = SubscriberGuard { connection_id, sink };

        yield Ok(Event::default()
            .event("connected")
            .data(connection_id.to_string()));

        loop {
            match rx.recv().await {
                Ok(announcement) => {
                    if query.queue_id.is_some_and(|id| id != announcement.queue_id) {
                        continue;
                    }
                    if let Some(ref service_type) = query.service_type {
                        if *service_type != announcement.service_type {
                            continue;
                        }
                    }

                    match serde_json::to_string(&announcement) {
                        Ok(json) => yield Ok(Event::default().event("announcement").data(json)),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize announcement");
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        missed = missed,
                        "Announcement stream lagging, oldest announcements dropped"
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
