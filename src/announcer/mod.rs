//! Announcement sinks for called numbers.
//!
//! Call-next hands `{number, service_type}` to the [`AnnouncementPublisher`],
//! which feeds each configured sink in call order from its own background
//! task:
//!
//! - [`BroadcastSink`]: in-process fan-out, backs the SSE display stream
//! - [`LogSink`]: structured log line per announcement
//! - [`RedisSink`]: Redis pub/sub for text-to-speech and hallway displays,
//!   bounded by a publish timeout with exponential-backoff retry

mod backoff;
mod broadcast;
mod factory;
mod publisher;
mod redis_sink;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use broadcast::BroadcastSink;
pub use factory::create_external_sink;
pub use publisher::AnnouncementPublisher;
pub use redis_sink::RedisSink;

use async_trait::async_trait;
use thiserror::Error;

use crate::queue::Announcement;

#[derive(Debug, Error)]
pub enum AnnounceError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish timed out after {0} ms")]
    Timeout(u64),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Destination for call-next announcements.
#[async_trait]
pub trait AnnouncementSink: Send + Sync {
    /// Sink name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    async fn announce(&self, announcement: &Announcement) -> Result<(), AnnounceError>;
}

/// Writes each announcement to the log.
pub struct LogSink;

#[async_trait]
impl AnnouncementSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn announce(&self, announcement: &Announcement) -> Result<(), AnnounceError> {
        tracing::info!(
            queue_id = announcement.queue_id,
            number = announcement.number,
            service_type = %announcement.service_type,
            "Announcement"
        );
        Ok(())
    }
}
