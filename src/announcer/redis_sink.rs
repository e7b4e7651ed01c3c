//! Redis pub/sub announcement sink.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::config::AnnouncerConfig;
use crate::queue::Announcement;

use super::backoff::{BackoffConfig, ExponentialBackoff};
use super::{AnnounceError, AnnouncementSink};

/// Publishes announcements as JSON on a Redis channel.
///
/// Each attempt (connect included) is bounded by `publish_timeout`; failed
/// attempts are retried up to `max_retries` times with exponential backoff.
pub struct RedisSink {
    client: redis::Client,
    channel: String,
    connection: Mutex<Option<ConnectionManager>>,
    publish_timeout: Duration,
    max_retries: u32,
    backoff: BackoffConfig,
}

impl RedisSink {
    pub fn new(config: &AnnouncerConfig) -> Result<Self, AnnounceError> {
        // Only parses the URL; the connection is opened on first publish
        let client = redis::Client::open(config.redis_url.as_str())?;

        Ok(Self {
            client,
            channel: config.redis_channel.clone(),
            connection: Mutex::new(None),
            publish_timeout: Duration::from_millis(config.publish_timeout_ms),
            max_retries: config.max_retries,
            backoff: BackoffConfig {
                initial_delay_ms: config.retry_initial_delay_ms,
                ..BackoffConfig::default()
            },
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish_once(&self, payload: &str) -> Result<(), AnnounceError> {
        let attempt = async {
            let mut slot = self.connection.lock().await;
            let mut conn = match slot.as_ref() {
                Some(conn) => conn.clone(),
                None => {
                    let conn = self.client.get_connection_manager().await?;
                    *slot = Some(conn.clone());
                    conn
                }
            };
            drop(slot);

            let _receivers: i64 = conn.publish(&self.channel, payload).await?;
            Ok::<(), AnnounceError>(())
        };

        match timeout(self.publish_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(AnnounceError::Timeout(self.publish_timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl AnnouncementSink for RedisSink {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn announce(&self, announcement: &Announcement) -> Result<(), AnnounceError> {
        let payload = serde_json::to_string(announcement)?;
        let mut backoff = ExponentialBackoff::with_config(self.backoff.clone());
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.publish_once(&payload).await {
                Ok(()) => {
                    if attempts > 1 {
                        tracing::info!(
                            channel = %self.channel,
                            attempts = attempts,
                            "Announcement published after retry"
                        );
                    }
                    return Ok(());
                }
                Err(e) if attempts > self.max_retries => {
                    return Err(AnnounceError::RetriesExhausted {
                        attempts,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    // Force a fresh connection on the next attempt
                    *self.connection.lock().await = None;
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        channel = %self.channel,
                        attempt = attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Announcement publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
