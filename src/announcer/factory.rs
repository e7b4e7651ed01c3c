//! Announcement sink factory

use std::sync::Arc;

use crate::config::AnnouncerConfig;

use super::redis_sink::RedisSink;
use super::{AnnounceError, AnnouncementSink, LogSink};

/// Create the external announcement sink selected by `announcer.backend`:
///
/// - `"redis"`: `RedisSink` publishing on `announcer.redis_channel`
/// - `"none"`: no external sink (the SSE broadcast still runs)
/// - `"log"` (default): `LogSink`
pub fn create_external_sink(
    config: &AnnouncerConfig,
) -> Result<Option<Arc<dyn AnnouncementSink>>, AnnounceError> {
    match config.backend.as_str() {
        "redis" => {
            let sink = RedisSink::new(config)?;
            tracing::info!(
                backend = "redis",
                channel = %sink.channel(),
                timeout_ms = config.publish_timeout_ms,
                max_retries = config.max_retries,
                "Creating Redis announcement sink"
            );
            Ok(Some(Arc::new(sink)))
        }
        "none" => {
            tracing::info!("External announcement sink disabled");
            Ok(None)
        }
        _ => {
            tracing::info!(backend = "log", "Creating log announcement sink");
            Ok(Some(Arc::new(LogSink)))
        }
    }
}
