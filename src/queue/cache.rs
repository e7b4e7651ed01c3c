//! Read-side snapshot cache.
//!
//! Polling clients hit the list and statistics endpoints every few seconds.
//! A snapshot is reused until its TTL runs out or the controller commits a
//! write, whichever comes first. Refreshes are single-flight.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct Entry<T> {
    value: T,
    generation: u64,
    loaded_at: Instant,
}

pub struct SnapshotCache<T> {
    ttl: Duration,
    slot: Mutex<Option<Entry<T>>>,
}

impl<T: Clone> SnapshotCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value for `generation`, loading a new one when the
    /// entry is missing, expired, or from an older generation.
    pub async fn get_or_refresh<F, Fut, E>(&self, generation: u64, load: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(entry) = slot.as_ref() {
            if entry.generation == generation && entry.loaded_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
        }

        let value = load().await?;
        *slot = Some(Entry {
            value: value.clone(),
            generation,
            loaded_at: Instant::now(),
        });
        Ok(value)
    }
}
