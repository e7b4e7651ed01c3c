//! Queue session management.
//!
//! A service queue is one first-come-first-served line for a poli/doctor
//! pairing. This module owns its lifecycle:
//!
//! - [`QueueLifecycleController`]: status transitions, per-queue
//!   serialization, bulk actions, configuration writes
//! - [`CallDispatcher`]: call the next number and announce it
//! - [`SkipHandler`]: move past a number without crediting it as served
//! - [`aggregate`]: pure cross-queue summaries
//! - [`SnapshotCache`]: TTL cache for polled read endpoints

mod cache;
mod controller;
mod dispatcher;
mod error;
mod models;
mod skip;
mod stats;
mod transitions;

pub use cache::SnapshotCache;
pub use controller::{ActionOptions, BulkActionResult, BulkFailure, QueueLifecycleController};
pub use dispatcher::{CallDispatcher, CallResult};
pub use error::QueueError;
pub use models::{
    time_of_day, Announcement, NewQueue, QueueAction, QueueId, QueueState, QueueStatus,
    QueueUpdate,
};
pub use skip::SkipHandler;
pub use stats::{aggregate, QueueStats, ServiceTypeStats};
pub use transitions::next_status;

#[cfg(test)]
pub(crate) use models::fixtures;
