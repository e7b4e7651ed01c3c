//! Status transition table for a service queue.
//!
//! | action | from              | to      |
//! |--------|-------------------|---------|
//! | start  | paused, stopped   | active  |
//! | pause  | active            | paused  |
//! | stop   | active, paused    | stopped |
//! | reset  | paused            | active  |
//!
//! Every other pair is an `InvalidTransition`.

use super::error::QueueError;
use super::models::{QueueAction, QueueStatus};

/// Resolve the status reached by applying `action` to a queue in `from`.
pub fn next_status(from: QueueStatus, action: QueueAction) -> Result<QueueStatus, QueueError> {
    use QueueAction::*;
    use QueueStatus::*;

    match (from, action) {
        (Paused | Stopped, Start) => Ok(Active),
        (Active, Pause) => Ok(Paused),
        (Active | Paused, Stop) => Ok(Stopped),
        (Paused, Reset) => Ok(Active),
        _ => Err(QueueError::InvalidTransition { from, action }),
    }
}
