//! Queue records and the request shapes that mutate them.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::QueueError;

/// Queue identifier
pub type QueueId = i64;

/// Operational status of a service queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Active,
    Paused,
    Stopped,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Active => "active",
            QueueStatus::Paused => "paused",
            QueueStatus::Stopped => "stopped",
        }
    }

    /// The action an operator screen means when it writes this status directly.
    pub fn target_action(&self) -> QueueAction {
        match self {
            QueueStatus::Active => QueueAction::Start,
            QueueStatus::Paused => QueueAction::Pause,
            QueueStatus::Stopped => QueueAction::Stop,
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(QueueStatus::Active),
            "paused" => Ok(QueueStatus::Paused),
            "stopped" => Ok(QueueStatus::Stopped),
            other => Err(QueueError::Validation(format!("unknown status '{}'", other))),
        }
    }
}

/// Lifecycle action accepted by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueAction {
    Start,
    Pause,
    Stop,
    Reset,
}

impl QueueAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueAction::Start => "start",
            QueueAction::Pause => "pause",
            QueueAction::Stop => "stop",
            QueueAction::Reset => "reset",
        }
    }
}

impl std::fmt::Display for QueueAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-queue persistent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    pub id: QueueId,
    pub service_type: String,
    pub status: QueueStatus,
    /// Last number issued to the floor (called or skipped)
    pub current_number: u32,
    /// Number most recently announced
    pub last_called_number: u32,
    /// Highest ticket handed out by registration, when issuance is tracked
    #[serde(default)]
    pub last_issued_number: Option<u32>,
    pub total_served_today: u32,
    pub total_skipped_today: u32,
    /// Minutes
    pub estimated_wait_time: u32,
    #[serde(with = "time_of_day")]
    pub working_hours_start: NaiveTime,
    #[serde(with = "time_of_day")]
    pub working_hours_end: NaiveTime,
    pub max_queue_per_hour: u32,
    /// Minutes per patient
    pub average_consultation_time: u32,
    #[serde(default)]
    pub assigned_doctor: Option<i64>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueState {
    /// Build a fresh record from a creation request. The store assigns `id`.
    pub fn from_new(new: NewQueue, now: DateTime<Utc>) -> Self {
        let mut state = Self {
            id: 0,
            service_type: new.service_type,
            status: QueueStatus::Paused,
            current_number: 0,
            last_called_number: 0,
            last_issued_number: None,
            total_served_today: 0,
            total_skipped_today: 0,
            estimated_wait_time: new.estimated_wait_time.unwrap_or(0),
            working_hours_start: new.working_hours_start,
            working_hours_end: new.working_hours_end,
            max_queue_per_hour: new.max_queue_per_hour,
            average_consultation_time: new.average_consultation_time,
            assigned_doctor: new.assigned_doctor,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        state.refresh_estimated_wait();
        state
    }

    pub fn is_active(&self) -> bool {
        self.status == QueueStatus::Active
    }

    /// Numbers this queue can serve in one working day, or `None` when
    /// `max_queue_per_hour` is zero (no cap configured).
    pub fn daily_capacity(&self) -> Option<u32> {
        if self.max_queue_per_hour == 0 {
            return None;
        }
        let minutes = (self.working_hours_end - self.working_hours_start).num_minutes();
        if minutes <= 0 {
            return Some(0);
        }
        let capacity = i64::from(self.max_queue_per_hour) * minutes / 60;
        Some(u32::try_from(capacity).unwrap_or(u32::MAX))
    }

    /// Patients holding a ticket that has not been reached yet.
    pub fn waiting_count(&self) -> Option<u32> {
        self.last_issued_number
            .map(|issued| issued.saturating_sub(self.current_number))
    }

    /// Whether another number can be taken off the floor.
    pub fn has_next_number(&self) -> bool {
        if let Some(issued) = self.last_issued_number {
            if self.current_number >= issued {
                return false;
            }
        }
        match self.daily_capacity() {
            Some(capacity) => self.current_number < capacity,
            None => true,
        }
    }

    /// Recompute `estimated_wait_time` from the waiting count. When ticket
    /// issuance is not tracked the stored estimate is left as configured.
    pub fn refresh_estimated_wait(&mut self) {
        if let Some(waiting) = self.waiting_count() {
            self.estimated_wait_time = waiting.saturating_mul(self.average_consultation_time);
        }
    }

    /// Zero the daily counters. Status is left to the caller.
    pub fn zero_counters(&mut self) {
        self.current_number = 0;
        self.last_called_number = 0;
        self.total_served_today = 0;
        self.total_skipped_today = 0;
        if self.last_issued_number.is_some() {
            self.last_issued_number = Some(0);
        }
    }
}

/// Payload for creating a queue
#[derive(Debug, Clone, Deserialize)]
pub struct NewQueue {
    pub service_type: String,
    #[serde(with = "time_of_day")]
    pub working_hours_start: NaiveTime,
    #[serde(with = "time_of_day")]
    pub working_hours_end: NaiveTime,
    #[serde(default)]
    pub max_queue_per_hour: u32,
    pub average_consultation_time: u32,
    #[serde(default)]
    pub assigned_doctor: Option<i64>,
    #[serde(default)]
    pub estimated_wait_time: Option<u32>,
}

impl NewQueue {
    pub fn validate(&self) -> Result<(), QueueError> {
        validate_fields(
            &self.service_type,
            self.working_hours_start,
            self.working_hours_end,
            self.average_consultation_time,
        )
    }
}

/// Partial update sent by `PUT /queue-managements/{id}`.
///
/// A `status` here is never written directly; the controller turns it into
/// the matching lifecycle action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueUpdate {
    #[serde(default)]
    pub status: Option<QueueStatus>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default, with = "time_of_day::option")]
    pub working_hours_start: Option<NaiveTime>,
    #[serde(default, with = "time_of_day::option")]
    pub working_hours_end: Option<NaiveTime>,
    #[serde(default)]
    pub max_queue_per_hour: Option<u32>,
    #[serde(default)]
    pub average_consultation_time: Option<u32>,
    #[serde(default)]
    pub estimated_wait_time: Option<u32>,
    #[serde(default)]
    pub assigned_doctor: Option<i64>,
}

impl QueueUpdate {
    /// Apply the non-status fields and validate the result.
    pub fn apply_fields(&self, state: &mut QueueState) -> Result<(), QueueError> {
        if let Some(ref service_type) = self.service_type {
            state.service_type = service_type.trim().to_string();
        }
        if let Some(start) = self.working_hours_start {
            state.working_hours_start = start;
        }
        if let Some(end) = self.working_hours_end {
            state.working_hours_end = end;
        }
        if let Some(max) = self.max_queue_per_hour {
            state.max_queue_per_hour = max;
        }
        if let Some(avg) = self.average_consultation_time {
            state.average_consultation_time = avg;
        }
        if let Some(wait) = self.estimated_wait_time {
            state.estimated_wait_time = wait;
        }
        if let Some(doctor) = self.assigned_doctor {
            state.assigned_doctor = Some(doctor);
        }

        validate_fields(
            &state.service_type,
            state.working_hours_start,
            state.working_hours_end,
            state.average_consultation_time,
        )
    }
}

fn validate_fields(
    service_type: &str,
    start: NaiveTime,
    end: NaiveTime,
    average_consultation_time: u32,
) -> Result<(), QueueError> {
    if service_type.trim().is_empty() {
        return Err(QueueError::Validation("service_type is required".to_string()));
    }
    if start >= end {
        return Err(QueueError::Validation(
            "working_hours_start must be before working_hours_end".to_string(),
        ));
    }
    if average_consultation_time == 0 {
        return Err(QueueError::Validation(
            "average_consultation_time must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Payload handed to the announcement sink after a successful call-next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub queue_id: QueueId,
    pub number: u32,
    pub service_type: String,
    pub called_at: DateTime<Utc>,
}

/// `HH:MM` time-of-day (de)serialization. `HH:MM:SS` is accepted on input.
pub mod time_of_day {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(s: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(s, FORMAT).or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{de, Deserialize, Deserializer};

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            let s: Option<String> = Option::deserialize(deserializer)?;
            s.map(|s| super::parse(&s).map_err(de::Error::custom))
                .transpose()
        }
    }
}
