//! PostgreSQL-based queue store.
//!
//! One row per queue in `queue_managements`. Writes are conditional on the
//! `version` column, which makes `save` a compare-and-swap across instances.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::queue::{QueueId, QueueState, QueueStatus};

use super::{QueueStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS queue_managements (
    id                        BIGSERIAL PRIMARY KEY,
    service_type              TEXT        NOT NULL,
    status                    TEXT        NOT NULL,
    current_number            BIGINT      NOT NULL DEFAULT 0,
    last_called_number        BIGINT      NOT NULL DEFAULT 0,
    last_issued_number        BIGINT,
    total_served_today        BIGINT      NOT NULL DEFAULT 0,
    total_skipped_today       BIGINT      NOT NULL DEFAULT 0,
    estimated_wait_time       BIGINT      NOT NULL DEFAULT 0,
    working_hours_start       TIME        NOT NULL,
    working_hours_end         TIME        NOT NULL,
    max_queue_per_hour        BIGINT      NOT NULL DEFAULT 0,
    average_consultation_time BIGINT      NOT NULL,
    assigned_doctor           BIGINT,
    version                   BIGINT      NOT NULL DEFAULT 0,
    created_at                TIMESTAMPTZ NOT NULL,
    updated_at                TIMESTAMPTZ NOT NULL
)
"#;

const COLUMNS: &str = "id, service_type, status, current_number, last_called_number, \
    last_issued_number, total_served_today, total_skipped_today, estimated_wait_time, \
    working_hours_start, working_hours_end, max_queue_per_hour, average_consultation_time, \
    assigned_doctor, version, created_at, updated_at";

pub struct PostgresQueueStore {
    pool: PgPool,
}

impl PostgresQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `queue_managements` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        tracing::info!("queue_managements schema ready");
        Ok(())
    }
}

fn to_u32(queue_id: QueueId, column: &str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt {
        queue_id,
        reason: format!("{} out of range: {}", column, value),
    })
}

fn row_to_state(row: &PgRow) -> Result<QueueState, StoreError> {
    let id: i64 = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<QueueStatus>()
        .map_err(|e| StoreError::Corrupt {
            queue_id: id,
            reason: e.to_string(),
        })?;
    let last_issued: Option<i64> = row.try_get("last_issued_number")?;
    let version: i64 = row.try_get("version")?;

    Ok(QueueState {
        id,
        service_type: row.try_get("service_type")?,
        status,
        current_number: to_u32(id, "current_number", row.try_get("current_number")?)?,
        last_called_number: to_u32(id, "last_called_number", row.try_get("last_called_number")?)?,
        last_issued_number: last_issued
            .map(|v| to_u32(id, "last_issued_number", v))
            .transpose()?,
        total_served_today: to_u32(id, "total_served_today", row.try_get("total_served_today")?)?,
        total_skipped_today: to_u32(id, "total_skipped_today", row.try_get("total_skipped_today")?)?,
        estimated_wait_time: to_u32(id, "estimated_wait_time", row.try_get("estimated_wait_time")?)?,
        working_hours_start: row.try_get::<NaiveTime, _>("working_hours_start")?,
        working_hours_end: row.try_get::<NaiveTime, _>("working_hours_end")?,
        max_queue_per_hour: to_u32(id, "max_queue_per_hour", row.try_get("max_queue_per_hour")?)?,
        average_consultation_time: to_u32(
            id,
            "average_consultation_time",
            row.try_get("average_consultation_time")?,
        )?,
        assigned_doctor: row.try_get("assigned_doctor")?,
        version: version as u64,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl QueueStore for PostgresQueueStore {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn list(&self) -> Result<Vec<QueueState>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {} FROM queue_managements ORDER BY id", COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_state).collect()
    }

    async fn get(&self, id: QueueId) -> Result<Option<QueueState>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM queue_managements WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_state).transpose()
    }

    async fn insert(&self, state: QueueState) -> Result<QueueState, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO queue_managements (
                service_type, status, current_number, last_called_number, last_issued_number,
                total_served_today, total_skipped_today, estimated_wait_time,
                working_hours_start, working_hours_end, max_queue_per_hour,
                average_consultation_time, assigned_doctor, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id
            "#,
        )
        .bind(&state.service_type)
        .bind(state.status.as_str())
        .bind(state.current_number as i64)
        .bind(state.last_called_number as i64)
        .bind(state.last_issued_number.map(|n| n as i64))
        .bind(state.total_served_today as i64)
        .bind(state.total_skipped_today as i64)
        .bind(state.estimated_wait_time as i64)
        .bind(state.working_hours_start)
        .bind(state.working_hours_end)
        .bind(state.max_queue_per_hour as i64)
        .bind(state.average_consultation_time as i64)
        .bind(state.assigned_doctor)
        .bind(state.version as i64)
        .bind(state.created_at)
        .bind(state.updated_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(queue_id = id, "Queue inserted into PostgreSQL");
        Ok(QueueState { id, ..state })
    }

    async fn save(&self, state: &QueueState, expected_version: u64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE queue_managements SET
                service_type = $3, status = $4, current_number = $5, last_called_number = $6,
                last_issued_number = $7, total_served_today = $8, total_skipped_today = $9,
                estimated_wait_time = $10, working_hours_start = $11, working_hours_end = $12,
                max_queue_per_hour = $13, average_consultation_time = $14, assigned_doctor = $15,
                version = $16, updated_at = $17
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(state.id)
        .bind(expected_version as i64)
        .bind(&state.service_type)
        .bind(state.status.as_str())
        .bind(state.current_number as i64)
        .bind(state.last_called_number as i64)
        .bind(state.last_issued_number.map(|n| n as i64))
        .bind(state.total_served_today as i64)
        .bind(state.total_skipped_today as i64)
        .bind(state.estimated_wait_time as i64)
        .bind(state.working_hours_start)
        .bind(state.working_hours_end)
        .bind(state.max_queue_per_hour as i64)
        .bind(state.average_consultation_time as i64)
        .bind(state.assigned_doctor)
        .bind(state.version as i64)
        .bind(state.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either the row is gone or another writer bumped the version
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT version FROM queue_managements WHERE id = $1")
                    .bind(state.id)
                    .fetch_optional(&self.pool)
                    .await?;

            return Err(match exists {
                Some(_) => StoreError::VersionConflict {
                    queue_id: state.id,
                    expected: expected_version,
                },
                None => StoreError::NotFound(state.id),
            });
        }

        Ok(())
    }

    async fn delete(&self, id: QueueId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM queue_managements WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
