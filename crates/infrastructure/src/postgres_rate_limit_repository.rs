//! PostgreSQL-backed rate limit repository using the `rate_limits` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use rihlah_application::{AttemptOutcome, RateLimitRepository};
use rihlah_core::{AppError, AppResult};
use rihlah_domain::{ActionType, RateLimitRecord, RateLimitRecordId};

/// PostgreSQL implementation of the rate limit repository port.
#[derive(Clone)]
pub struct PostgresRateLimitRepository {
    pool: PgPool,
}

impl PostgresRateLimitRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitRepository for PostgresRateLimitRepository {
    async fn record_attempt(
        &self,
        identifier: &str,
        action_type: ActionType,
        max_attempts: i32,
        window_minutes: i64,
    ) -> AppResult<AttemptOutcome> {
        // Single-statement UPSERT so concurrent checks for the same pair
        // serialize on the row and the counter can never pass the ceiling.
        // An expired window restarts the counter; a saturated active window
        // leaves the row untouched, including updated_at, which lets the
        // RETURNING clause report whether the attempt was counted.
        let row = sqlx::query_as::<_, AttemptRow>(
            r#"
            INSERT INTO rate_limits AS r (identifier, action_type, attempt_count, window_start)
            VALUES ($1, $2, 1, now())
            ON CONFLICT (identifier, action_type) DO UPDATE
            SET
                attempt_count = CASE
                    WHEN r.window_start + make_interval(mins => $3::int) <= now()
                    THEN 1
                    WHEN r.attempt_count < $4
                    THEN r.attempt_count + 1
                    ELSE r.attempt_count
                END,
                window_start = CASE
                    WHEN r.window_start + make_interval(mins => $3::int) <= now()
                    THEN now()
                    ELSE r.window_start
                END,
                updated_at = CASE
                    WHEN r.window_start + make_interval(mins => $3::int) <= now()
                        OR r.attempt_count < $4
                    THEN now()
                    ELSE r.updated_at
                END
            RETURNING attempt_count, window_start, (updated_at = now()) AS counted
            "#,
        )
        .bind(identifier)
        .bind(action_type.as_str())
        .bind(window_minutes)
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to record rate limit attempt: {error}"))
        })?;

        Ok(AttemptOutcome {
            counted: row.counted,
            attempt_count: row.attempt_count,
            window_start: row.window_start,
        })
    }

    async fn list(&self) -> AppResult<Vec<RateLimitRecord>> {
        let rows = sqlx::query_as::<_, RateLimitRow>(
            r#"
            SELECT id, identifier, action_type, attempt_count, window_start,
                   created_at, updated_at
            FROM rate_limits
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list rate limits: {error}")))?;

        rows.into_iter().map(RateLimitRow::into_record).collect()
    }

    async fn reset(&self, id: RateLimitRecordId) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE rate_limits
            SET attempt_count = 0, window_start = now(), updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to reset rate limit: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "rate limit record '{id}' does not exist"
            )));
        }

        Ok(())
    }

    async fn delete(&self, id: RateLimitRecordId) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM rate_limits
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete rate limit: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "rate limit record '{id}' does not exist"
            )));
        }

        Ok(())
    }

    async fn delete_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM rate_limits")
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to clear rate limits: {error}"))
            })?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM rate_limits
            WHERE window_start < $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to cleanup expired rate limits: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    attempt_count: i32,
    window_start: DateTime<Utc>,
    counted: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct RateLimitRow {
    id: Uuid,
    identifier: String,
    action_type: String,
    attempt_count: i32,
    window_start: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RateLimitRow {
    fn into_record(self) -> AppResult<RateLimitRecord> {
        let action_type = self.action_type.parse::<ActionType>().map_err(|error| {
            AppError::Internal(format!("corrupt rate limit row '{}': {error}", self.id))
        })?;

        Ok(RateLimitRecord {
            id: RateLimitRecordId::from_uuid(self.id),
            identifier: self.identifier,
            action_type,
            attempt_count: self.attempt_count,
            window_start: self.window_start,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
