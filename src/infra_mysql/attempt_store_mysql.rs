use crate::domain_model::{AttemptRecord, ClientKey};
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row};

/// Backed by the `rate_limits` table, see `sql/rate_limits.sql`.
pub struct MySqlAttemptStore {
    pool: MySqlPool,
}

impl MySqlAttemptStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlAttemptStore { pool }
    }
}

#[async_trait::async_trait]
impl AttemptStore for MySqlAttemptStore {
    async fn get(&self, key: &ClientKey) -> Result<Option<AttemptRecord>, AttemptStoreError> {
        let row = sqlx::query(
            "SELECT attempts, last_attempt, blocked_until FROM rate_limits WHERE ip = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AttemptStoreError::Store(format!("query rate limit: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let corrupt = |e: sqlx::Error| AttemptStoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        };
        Ok(Some(AttemptRecord {
            client_key: key.clone(),
            attempts: row.try_get::<u32, _>("attempts").map_err(corrupt)?,
            last_attempt_at: row
                .try_get::<DateTime<Utc>, _>("last_attempt")
                .map_err(corrupt)?,
            blocked_until: row
                .try_get::<Option<DateTime<Utc>>, _>("blocked_until")
                .map_err(corrupt)?,
        }))
    }

    async fn upsert(&self, record: &AttemptRecord) -> Result<(), AttemptStoreError> {
        sqlx::query(
            r#"
INSERT INTO rate_limits (ip, attempts, last_attempt, blocked_until)
VALUES (?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
    attempts = VALUES(attempts),
    last_attempt = VALUES(last_attempt),
    blocked_until = VALUES(blocked_until)
"#,
        )
        .bind(record.client_key.as_str())
        .bind(record.attempts)
        .bind(record.last_attempt_at)
        .bind(record.blocked_until)
        .execute(&self.pool)
        .await
        .map_err(|e| AttemptStoreError::Store(e.to_string()))?;

        Ok(())
    }

    async fn sweep(
        &self,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, AttemptStoreError> {
        let result = sqlx::query(
            r#"
DELETE FROM rate_limits
WHERE last_attempt < ?
  AND (blocked_until IS NULL OR blocked_until <= ?)
"#,
        )
        .bind(stale_before)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AttemptStoreError::Store(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
