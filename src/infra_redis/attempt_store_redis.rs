use crate::application_impl::WINDOW;
use crate::domain_model::{AttemptRecord, ClientKey};
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::Duration;

const ATTEMPTS: &str = "attempts";
const LAST_ATTEMPT_MS: &str = "last_attempt_ms";
const BLOCKED_UNTIL_MS: &str = "blocked_until_ms";

/// One hash per client key. Keys carry a TTL so idle clients age out on their own.
pub struct RedisAttemptStore {
    conn: ConnectionManager,
    prefix: String,
    retention: Duration,
}

impl RedisAttemptStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, retention: Duration) -> Self {
        RedisAttemptStore {
            conn,
            prefix: prefix.into(),
            retention,
        }
    }

    fn key(&self, client_key: &ClientKey) -> String {
        format!("{}:{}", self.prefix, client_key)
    }

    fn ttl_secs(&self, record: &AttemptRecord) -> i64 {
        // never expire a key while its attempts still count
        let retention = (self.retention.as_secs() as i64).max(WINDOW.num_seconds());
        let block_left = record
            .blocked_until
            .map(|until| (until - record.last_attempt_at).num_seconds())
            .unwrap_or(0);
        retention.max(block_left).max(1)
    }
}

fn parse_field<T: std::str::FromStr>(
    key: &ClientKey,
    fields: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, AttemptStoreError> {
    fields
        .get(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| AttemptStoreError::Corrupt {
                key: key.clone(),
                reason: format!("field {name} is not a number: {raw:?}"),
            })
        })
        .transpose()
}

fn from_millis(key: &ClientKey, millis: i64) -> Result<DateTime<Utc>, AttemptStoreError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| AttemptStoreError::Corrupt {
        key: key.clone(),
        reason: format!("timestamp out of range: {millis}"),
    })
}

#[async_trait::async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn get(&self, client_key: &ClientKey) -> Result<Option<AttemptRecord>, AttemptStoreError> {
        let key = self.key(client_key);
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(&key)
            .await
            .map_err(|e| AttemptStoreError::Store(e.to_string()))?;
        if fields.is_empty() {
            return Ok(None);
        }

        let attempts = parse_field::<u32>(client_key, &fields, ATTEMPTS)?.unwrap_or(0);
        let last_attempt_ms = parse_field::<i64>(client_key, &fields, LAST_ATTEMPT_MS)?
            .ok_or_else(|| AttemptStoreError::Corrupt {
                key: client_key.clone(),
                reason: format!("missing {LAST_ATTEMPT_MS}"),
            })?;
        let blocked_until = parse_field::<i64>(client_key, &fields, BLOCKED_UNTIL_MS)?
            .map(|ms| from_millis(client_key, ms))
            .transpose()?;

        Ok(Some(AttemptRecord {
            client_key: client_key.clone(),
            attempts,
            last_attempt_at: from_millis(client_key, last_attempt_ms)?,
            blocked_until,
        }))
    }

    async fn upsert(&self, record: &AttemptRecord) -> Result<(), AttemptStoreError> {
        let key = self.key(&record.client_key);
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(
                &key,
                &[
                    (ATTEMPTS, record.attempts.to_string()),
                    (LAST_ATTEMPT_MS, record.last_attempt_at.timestamp_millis().to_string()),
                ],
            )
            .ignore();
        match record.blocked_until {
            Some(until) => {
                pipe.hset(&key, BLOCKED_UNTIL_MS, until.timestamp_millis())
                    .ignore();
            }
            None => {
                pipe.hdel(&key, BLOCKED_UNTIL_MS).ignore();
            }
        }
        pipe.expire(&key, self.ttl_secs(record)).ignore();

        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| AttemptStoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn sweep(
        &self,
        _stale_before: DateTime<Utc>,
        _now: DateTime<Utc>,
    ) -> Result<u64, AttemptStoreError> {
        // key TTLs already evict idle clients
        Ok(0)
    }
}
