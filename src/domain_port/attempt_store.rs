use crate::domain_model::{AttemptRecord, ClientKey};
use chrono::{DateTime, Utc};

/// Durable keyed attempt counters. Writes for one key must never affect another;
/// concurrent writes to the same key may resolve last-writer-wins.
#[async_trait::async_trait]
pub trait AttemptStore: Send + Sync {
    async fn get(&self, key: &ClientKey) -> Result<Option<AttemptRecord>, AttemptStoreError>;

    async fn upsert(&self, record: &AttemptRecord) -> Result<(), AttemptStoreError>;

    /// Drops records last touched before `stale_before` that are not blocked at `now`.
    /// Returns how many records were removed.
    async fn sweep(
        &self,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, AttemptStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AttemptStoreError {
    #[error("infra error: {0}")]
    Store(String),
    #[error("corrupt record for {key}: {reason}")]
    Corrupt { key: ClientKey, reason: String },
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}
