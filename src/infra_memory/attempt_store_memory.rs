use crate::domain_model::{AttemptRecord, ClientKey};
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Process-local store for single-instance deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    records: DashMap<ClientKey, AttemptRecord>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        MemoryAttemptStore {
            records: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn get(&self, key: &ClientKey) -> Result<Option<AttemptRecord>, AttemptStoreError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, record: &AttemptRecord) -> Result<(), AttemptStoreError> {
        self.records
            .insert(record.client_key.clone(), record.clone());
        Ok(())
    }

    async fn sweep(
        &self,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, AttemptStoreError> {
        let before = self.records.len();
        self.records
            .retain(|_, record| !record.is_stale_at(stale_before, now));
        Ok(before.saturating_sub(self.records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(key: &str, last: DateTime<Utc>) -> AttemptRecord {
        AttemptRecord {
            client_key: ClientKey::from(key),
            attempts: 1,
            last_attempt_at: last,
            blocked_until: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_the_record_for_a_key() -> anyhow::Result<()> {
        let store = MemoryAttemptStore::new();
        let now = Utc::now();
        store.upsert(&record("1.1.1.1", now)).await?;

        let mut updated = record("1.1.1.1", now);
        updated.attempts = 4;
        store.upsert(&updated).await?;
        store.upsert(&record("2.2.2.2", now)).await?;

        assert_eq!(store.len(), 2);
        let got = store.get(&ClientKey::from("1.1.1.1")).await?;
        assert_eq!(got.map(|r| r.attempts), Some(4));
        assert!(store.get(&ClientKey::from("3.3.3.3")).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn sweep_keeps_recent_and_blocked_records() -> anyhow::Result<()> {
        let store = MemoryAttemptStore::new();
        let now = Utc::now();
        let old = now - Duration::days(2);
        store.upsert(&record("old", old)).await?;
        store.upsert(&record("fresh", now)).await?;
        let mut blocked = record("blocked", old);
        blocked.blocked_until = Some(now + Duration::minutes(5));
        store.upsert(&blocked).await?;

        let removed = store.sweep(now - Duration::days(1), now).await?;

        assert_eq!(removed, 1);
        assert!(store.get(&ClientKey::from("old")).await?.is_none());
        assert!(store.get(&ClientKey::from("fresh")).await?.is_some());
        assert!(store.get(&ClientKey::from("blocked")).await?.is_some());
        Ok(())
    }
}
