use crate::application_port::{RateLimitDecision, RateLimiter};
use crate::domain_model::{AttemptRecord, ClientKey};
use crate::domain_port::AttemptStore;
use crate::logger::*;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const WINDOW: Duration = Duration::seconds(60);
pub const MAX_ATTEMPTS: u32 = 5;
pub const BLOCK_DURATION: Duration = Duration::minutes(15);

/// Rolling-window limiter with a temporary block once the window budget is spent.
/// Holds no state of its own; everything lives in the injected store.
pub struct AttemptRateLimiter {
    store: Arc<dyn AttemptStore>,
}

impl AttemptRateLimiter {
    pub fn new(store: Arc<dyn AttemptStore>) -> Self {
        Self { store }
    }

    pub async fn check_at(&self, key: &ClientKey, now: DateTime<Utc>) -> RateLimitDecision {
        let existing = match self.store.get(key).await {
            Ok(record) => record,
            Err(e) => {
                error!(client_key = %key, "rate limit store unavailable, allowing: {}", e);
                return RateLimitDecision::fail_open();
            }
        };

        if let Some(record) = &existing {
            if record.is_blocked_at(now) {
                // counter stays frozen while blocked
                return RateLimitDecision::denied();
            }
        }

        let current_attempts = existing
            .as_ref()
            .filter(|record| record.last_attempt_at > now - WINDOW)
            .map(|record| record.attempts)
            .unwrap_or(0);
        let attempts = current_attempts.saturating_add(1);

        if current_attempts >= MAX_ATTEMPTS {
            let record = AttemptRecord {
                client_key: key.clone(),
                attempts,
                last_attempt_at: now,
                blocked_until: Some(now + BLOCK_DURATION),
            };
            warn!(client_key = %key, attempts, "blocking client for {} minutes", BLOCK_DURATION.num_minutes());
            self.save(&record).await;
            return RateLimitDecision::denied();
        }

        let record = AttemptRecord {
            client_key: key.clone(),
            attempts,
            last_attempt_at: now,
            blocked_until: None,
        };
        self.save(&record).await;
        RateLimitDecision::allowed(MAX_ATTEMPTS - attempts)
    }

    async fn save(&self, record: &AttemptRecord) {
        if let Err(e) = self.store.upsert(record).await {
            error!(client_key = %record.client_key, "failed to record attempt: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl RateLimiter for AttemptRateLimiter {
    async fn check(&self, key: &ClientKey) -> RateLimitDecision {
        self.check_at(key, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_port::AttemptStoreError;
    use crate::infra_memory::MemoryAttemptStore;

    fn limiter() -> (AttemptRateLimiter, Arc<MemoryAttemptStore>) {
        let store = Arc::new(MemoryAttemptStore::new());
        (AttemptRateLimiter::new(store.clone()), store)
    }

    #[tokio::test]
    async fn counts_down_then_blocks() -> anyhow::Result<()> {
        let (limiter, store) = limiter();
        let key = ClientKey::from("1.2.3.4");
        let start = Utc::now();

        for (i, expected) in [4, 3, 2, 1, 0].into_iter().enumerate() {
            let now = start + Duration::seconds(i as i64);
            let decision = limiter.check_at(&key, now).await;
            assert_eq!(decision, RateLimitDecision::allowed(expected));
        }

        let blocking_call = start + Duration::seconds(5);
        assert_eq!(
            limiter.check_at(&key, blocking_call).await,
            RateLimitDecision::denied()
        );
        let record = store.get(&key).await?.expect("record exists");
        assert_eq!(record.attempts, 6);
        assert_eq!(record.blocked_until, Some(blocking_call + BLOCK_DURATION));
        Ok(())
    }

    #[tokio::test]
    async fn blocked_client_counter_freezes() -> anyhow::Result<()> {
        let (limiter, store) = limiter();
        let key = ClientKey::from("1.2.3.4");
        let start = Utc::now();
        for i in 0..6 {
            limiter.check_at(&key, start + Duration::seconds(i)).await;
        }
        let frozen = store.get(&key).await?;

        for minute in 1..15 {
            let decision = limiter
                .check_at(&key, start + Duration::minutes(minute))
                .await;
            assert!(!decision.allowed);
        }
        assert_eq!(store.get(&key).await?, frozen);
        Ok(())
    }

    #[tokio::test]
    async fn block_expiry_starts_a_fresh_window() {
        let (limiter, _store) = limiter();
        let key = ClientKey::from("1.2.3.4");
        let start = Utc::now();
        for i in 0..6 {
            limiter.check_at(&key, start + Duration::seconds(i)).await;
        }
        let blocking_call = start + Duration::seconds(5);

        let just_before = blocking_call + BLOCK_DURATION - Duration::seconds(1);
        assert!(!limiter.check_at(&key, just_before).await.allowed);

        let after = blocking_call + BLOCK_DURATION;
        assert_eq!(
            limiter.check_at(&key, after).await,
            RateLimitDecision::allowed(MAX_ATTEMPTS - 1)
        );
    }

    #[tokio::test]
    async fn attempts_outside_the_window_do_not_count() {
        let (limiter, _store) = limiter();
        let key = ClientKey::from("5.6.7.8");
        let start = Utc::now();
        for i in 0..4 {
            limiter.check_at(&key, start + Duration::seconds(i)).await;
        }

        let later = start + Duration::seconds(3) + WINDOW + Duration::seconds(1);
        assert_eq!(
            limiter.check_at(&key, later).await,
            RateLimitDecision::allowed(MAX_ATTEMPTS - 1)
        );
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let (limiter, _store) = limiter();
        let now = Utc::now();
        for _ in 0..6 {
            limiter.check_at(&ClientKey::from("9.9.9.9"), now).await;
        }
        assert_eq!(
            limiter.check_at(&ClientKey::from("8.8.8.8"), now).await,
            RateLimitDecision::allowed(MAX_ATTEMPTS - 1)
        );
    }

    struct UnreachableStore;

    #[async_trait::async_trait]
    impl AttemptStore for UnreachableStore {
        async fn get(&self, _key: &ClientKey) -> Result<Option<AttemptRecord>, AttemptStoreError> {
            Err(AttemptStoreError::Store("connection refused".to_string()))
        }

        async fn upsert(&self, _record: &AttemptRecord) -> Result<(), AttemptStoreError> {
            Err(AttemptStoreError::Store("connection refused".to_string()))
        }

        async fn sweep(
            &self,
            _stale_before: DateTime<Utc>,
            _now: DateTime<Utc>,
        ) -> Result<u64, AttemptStoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn fails_open_when_store_is_unreachable() {
        let limiter = AttemptRateLimiter::new(Arc::new(UnreachableStore));
        let decision = limiter.check(&ClientKey::from("1.2.3.4")).await;
        assert_eq!(decision, RateLimitDecision::fail_open());
    }
}
