use crate::application_impl::WINDOW;
use crate::domain_port::AttemptStore;
use crate::logger::*;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically drops attempt records nobody has touched for `retention`.
pub struct StoreSweeper {
    store: Arc<dyn AttemptStore>,
    interval: Duration,
    retention: Duration,
    cancel: CancellationToken,
}

impl StoreSweeper {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        interval: Duration,
        retention: Duration,
        cancel: CancellationToken,
    ) -> Self {
        // a zero period panics in `interval`; retention below the window would
        // forget attempts that still count
        let min_retention = WINDOW.to_std().unwrap_or(Duration::from_secs(60));
        Self {
            store,
            interval: interval.max(MIN_INTERVAL),
            retention: retention.max(min_retention),
            cancel,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("store sweeper cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    pub async fn sweep_once(&self) -> u64 {
        let now = Utc::now();
        let retention = match chrono::Duration::from_std(self.retention) {
            Ok(retention) => retention,
            Err(e) => {
                warn!(%e, "retention out of range, skipping sweep");
                return 0;
            }
        };

        match self.store.sweep(now - retention, now).await {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "swept stale attempt records");
                }
                removed
            }
            Err(e) => {
                error!(%e, "attempt store sweep failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::{AttemptRecord, ClientKey};
    use crate::infra_memory::MemoryAttemptStore;

    async fn seed(store: &MemoryAttemptStore, key: &str, age: chrono::Duration) {
        let record = AttemptRecord {
            client_key: ClientKey::from(key),
            attempts: 1,
            last_attempt_at: Utc::now() - age,
            blocked_until: None,
        };
        store.upsert(&record).await.unwrap();
    }

    #[tokio::test]
    async fn sweep_once_removes_only_stale_records() {
        let store = Arc::new(MemoryAttemptStore::new());
        seed(&store, "10.0.0.1", chrono::Duration::hours(2)).await;
        seed(&store, "10.0.0.2", chrono::Duration::seconds(5)).await;

        let sweeper = StoreSweeper::new(
            store.clone(),
            Duration::from_secs(60),
            Duration::from_secs(60 * 60),
            CancellationToken::new(),
        );

        assert_eq!(sweeper.sweep_once().await, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&ClientKey::from("10.0.0.2")).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancel() {
        let store = Arc::new(MemoryAttemptStore::new());
        let cancel = CancellationToken::new();
        let sweeper = StoreSweeper::new(
            store,
            Duration::from_secs(1),
            Duration::from_secs(60),
            cancel.clone(),
        );

        let handle = tokio::spawn(sweeper.run());
        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_does_not_kill_the_task() {
        let cancel = CancellationToken::new();
        let sweeper = StoreSweeper::new(
            Arc::new(MemoryAttemptStore::new()),
            Duration::ZERO,
            Duration::from_secs(60 * 60),
            cancel.clone(),
        );

        let handle = tokio::spawn(sweeper.run());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!handle.is_finished());
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn short_retention_keeps_records_inside_the_window() {
        use crate::application_impl::{AttemptRateLimiter, MAX_ATTEMPTS};

        let store = Arc::new(MemoryAttemptStore::new());
        let limiter = AttemptRateLimiter::new(store.clone());
        let key = ClientKey::from("1.2.3.4");
        let earlier = Utc::now() - chrono::Duration::seconds(40);
        for _ in 0..MAX_ATTEMPTS {
            assert!(limiter.check_at(&key, earlier).await.allowed);
        }

        let sweeper = StoreSweeper::new(
            store.clone(),
            Duration::from_secs(60),
            Duration::from_secs(30),
            CancellationToken::new(),
        );
        assert_eq!(sweeper.sweep_once().await, 0);

        let decision = limiter.check_at(&key, Utc::now()).await;
        assert!(!decision.allowed);
    }
}
