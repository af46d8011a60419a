use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::StoreSweeper;
use crate::settings::Settings;
use nanoid::nanoid;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub verification_service: Arc<dyn VerificationService>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let alphabet: [char; 16] = [
            '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
        ];
        let run_id = nanoid!(10, &alphabet);

        let mut pool = None;
        let store: Arc<dyn AttemptStore> = match settings.store.backend.as_str() {
            "memory" => Arc::new(MemoryAttemptStore::new()),
            "redis" => {
                let redis_client = redis::Client::open(settings.store.dsn.as_str())?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisAttemptStore::new(
                    redis_manager,
                    settings.store.prefix.clone(),
                    settings.store.retention(),
                ))
            }
            "mysql" => {
                let mysql_pool = Pool::<MySql>::connect(&settings.store.dsn).await?;
                pool = Some(mysql_pool.clone());
                Arc::new(MySqlAttemptStore::new(mysql_pool))
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };

        let verifier: Arc<dyn CaptchaVerifier> = match settings.captcha.backend.as_str() {
            "fake" => Arc::new(FakeCaptchaVerifier::new()),
            "real" => {
                if settings.captcha.secret.is_empty() {
                    warn!("captcha secret is not configured, every verification will fail");
                }
                Arc::new(HCaptchaVerifier::new(HCaptchaConfig {
                    verify_url: settings.captcha.verify_url.clone(),
                    secret: settings.captcha.secret.clone(),
                    timeout: settings.captcha.timeout(),
                })?)
            }
            other => return Err(anyhow::anyhow!("Unknown captcha backend: {}", other)),
        };

        let rate_limiter: Arc<dyn RateLimiter> = Arc::new(AttemptRateLimiter::new(store.clone()));
        let verification_service: Arc<dyn VerificationService> =
            Arc::new(RealVerificationService::new(rate_limiter, verifier));

        // region runtime infra
        let cancel = CancellationToken::new();

        let sweeper = StoreSweeper::new(
            store,
            settings.store.sweep_interval(),
            settings.store.retention(),
            cancel.clone(),
        );
        let sweeper_handle = tokio::spawn(sweeper.run());

        // endregion

        info!(
            %run_id,
            store = %settings.store.backend,
            captcha = %settings.captcha.backend,
            "server started"
        );

        Ok(Self {
            verification_service,
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
            pool,
        })
    }

    /// A server around an already-wired service, with no background tasks.
    pub fn with_services(verification_service: Arc<dyn VerificationService>) -> Self {
        Self {
            verification_service,
            sweeper_handle: Mutex::new(None),
            cancel: CancellationToken::new(),
            pool: None,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = match self.sweeper_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
