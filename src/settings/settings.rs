use crate::application_impl::{BLOCK_DURATION, HCAPTCHA_VERIFY_URL};
use anyhow::{Result, anyhow, bail};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub captcha: Captcha,
    pub http: Http,
    pub log: Log,
    pub store: Store,
}

#[derive(Deserialize)]
pub struct Captcha {
    pub backend: String, // "fake" or "real"
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_verify_url")]
    pub verify_url: String,
    #[serde(default = "default_verify_timeout_secs")]
    pub timeout_secs: u64,
}

impl Captcha {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for Captcha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Captcha")
            .field("backend", &self.backend)
            .field("secret", &redact(&self.secret))
            .field("verify_url", &self.verify_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Deserialize)]
pub struct Store {
    pub backend: String, // "memory", "redis" or "mysql"
    #[serde(default)]
    pub dsn: String,
    #[serde(default = "default_store_prefix")]
    pub prefix: String,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Store {
    /// Records must outlive a whole block, or eviction would hand blocked or
    /// counting clients a fresh budget.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            bail!("store.sweep_interval_secs must be greater than zero");
        }
        let min_retention = BLOCK_DURATION.num_seconds().unsigned_abs();
        if self.retention_secs < min_retention {
            bail!(
                "store.retention_secs must be at least {} (got {})",
                min_retention,
                self.retention_secs
            );
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend)
            .field("dsn", &redact(&self.dsn))
            .field("prefix", &self.prefix)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("retention_secs", &self.retention_secs)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() { "<unset>" } else { "<redacted>" }
}

fn default_verify_url() -> String {
    HCAPTCHA_VERIFY_URL.to_string()
}

fn default_verify_timeout_secs() -> u64 {
    10
}

fn default_store_prefix() -> String {
    "rate_limits".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Environment overrides look like `GATEKEEPER__CAPTCHA__SECRET`.
pub const ENV_PREFIX: &str = "GATEKEEPER";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.store.validate()?;
    Ok(settings)
}
