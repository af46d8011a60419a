use crate::client::{WidgetHost, WidgetLoadError};
use crate::logger::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

pub const WIDGET_SCRIPT_URL: &str = "https://js.hcaptcha.com/1/api.js";
pub const DEFAULT_READY_WAIT: Duration = Duration::from_secs(10);
const READY_POLL: Duration = Duration::from_millis(50);

/// Loads the widget script at most once. Share one loader (behind an `Arc`) between every
/// adapter on a page; concurrent callers wait on the same load and see the same outcome.
pub struct ScriptLoader {
    host: Arc<dyn WidgetHost>,
    src: String,
    ready_wait: Duration,
    loaded: OnceCell<Result<(), WidgetLoadError>>,
}

impl ScriptLoader {
    pub fn new(host: Arc<dyn WidgetHost>) -> Self {
        Self::with_source(host, WIDGET_SCRIPT_URL, DEFAULT_READY_WAIT)
    }

    pub fn with_source(host: Arc<dyn WidgetHost>, src: impl Into<String>, ready_wait: Duration) -> Self {
        Self {
            host,
            src: src.into(),
            ready_wait,
            loaded: OnceCell::new(),
        }
    }

    pub async fn ensure_loaded(&self) -> Result<(), WidgetLoadError> {
        self.loaded.get_or_init(|| self.load()).await.clone()
    }

    async fn load(&self) -> Result<(), WidgetLoadError> {
        if self.host.global_ready() {
            debug!("widget global already available");
            return Ok(());
        }

        if self.host.script_present(&self.src) {
            debug!(src = %self.src, "widget script already on the page, waiting for it");
        } else {
            info!(src = %self.src, "injecting widget script");
            self.host.inject_script(&self.src).await?;
        }

        let wait_ready = async {
            while !self.host.global_ready() {
                tokio::time::sleep(READY_POLL).await;
            }
        };
        tokio::time::timeout(self.ready_wait, wait_ready)
            .await
            .map_err(|_| WidgetLoadError::NotReady(self.ready_wait))
    }
}
