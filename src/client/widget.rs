use crate::client::ScriptLoader;
use crate::logger::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Message handed to the listener when the host cannot render a widget.
pub const RENDER_FAILED_MESSAGE: &str = "Failed to load captcha";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetTheme {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetSize {
    Normal,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetOptions {
    pub site_key: String,
    pub theme: WidgetTheme,
    pub size: WidgetSize,
}

impl WidgetOptions {
    pub fn new(site_key: impl Into<String>) -> Self {
        Self {
            site_key: site_key.into(),
            theme: WidgetTheme::Light,
            size: WidgetSize::Normal,
        }
    }
}

/// Id the host assigned to a rendered widget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WidgetHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WidgetLoadError {
    #[error("widget script could not be injected: {0}")]
    ScriptInjection(String),
    #[error("widget script not ready after {0:?}")]
    NotReady(Duration),
    #[error("widget could not be rendered: {0}")]
    Render(String),
}

/// Callbacks a rendered widget fires. Called from whatever context the host runs in.
pub trait WidgetListener: Send + Sync {
    fn on_verify(&self, token: String);
    fn on_error(&self, message: String);
    fn on_expire(&self);
}

/// The page-global challenge library. Everything the adapter needs from the outside
/// world goes through here.
#[async_trait::async_trait]
pub trait WidgetHost: Send + Sync {
    fn script_present(&self, src: &str) -> bool;

    async fn inject_script(&self, src: &str) -> Result<(), WidgetLoadError>;

    fn global_ready(&self) -> bool;

    async fn render(
        &self,
        container: &str,
        options: &WidgetOptions,
        listener: Arc<dyn WidgetListener>,
    ) -> Result<WidgetHandle, WidgetLoadError>;

    fn reset(&self, handle: &WidgetHandle);

    fn remove(&self, handle: &WidgetHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Unloaded,
    Loading,
    Loaded,
    Rendering,
    Rendered,
    LoadError,
}

struct AdapterInner {
    state: AdapterState,
    handle: Option<WidgetHandle>,
    container: Option<String>,
    listener: Option<Arc<dyn WidgetListener>>,
}

pub struct WidgetAdapter {
    host: Arc<dyn WidgetHost>,
    loader: Arc<ScriptLoader>,
    options: WidgetOptions,
    inner: Mutex<AdapterInner>,
    // held across remove + render so overlapping remounts cannot orphan a widget
    render_lock: tokio::sync::Mutex<()>,
}

impl WidgetAdapter {
    pub fn new(host: Arc<dyn WidgetHost>, loader: Arc<ScriptLoader>, options: WidgetOptions) -> Self {
        Self {
            host,
            loader,
            options,
            inner: Mutex::new(AdapterInner {
                state: AdapterState::Unloaded,
                handle: None,
                container: None,
                listener: None,
            }),
            render_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> AdapterState {
        self.with_inner(|inner| inner.state)
    }

    pub fn handle(&self) -> Option<WidgetHandle> {
        self.with_inner(|inner| inner.handle.clone())
    }

    /// Loads the script if needed and renders into `container`. A load failure is
    /// terminal for this adapter; a render failure is also reported to the listener.
    pub async fn mount(
        &self,
        container: &str,
        listener: Arc<dyn WidgetListener>,
    ) -> Result<(), WidgetLoadError> {
        let guarded: Arc<dyn WidgetListener> = Arc::new(TokenGuard { inner: listener });
        let _serial = self.render_lock.lock().await;
        self.with_inner(|inner| {
            inner.container = Some(container.to_string());
            inner.listener = Some(guarded);
        });
        self.load_and_render().await
    }

    /// Clears the current challenge in place.
    pub fn reset(&self) {
        if let Some(handle) = self.handle() {
            debug!(widget = %handle.0, "resetting widget");
            self.host.reset(&handle);
        }
    }

    /// Removes the widget and renders a fresh instance into the same container.
    pub async fn remount(&self) -> Result<(), WidgetLoadError> {
        let _serial = self.render_lock.lock().await;
        self.remove_widget();
        self.load_and_render().await
    }

    pub fn unmount(&self) {
        self.remove_widget();
        self.with_inner(|inner| {
            inner.listener = None;
            inner.container = None;
        });
    }

    async fn load_and_render(&self) -> Result<(), WidgetLoadError> {
        if self.state() == AdapterState::LoadError {
            return Err(WidgetLoadError::ScriptInjection(
                "widget script failed to load earlier".to_string(),
            ));
        }

        self.set_state(AdapterState::Loading);
        if let Err(e) = self.loader.ensure_loaded().await {
            warn!(%e, "widget script failed to load");
            self.set_state(AdapterState::LoadError);
            return Err(e);
        }
        self.set_state(AdapterState::Loaded);

        let (container, listener) = match self.with_inner(|inner| {
            inner.container.clone().zip(inner.listener.clone())
        }) {
            Some(target) => target,
            // unmounted while loading
            None => return Ok(()),
        };

        self.set_state(AdapterState::Rendering);
        match self
            .host
            .render(&container, &self.options, listener.clone())
            .await
        {
            Ok(handle) => {
                debug!(widget = %handle.0, %container, "widget rendered");
                let stale = self.with_inner(|inner| {
                    if inner.listener.is_none() {
                        return Some(handle);
                    }
                    inner.state = AdapterState::Rendered;
                    inner.handle.replace(handle)
                });
                if let Some(stale) = stale {
                    self.host.remove(&stale);
                }
                Ok(())
            }
            Err(e) => {
                warn!(%e, "widget render failed");
                self.set_state(AdapterState::Loaded);
                listener.on_error(RENDER_FAILED_MESSAGE.to_string());
                Err(e)
            }
        }
    }

    fn remove_widget(&self) {
        let handle = self.with_inner(|inner| {
            if inner.state == AdapterState::Rendered {
                inner.state = AdapterState::Loaded;
            }
            inner.handle.take()
        });
        if let Some(handle) = handle {
            debug!(widget = %handle.0, "removing widget");
            self.host.remove(&handle);
        }
    }

    fn set_state(&self, state: AdapterState) {
        self.with_inner(|inner| {
            if inner.state != state {
                trace!(from = ?inner.state, to = ?state, "widget adapter state");
                inner.state = state;
            }
        });
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut AdapterInner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut inner)
    }
}

impl Drop for WidgetAdapter {
    fn drop(&mut self) {
        self.remove_widget();
    }
}

/// Only well-formed tokens reach the verify callback.
struct TokenGuard {
    inner: Arc<dyn WidgetListener>,
}

impl WidgetListener for TokenGuard {
    fn on_verify(&self, token: String) {
        if token.trim().is_empty() {
            self.inner.on_error("Invalid captcha token".to_string());
        } else {
            self.inner.on_verify(token);
        }
    }

    fn on_error(&self, message: String) {
        self.inner.on_error(message);
    }

    fn on_expire(&self) {
        self.inner.on_expire();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    /// In-process widget host that records calls and lets tests fire callbacks.
    #[derive(Default)]
    pub struct FakeHost {
        pub present: AtomicBool,
        pub ready: AtomicBool,
        pub fail_inject: AtomicBool,
        pub fail_render: AtomicBool,
        pub injections: AtomicUsize,
        pub renders: AtomicUsize,
        pub render_delay_ms: AtomicU64,
        pub resets: AtomicUsize,
        pub removed: Mutex<Vec<WidgetHandle>>,
        pub listener: Mutex<Option<Arc<dyn WidgetListener>>>,
    }

    impl FakeHost {
        pub fn ready() -> Arc<Self> {
            let host = Self::default();
            host.present.store(true, Ordering::SeqCst);
            host.ready.store(true, Ordering::SeqCst);
            Arc::new(host)
        }

        pub fn listener(&self) -> Arc<dyn WidgetListener> {
            self.listener
                .lock()
                .unwrap()
                .clone()
                .expect("nothing rendered")
        }
    }

    #[async_trait::async_trait]
    impl WidgetHost for FakeHost {
        fn script_present(&self, _src: &str) -> bool {
            self.present.load(Ordering::SeqCst)
        }

        async fn inject_script(&self, _src: &str) -> Result<(), WidgetLoadError> {
            self.injections.fetch_add(1, Ordering::SeqCst);
            if self.fail_inject.load(Ordering::SeqCst) {
                return Err(WidgetLoadError::ScriptInjection("blocked".to_string()));
            }
            self.present.store(true, Ordering::SeqCst);
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn global_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn render(
            &self,
            _container: &str,
            _options: &WidgetOptions,
            listener: Arc<dyn WidgetListener>,
        ) -> Result<WidgetHandle, WidgetLoadError> {
            let n = self.renders.fetch_add(1, Ordering::SeqCst);
            let delay = self.render_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.fail_render.load(Ordering::SeqCst) {
                return Err(WidgetLoadError::Render("container missing".to_string()));
            }
            *self.listener.lock().unwrap() = Some(listener);
            Ok(WidgetHandle(format!("widget-{n}")))
        }

        fn reset(&self, _handle: &WidgetHandle) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }

        fn remove(&self, handle: &WidgetHandle) {
            self.removed.lock().unwrap().push(handle.clone());
        }
    }

    #[derive(Default)]
    pub struct RecordingListener {
        pub events: Mutex<Vec<String>>,
    }

    impl WidgetListener for RecordingListener {
        fn on_verify(&self, token: String) {
            self.events.lock().unwrap().push(format!("verify:{token}"));
        }

        fn on_error(&self, message: String) {
            self.events.lock().unwrap().push(format!("error:{message}"));
        }

        fn on_expire(&self) {
            self.events.lock().unwrap().push("expire".to_string());
        }
    }
}
