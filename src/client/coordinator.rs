use crate::client::{EndpointOutcome, VerifyEndpoint, WidgetAdapter, WidgetListener, WidgetLoadError};
use crate::domain_model::ActionLabel;
use crate::logger::*;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Pause between a failed verification and the automatic widget reset.
pub const RESET_DELAY: Duration = Duration::from_millis(1500);
/// Remaining-attempt count at or below which the rate-limit warning shows.
pub const WARNING_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    AwaitingChallenge,
    Submitting {
        token: String,
    },
    Verified {
        token: String,
    },
    Failed {
        reason: String,
        remaining_attempts: Option<u32>,
    },
    RateLimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Short user-facing message, shown once per state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    fn info(title: &str, description: &str) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    fn error(title: &str, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.to_string(),
            description: description.into(),
        }
    }
}

/// Everything a form needs to draw the verification gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorView {
    pub state: VerificationState,
    pub error: Option<String>,
    pub rate_limit_warning: bool,
    /// Bumped on every full reset; a new value means a fresh widget instance.
    pub widget_key: u64,
    pub notice: Option<Notice>,
    pub mounted: bool,
}

impl CoordinatorView {
    fn initial() -> Self {
        Self {
            state: VerificationState::AwaitingChallenge,
            error: None,
            rate_limit_warning: false,
            widget_key: 0,
            notice: None,
            mounted: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub action: ActionLabel,
    pub container: String,
    pub reset_delay: Duration,
}

impl CoordinatorConfig {
    pub fn new(action: ActionLabel, container: impl Into<String>) -> Self {
        Self {
            action,
            container: container.into(),
            reset_delay: RESET_DELAY,
        }
    }
}

struct Inner {
    view: CoordinatorView,
    // results computed under an older generation are dropped
    generation: u64,
    pending_reset: Option<JoinHandle<()>>,
    event_pump: Option<JoinHandle<()>>,
}

struct Shared {
    config: CoordinatorConfig,
    adapter: WidgetAdapter,
    endpoint: Arc<dyn VerifyEndpoint>,
    inner: Mutex<Inner>,
    view_tx: watch::Sender<CoordinatorView>,
}

/// Gate in front of one protected action. Cheap to clone; clones drive the same gate.
#[derive(Clone)]
pub struct VerificationCoordinator {
    shared: Arc<Shared>,
}

impl VerificationCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        adapter: WidgetAdapter,
        endpoint: Arc<dyn VerifyEndpoint>,
    ) -> Self {
        let (view_tx, _) = watch::channel(CoordinatorView::initial());
        Self {
            shared: Arc::new(Shared {
                config,
                adapter,
                endpoint,
                inner: Mutex::new(Inner {
                    view: CoordinatorView::initial(),
                    generation: 0,
                    pending_reset: None,
                    event_pump: None,
                }),
                view_tx,
            }),
        }
    }

    pub fn action(&self) -> &ActionLabel {
        &self.shared.config.action
    }

    /// Renders the widget. A script load failure is terminal and is published in the view.
    pub async fn mount(&self) -> Result<(), WidgetLoadError> {
        let (events, pending) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_events(Arc::downgrade(&self.shared), pending));
        if let Some(previous) = self.lock().event_pump.replace(pump) {
            previous.abort();
        }

        let listener: Arc<dyn WidgetListener> = Arc::new(CoordinatorListener { events });
        let result = self
            .shared
            .adapter
            .mount(&self.shared.config.container, listener)
            .await;
        if let Err(e) = &result {
            self.record_widget_failure(e);
        }
        result
    }

    pub fn view(&self) -> CoordinatorView {
        self.lock().view.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorView> {
        self.shared.view_tx.subscribe()
    }

    pub fn verified_token(&self) -> Option<String> {
        match &self.lock().view.state {
            VerificationState::Verified { token } => Some(token.clone()),
            _ => None,
        }
    }

    /// Resolves with the token once verified, or `None` if the gate is unmounted first.
    pub async fn wait_verified(&self) -> Option<String> {
        let mut rx = self.subscribe();
        loop {
            {
                let view = rx.borrow_and_update();
                if let VerificationState::Verified { token } = &view.state {
                    return Some(token.clone());
                }
                if !view.mounted {
                    return None;
                }
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    pub async fn on_verify(&self, token: String) {
        let generation = {
            let mut inner = self.lock();
            if !inner.view.mounted {
                return;
            }
            match &inner.view.state {
                VerificationState::Submitting { .. } => {
                    debug!(action = %self.action(), "already submitting, ignoring token");
                    return;
                }
                VerificationState::Verified { .. } => return,
                _ => {}
            }
            if let Some(pending) = inner.pending_reset.take() {
                pending.abort();
            }
            debug!(action = %self.action(), token_len = token.len(), "captcha token received");
            inner.view.state = VerificationState::Submitting {
                token: token.clone(),
            };
            inner.view.error = None;
            inner.view.notice = None;
            self.publish(&inner);
            inner.generation
        };

        if self.action().bypasses_endpoint() {
            // the authentication provider verifies this token itself
            debug!(action = %self.action(), "skipping pre-verification");
            self.apply_outcome(
                generation,
                token,
                EndpointOutcome::Verified {
                    remaining_attempts: None,
                },
            );
            return;
        }

        let outcome = self.shared.endpoint.verify(&token, self.action()).await;
        self.apply_outcome(generation, token, outcome);
    }

    pub async fn on_error(&self, message: String) {
        {
            let mut inner = self.lock();
            if !inner.view.mounted || matches!(inner.view.state, VerificationState::Verified { .. }) {
                return;
            }
            warn!(action = %self.action(), %message, "captcha widget error");
            inner.generation += 1;
            let reason = widget_error_message(&message);
            inner.view.state = VerificationState::Failed {
                reason: reason.clone(),
                remaining_attempts: None,
            };
            inner.view.error = Some(reason);
            inner.view.notice = Some(Notice::error("Captcha error", message));
            self.publish(&inner);
            self.schedule_reset(&mut inner);
        }
    }

    pub async fn on_expire(&self) {
        {
            let mut inner = self.lock();
            if !inner.view.mounted {
                return;
            }
            match &inner.view.state {
                VerificationState::Submitting { .. } | VerificationState::Verified { .. } => {
                    return;
                }
                _ => {}
            }
            debug!(action = %self.action(), "captcha expired");
            inner.view.notice = Some(Notice::error(
                "Verification expired",
                "Please complete the captcha again.",
            ));
        }
        self.reset().await;
    }

    /// Starts over with a fresh widget. Any in-flight verification result is discarded.
    /// Forms call this after the authentication provider rejects a bypassed token.
    pub async fn reset(&self) {
        let generation = {
            let mut inner = self.lock();
            if !inner.view.mounted {
                return;
            }
            if let Some(pending) = inner.pending_reset.take() {
                pending.abort();
            }
            self.begin_reset(&mut inner)
        };
        self.refresh_widget(generation).await;
    }

    /// Drops pending work and removes the widget. The coordinator is inert afterwards.
    pub fn unmount(&self) {
        {
            let mut inner = self.lock();
            if !inner.view.mounted {
                return;
            }
            inner.view.mounted = false;
            inner.generation += 1;
            if let Some(pending) = inner.pending_reset.take() {
                pending.abort();
            }
            if let Some(pump) = inner.event_pump.take() {
                pump.abort();
            }
            self.publish(&inner);
        }
        self.shared.adapter.unmount();
        debug!(action = %self.action(), "verification gate unmounted");
    }

    fn apply_outcome(&self, generation: u64, token: String, outcome: EndpointOutcome) {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.view.mounted {
            debug!(action = %self.action(), "discarding stale verification result");
            return;
        }

        match outcome {
            EndpointOutcome::Verified { .. } => {
                info!(action = %self.action(), "captcha verification successful");
                let description = if self.action().bypasses_endpoint() {
                    "You can now proceed with authentication."
                } else {
                    "You can now proceed with your request."
                };
                inner.view.state = VerificationState::Verified { token };
                inner.view.error = None;
                inner.view.rate_limit_warning = false;
                inner.view.notice = Some(Notice::info("Verification successful", description));
                self.publish(&inner);
            }
            EndpointOutcome::Rejected {
                message,
                remaining_attempts,
            } => {
                warn!(action = %self.action(), %message, ?remaining_attempts, "captcha verification failed");
                if remaining_attempts.is_some_and(|remaining| remaining <= WARNING_THRESHOLD) {
                    inner.view.rate_limit_warning = true;
                }
                inner.view.state = VerificationState::Failed {
                    reason: message.clone(),
                    remaining_attempts,
                };
                inner.view.error = Some(message);
                self.publish(&inner);
                self.schedule_reset(&mut inner);
            }
            EndpointOutcome::RateLimited { message } => {
                warn!(action = %self.action(), "captcha verification rate limited");
                inner.view.state = VerificationState::RateLimited;
                inner.view.error = Some(message);
                inner.view.rate_limit_warning = true;
                inner.view.notice = Some(Notice::error(
                    "Too many attempts",
                    "Please wait before trying again.",
                ));
                self.publish(&inner);
                self.schedule_reset(&mut inner);
            }
            EndpointOutcome::Unavailable { message } => {
                warn!(action = %self.action(), %message, "captcha verification unavailable");
                inner.view.state = VerificationState::Failed {
                    reason: message.clone(),
                    remaining_attempts: None,
                };
                inner.view.error = Some(message);
                self.publish(&inner);
                self.schedule_reset(&mut inner);
            }
        }
    }

    fn schedule_reset(&self, inner: &mut Inner) {
        if let Some(pending) = inner.pending_reset.take() {
            pending.abort();
        }
        let shared = Arc::downgrade(&self.shared);
        let delay = self.shared.config.reset_delay;
        let generation = inner.generation;
        inner.pending_reset = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                VerificationCoordinator { shared }
                    .delayed_reset(generation)
                    .await;
            }
        }));
    }

    async fn delayed_reset(&self, scheduled: u64) {
        let generation = {
            let mut inner = self.lock();
            if inner.generation != scheduled || !inner.view.mounted {
                return;
            }
            // this task is the pending reset; let it finish rather than abort itself
            inner.pending_reset = None;
            self.begin_reset(&mut inner)
        };
        self.refresh_widget(generation).await;
    }

    /// Returns the generation the reset belongs to.
    fn begin_reset(&self, inner: &mut Inner) -> u64 {
        debug!(action = %self.action(), "resetting verification gate");
        inner.generation += 1;
        inner.view.state = VerificationState::AwaitingChallenge;
        inner.view.error = None;
        inner.view.rate_limit_warning = false;
        inner.view.widget_key += 1;
        self.publish(inner);
        inner.generation
    }

    async fn refresh_widget(&self, generation: u64) {
        // a later reset owns the widget now
        if self.lock().generation != generation {
            return;
        }
        self.shared.adapter.reset();
        if let Err(e) = self.shared.adapter.remount().await {
            self.record_widget_failure(&e);
        }
    }

    fn record_widget_failure(&self, error: &WidgetLoadError) {
        // render failures already reached on_error through the listener
        if matches!(error, WidgetLoadError::Render(_)) {
            return;
        }
        let mut inner = self.lock();
        if !inner.view.mounted {
            return;
        }
        let reason = widget_error_message("load failed");
        inner.view.state = VerificationState::Failed {
            reason: reason.clone(),
            remaining_attempts: None,
        };
        inner.view.error = Some(reason);
        inner.view.notice = Some(Notice::error("Captcha error", error.to_string()));
        self.publish(&inner);
    }

    fn publish(&self, inner: &Inner) {
        self.shared.view_tx.send_replace(inner.view.clone());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn widget_error_message(message: &str) -> String {
    if message.contains("site key") || message.contains("sitekey") {
        "Configuration error: Invalid site key. Please contact support.".to_string()
    } else if message.contains("network") || message.contains("load") {
        "Network error: Please check your connection and try again.".to_string()
    } else {
        message.to_string()
    }
}

enum WidgetEvent {
    Verify(String),
    Error(String),
    Expire,
}

/// Queues widget callbacks for `pump_events`, which applies them one at a time in
/// the order the widget fired them.
struct CoordinatorListener {
    events: mpsc::UnboundedSender<WidgetEvent>,
}

impl CoordinatorListener {
    fn push(&self, event: WidgetEvent) {
        if self.events.send(event).is_err() {
            debug!("verification gate gone, dropping widget callback");
        }
    }
}

impl WidgetListener for CoordinatorListener {
    fn on_verify(&self, token: String) {
        self.push(WidgetEvent::Verify(token));
    }

    fn on_error(&self, message: String) {
        self.push(WidgetEvent::Error(message));
    }

    fn on_expire(&self) {
        self.push(WidgetEvent::Expire);
    }
}

/// Holds the gate weakly between events so a forgotten widget cannot keep it alive.
async fn pump_events(shared: Weak<Shared>, mut events: mpsc::UnboundedReceiver<WidgetEvent>) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let coordinator = VerificationCoordinator { shared };
        match event {
            WidgetEvent::Verify(token) => coordinator.on_verify(token).await,
            WidgetEvent::Error(message) => coordinator.on_error(message).await,
            WidgetEvent::Expire => coordinator.on_expire().await,
        }
    }
}
