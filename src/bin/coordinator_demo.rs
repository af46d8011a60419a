//! Drives a verification gate against a running server with tokens typed on stdin.
//!
//! $ cargo run --bin gatekeeper
//! $ cargo run --bin coordinator_demo -- --action create_project
//!
//! With the fake captcha backend, `pass` verifies and anything else is rejected.
//! `expire`, `error <message>`, `reset` and `quit` drive the other callbacks.

use clap::Parser;
use gatekeeper::client::*;
use gatekeeper::domain_model::ActionLabel;
use gatekeeper::logger::*;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8080/verify-captcha")]
    endpoint: String,
    #[arg(long, default_value = "default")]
    action: String,
    #[arg(long)]
    lookup_ip: bool,
}

/// Stands in for the page: the script is always there and rendering just remembers
/// the listener so stdin can fire callbacks at it.
#[derive(Default)]
struct ConsoleHost {
    listener: Mutex<Option<Arc<dyn WidgetListener>>>,
    rendered: Mutex<u32>,
}

impl ConsoleHost {
    fn listener(&self) -> Option<Arc<dyn WidgetListener>> {
        self.listener.lock().ok().and_then(|l| l.clone())
    }
}

#[async_trait::async_trait]
impl WidgetHost for ConsoleHost {
    fn script_present(&self, _src: &str) -> bool {
        true
    }

    async fn inject_script(&self, _src: &str) -> Result<(), WidgetLoadError> {
        Ok(())
    }

    fn global_ready(&self) -> bool {
        true
    }

    async fn render(
        &self,
        container: &str,
        options: &WidgetOptions,
        listener: Arc<dyn WidgetListener>,
    ) -> Result<WidgetHandle, WidgetLoadError> {
        let mut rendered = self
            .rendered
            .lock()
            .map_err(|e| WidgetLoadError::Render(e.to_string()))?;
        *rendered += 1;
        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(listener);
        }
        println!("[widget] rendered #{} into {} ({:?})", rendered, container, options.theme);
        Ok(WidgetHandle(format!("console-{}", rendered)))
    }

    fn reset(&self, handle: &WidgetHandle) {
        println!("[widget] reset {}", handle.0);
    }

    fn remove(&self, handle: &WidgetHandle) {
        println!("[widget] removed {}", handle.0);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _logger = Logger::new_bootstrap();

    let mut endpoint = HttpVerifyEndpoint::new(&args.endpoint)?;
    if args.lookup_ip {
        endpoint = endpoint.with_ip_lookup(IpLookup::new()?);
    }

    let host = Arc::new(ConsoleHost::default());
    let loader = Arc::new(ScriptLoader::new(host.clone()));
    let adapter = WidgetAdapter::new(host.clone(), loader, WidgetOptions::new("10000000-ffff-ffff-ffff-000000000001"));
    let coordinator = VerificationCoordinator::new(
        CoordinatorConfig::new(ActionLabel::parse(&args.action), "#captcha"),
        adapter,
        Arc::new(endpoint),
    );
    coordinator.mount().await?;

    let mut views = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            println!(
                "[gate] {:?} warning={} key={} error={:?}",
                view.state, view.rate_limit_warning, view.widget_key, view.error
            );
            if let Some(notice) = view.notice {
                println!("[toast] {}: {}", notice.title, notice.description);
            }
            if !view.mounted {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        let Some(listener) = host.listener() else {
            warn!("no widget rendered");
            continue;
        };
        match line.as_str() {
            "quit" => break,
            "expire" => listener.on_expire(),
            "reset" => coordinator.reset().await,
            other => match other.strip_prefix("error ") {
                Some(message) => listener.on_error(message.to_string()),
                None => listener.on_verify(other.to_string()),
            },
        }
    }

    if let Some(token) = coordinator.verified_token() {
        println!("verified token: {}", token);
    }
    coordinator.unmount();
    let _ = printer.await;

    Ok(())
}
