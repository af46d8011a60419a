use gatekeeper::logger::*;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!(filter = ?logger.current_filter(), "bootstrap info log");

    let config = LogConfig {
        filter: "gatekeeper=trace,debug".to_string(),
    };
    logger.reload_from_config(&config)?;
    trace!(target: "gatekeeper::demo", "application trace log");
    debug!("application debug log");
    info!(filter = ?logger.current_filter(), "application info log");

    let bad = LogConfig {
        filter: "gatekeeper=[".to_string(),
    };
    if let Err(e) = logger.reload_from_config(&bad) {
        warn!(%e, "invalid filter rejected, previous filter kept");
    }

    Ok(())
}
