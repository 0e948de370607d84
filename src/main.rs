//! ip-locator - Geolocation lookup across public providers
//!
//! This is the composition root that wires together all the components.
//!
//! Usage: `ip-locator [TARGET_IP]`. Without a target the caller's own public
//! address is resolved.

use anyhow::Context;
use ip_locator::{
    load_config, ReqwestJsonFetcher, ResolutionCoordinator, ResolutionRequest, ResolutionService,
};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let mut request = cfg.request();
    if let Some(target) = std::env::args().nth(1) {
        let target = ResolutionRequest::for_target_str(&target)?;
        request.target_ip = target.target_ip;
    }

    // ===== COMPOSITION ROOT =====

    // 1. Outbound adapter
    let fetcher = Arc::new(ReqwestJsonFetcher::new(&cfg.user_agent)?);

    // 2. Provider catalog
    let catalog = cfg.catalog();
    tracing::debug!("provider order: {}", catalog.names().join(", "));

    // 3. Application service
    let coordinator = ResolutionCoordinator::new(catalog, fetcher).on_attempt(|attempt| {
        tracing::debug!(
            "attempt provider={} outcome={:?} elapsed={:?}",
            attempt.provider,
            attempt.outcome,
            attempt.elapsed
        );
    });
    let service = ResolutionService::new(coordinator);

    let report = service.resolve_with_report(&request).await;
    let record = report
        .record
        .context("no provider could resolve the location")?;

    println!("{}", serde_json::to_string_pretty(record.as_ref())?);
    Ok(())
}
