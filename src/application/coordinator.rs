//! Resolution Coordinator
//!
//! Walks the provider catalog in order, one provider at a time, until a
//! provider's payload normalizes into a record.

use crate::domain::entities::{ProviderAttempt, ResolutionReport, ResolutionRequest};
use crate::domain::ports::JsonFetcher;
use crate::domain::services::{normalizer, ProviderCatalog};
use crate::domain::value_objects::{FailureKind, Served};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Callback invoked after every provider attempt.
pub type AttemptObserver = Arc<dyn Fn(&ProviderAttempt) + Send + Sync>;

/// Sequential fallback across the provider catalog.
///
/// Providers are never queried concurrently: only the first success is kept,
/// so asking everyone at once would only multiply outbound traffic and
/// rate-limit exposure. Individual failures are recorded and skipped; only
/// exhaustion of the list yields an empty report.
pub struct ResolutionCoordinator {
    catalog: ProviderCatalog,
    fetcher: Arc<dyn JsonFetcher>,
    on_attempt: Option<AttemptObserver>,
}

impl ResolutionCoordinator {
    /// Create a new coordinator.
    pub fn new(catalog: ProviderCatalog, fetcher: Arc<dyn JsonFetcher>) -> Self {
        Self {
            catalog,
            fetcher,
            on_attempt: None,
        }
    }

    /// Set callback for per-provider attempt diagnostics.
    pub fn on_attempt<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProviderAttempt) + Send + Sync + 'static,
    {
        self.on_attempt = Some(Arc::new(callback));
        self
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Run one fallback sweep for a request.
    pub async fn run(&self, request: &ResolutionRequest) -> ResolutionReport {
        let lookup = match request.target_ip {
            Some(ip) => ip.to_string(),
            None => "self".to_string(),
        };
        self.sweep(request)
            .instrument(tracing::info_span!("resolve", lookup = %lookup))
            .await
    }

    async fn sweep(&self, request: &ResolutionRequest) -> ResolutionReport {
        let started = Instant::now();
        let mut attempts = Vec::new();

        for provider in self.catalog.for_request(request) {
            let timeout = match request.overall_deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_sub(started.elapsed());
                    if remaining.is_zero() {
                        tracing::debug!(
                            "overall deadline {:?} reached before {}",
                            deadline,
                            provider.name()
                        );
                        break;
                    }
                    remaining.min(request.per_provider_timeout)
                }
                None => request.per_provider_timeout,
            };

            let Some(url) = provider.build_url(request.target_ip, request.lang.as_ref()) else {
                continue;
            };

            let attempt_started = Instant::now();
            let outcome: Result<_, (FailureKind, String)> =
                match self.fetcher.fetch_json(&url, timeout).await {
                    Ok(raw) => normalizer::try_normalize(provider, &raw)
                        .map_err(|e| (e.kind(), e.to_string())),
                    Err(e) => Err((e.kind(), e.to_string())),
                };
            let elapsed = attempt_started.elapsed();

            match outcome {
                Ok(record) => {
                    tracing::debug!(
                        "{} resolved {:?}/{:?} in {:?}",
                        provider.name(),
                        record.city,
                        record.country_code,
                        elapsed
                    );
                    self.record_attempt(
                        &mut attempts,
                        ProviderAttempt::success(provider.name(), elapsed),
                    );
                    return ResolutionReport {
                        record: Some(Arc::new(record)),
                        attempts,
                        served_from: Served::Network,
                    };
                }
                Err((kind, reason)) => {
                    tracing::debug!("{} failed ({}): {}", provider.name(), kind, reason);
                    self.record_attempt(
                        &mut attempts,
                        ProviderAttempt::failed(provider.name(), kind, reason, elapsed),
                    );
                }
            }
        }

        tracing::warn!(
            "no provider could resolve the location ({} attempted in {:?})",
            attempts.len(),
            started.elapsed()
        );

        ResolutionReport {
            record: None,
            attempts,
            served_from: Served::Network,
        }
    }

    fn record_attempt(&self, attempts: &mut Vec<ProviderAttempt>, attempt: ProviderAttempt) {
        if let Some(callback) = &self.on_attempt {
            callback(&attempt);
        }
        attempts.push(attempt);
    }
}
