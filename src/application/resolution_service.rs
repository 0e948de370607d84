//! Resolution Service
//!
//! Public facade over the coordinator. Self-lookups are answered from the
//! session cache when possible, and concurrent self-lookups share a single
//! provider sweep. Target lookups always go to the network.

use crate::application::coordinator::ResolutionCoordinator;
use crate::application::session_cache::SessionCache;
use crate::domain::entities::{LocationRecord, ResolutionReport, ResolutionRequest};
use crate::domain::ports::{GeoResolver, JsonFetcher};
use crate::domain::services::ProviderCatalog;
use crate::domain::value_objects::Served;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;

type SharedSweep = Shared<BoxFuture<'static, ResolutionReport>>;

struct InFlight {
    id: u64,
    sweep: SharedSweep,
}

#[derive(Default)]
struct SessionState {
    cache: SessionCache,
    in_flight: Option<InFlight>,
    next_id: u64,
}

impl SessionState {
    /// Clear the in-flight slot if it still belongs to run `id`.
    fn release(&mut self, id: u64) {
        if self.in_flight.as_ref().is_some_and(|f| f.id == id) {
            self.in_flight = None;
        }
    }
}

/// Entry point used by callers to resolve locations.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct ResolutionService {
    coordinator: Arc<ResolutionCoordinator>,
    // never held across an await
    state: Arc<Mutex<SessionState>>,
}

impl ResolutionService {
    pub fn new(coordinator: ResolutionCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Build a service straight from a catalog and a fetcher.
    pub fn from_parts(catalog: ProviderCatalog, fetcher: Arc<dyn JsonFetcher>) -> Self {
        Self::new(ResolutionCoordinator::new(catalog, fetcher))
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        self.coordinator.catalog()
    }

    /// Resolve a location. `None` means every provider failed.
    pub async fn resolve(&self, request: &ResolutionRequest) -> Option<Arc<LocationRecord>> {
        self.resolve_with_report(request).await.record
    }

    /// Resolve a location and keep the per-provider diagnostics.
    ///
    /// Self-lookups that join a sweep already in progress are reported as
    /// [`Served::Shared`] and carry that sweep's attempts. A self-lookup sweep
    /// is spawned on the current Tokio runtime.
    pub async fn resolve_with_report(&self, request: &ResolutionRequest) -> ResolutionReport {
        if !request.is_self_lookup() {
            return self.coordinator.run(request).await;
        }

        let (sweep, joined) = {
            let mut state = self.state.lock();
            if let Some(record) = state.cache.get() {
                tracing::debug!("self-lookup served from session cache ({})", record.source);
                return ResolutionReport::from_cache(record);
            }

            match state.in_flight.as_ref().map(|f| f.sweep.clone()) {
                Some(sweep) => {
                    tracing::debug!("joining self-lookup already in flight");
                    (sweep, true)
                }
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    let sweep = self.start_self_lookup(id, request.clone());
                    state.in_flight = Some(InFlight {
                        id,
                        sweep: sweep.clone(),
                    });
                    (sweep, false)
                }
            }
        };

        let mut report = sweep.await;
        if joined {
            report.served_from = Served::Shared;
        }
        report
    }

    /// Last successfully resolved self-lookup record, without any I/O.
    pub fn cached(&self) -> Option<Arc<LocationRecord>> {
        self.state.lock().cache.get()
    }

    /// The sweep runs as its own task so provider timeouts keep firing even
    /// when every caller has gone away. It publishes its record and releases
    /// the in-flight slot in one critical section, so no caller can observe a
    /// finished sweep as still pending.
    fn start_self_lookup(&self, id: u64, request: ResolutionRequest) -> SharedSweep {
        let coordinator = self.coordinator.clone();
        let task_state = self.state.clone();
        let state = self.state.clone();

        let task = tokio::spawn(async move {
            let report = coordinator.run(&request).await;

            let mut state = task_state.lock();
            if let Some(record) = &report.record {
                tracing::info!(
                    "cached self location from {} ({:?})",
                    record.source,
                    record.country_code
                );
                state.cache.set(record.clone());
            }
            state.release(id);
            drop(state);

            report
        });

        async move {
            match task.await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!("self-lookup task failed: {}", e);
                    state.lock().release(id);
                    ResolutionReport {
                        record: None,
                        attempts: Vec::new(),
                        served_from: Served::Network,
                    }
                }
            }
        }
        .boxed()
        .shared()
    }
}

#[async_trait]
impl GeoResolver for ResolutionService {
    async fn resolve(&self, request: &ResolutionRequest) -> Option<Arc<LocationRecord>> {
        ResolutionService::resolve(self, request).await
    }
}
