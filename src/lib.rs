//! ip-locator Library
//!
//! Resolves an IP address (or the caller's own public address) to a normalized
//! location record by walking a list of public geolocation providers until
//! one answers.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;

// Re-export commonly used types
pub use adapters::outbound::{ReqwestJsonFetcher, DEFAULT_USER_AGENT};
pub use application::{ResolutionCoordinator, ResolutionService};
pub use config::{load_config, Config};
pub use domain::entities::{
    AttemptOutcome, LocationRecord, ProviderAttempt, RequestError, ResolutionReport,
    ResolutionRequest,
};
pub use domain::ports::{FetchError, GeoResolver, JsonFetcher};
pub use domain::services::{
    normalize, normalize_generic, NormalizeError, ProviderCatalog, ProviderDescriptor,
    ProviderKind,
};
pub use domain::value_objects::{FailureKind, Lang, Served};
