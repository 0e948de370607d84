//! GeoIP Resolver Port
//!
//! Defines the interface consumers use to resolve a location.

use crate::domain::entities::{LocationRecord, ResolutionRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Resolver for IP address to geographic location.
///
/// This is the inbound-facing port: UI code and other collaborators depend on
/// it instead of on the concrete service, and can substitute a fixed location
/// in their own tests.
#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Resolve the caller's own location, or the request's target IP.
    ///
    /// Returns `None` when no provider could produce a record. This is an
    /// expected outcome, not an error.
    async fn resolve(&self, request: &ResolutionRequest) -> Option<Arc<LocationRecord>>;
}
