//! Application Layer - Use cases orchestrating the domain
//!
//! The coordinator runs the provider fallback sweep; the resolution service
//! layers the session cache and in-flight de-duplication on top of it.

pub mod coordinator;
pub mod resolution_service;
pub mod session_cache;

pub use coordinator::{AttemptObserver, ResolutionCoordinator};
pub use resolution_service::ResolutionService;
pub use session_cache::SessionCache;
