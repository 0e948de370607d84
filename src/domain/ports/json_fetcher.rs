//! JSON Fetcher Port
//!
//! Defines the interface for issuing one bounded HTTP GET against a
//! provider endpoint and returning its parsed JSON body.

use crate::domain::value_objects::FailureKind;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Transport-level failure of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),
}

impl FetchError {
    /// Map onto the resolution failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Network(_) | Self::Status(_) => FailureKind::Transport,
            Self::InvalidJson(_) => FailureKind::Schema,
        }
    }
}

/// Bounded requester for provider endpoints.
///
/// This is an outbound port. Implementations must cancel the underlying
/// request when `timeout` elapses, must not retry, and must report every
/// failure as a `FetchError` instead of panicking.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    /// GET `url` and parse the body as JSON.
    async fn fetch_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchError>;
}
