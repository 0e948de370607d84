//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the location resolution
//! domain. They have no I/O dependencies.

use crate::domain::value_objects::{FailureKind, Lang, Served};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Default time budget for a single provider attempt.
pub const DEFAULT_PER_PROVIDER_TIMEOUT: Duration = Duration::from_millis(5000);

/// Canonical location record produced by exactly one provider.
///
/// Every field is optional: a provider may simply not report it, and `None`
/// means "unknown", never "empty".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    /// Provider that produced this record
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// ISO 3166-1 alpha-2 country code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// Region short form or code as reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// IANA zone name (e.g. "Europe/Berlin")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    /// Autonomous system number without the "AS" prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    /// Provider-specific fields a normalizer chose to forward
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl LocationRecord {
    /// Create an empty record attributed to a provider.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Whether the record carries both coordinates.
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Errors building a resolution request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid target IP address: {0}")]
    InvalidTargetIp(String),
}

/// Caller-supplied input for one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionRequest {
    /// IP to locate; `None` resolves the caller's own address
    pub target_ip: Option<IpAddr>,
    /// Best-effort locale hint
    pub lang: Option<Lang>,
    /// Time budget for each provider attempt
    pub per_provider_timeout: Duration,
    /// Optional budget for the whole sweep (default: unbounded)
    pub overall_deadline: Option<Duration>,
}

impl Default for ResolutionRequest {
    fn default() -> Self {
        Self {
            target_ip: None,
            lang: None,
            per_provider_timeout: DEFAULT_PER_PROVIDER_TIMEOUT,
            overall_deadline: None,
        }
    }
}

impl ResolutionRequest {
    /// Request for the caller's own location.
    pub fn self_lookup() -> Self {
        Self::default()
    }

    /// Request for an explicit IP address.
    pub fn for_target(ip: IpAddr) -> Self {
        Self {
            target_ip: Some(ip),
            ..Default::default()
        }
    }

    /// Parse a textual IP address into a target request.
    pub fn for_target_str(ip: &str) -> Result<Self, RequestError> {
        let ip = ip
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| RequestError::InvalidTargetIp(ip.to_string()))?;
        Ok(Self::for_target(ip))
    }

    /// Set the locale hint. Unparsable hints are dropped.
    pub fn lang(mut self, lang: &str) -> Self {
        self.lang = Lang::parse(lang);
        self
    }

    /// Set the per-provider timeout.
    pub fn per_provider_timeout(mut self, timeout: Duration) -> Self {
        self.per_provider_timeout = timeout;
        self
    }

    /// Bound the whole provider sweep.
    pub fn overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = Some(deadline);
        self
    }

    /// Whether this request resolves the caller's own address.
    pub fn is_self_lookup(&self) -> bool {
        self.target_ip.is_none()
    }
}

/// Result of one provider attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failed { kind: FailureKind, reason: String },
}

/// Diagnostic entry for one provider consulted during a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAttempt {
    /// Provider name
    pub provider: String,
    pub outcome: AttemptOutcome,
    /// Wall-clock time spent on this provider
    pub elapsed: Duration,
}

impl ProviderAttempt {
    pub fn success(provider: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            provider: provider.into(),
            outcome: AttemptOutcome::Success,
            elapsed,
        }
    }

    pub fn failed(
        provider: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            provider: provider.into(),
            outcome: AttemptOutcome::Failed {
                kind,
                reason: reason.into(),
            },
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success)
    }

    /// Failure classification, if the attempt failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            AttemptOutcome::Success => None,
            AttemptOutcome::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Outcome of a resolution with its per-provider diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionReport {
    /// Resolved record, `None` when every provider failed
    pub record: Option<Arc<LocationRecord>>,
    /// Attempts in the order they were made (empty for cache hits)
    pub attempts: Vec<ProviderAttempt>,
    pub served_from: Served,
}

impl ResolutionReport {
    pub fn from_cache(record: Arc<LocationRecord>) -> Self {
        Self {
            record: Some(record),
            attempts: Vec::new(),
            served_from: Served::Cache,
        }
    }

    /// Failed attempts only.
    pub fn failures(&self) -> impl Iterator<Item = &ProviderAttempt> {
        self.attempts.iter().filter(|a| !a.is_success())
    }
}
