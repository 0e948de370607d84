//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};

/// Locales the supported providers accept for localized place names.
const PROVIDER_LOCALES: &[&str] = &["en", "de", "es", "pt-BR", "fr", "ja", "zh-CN", "ru"];

/// Best-effort locale hint passed along with a resolution request.
///
/// Parsing normalizes the common spellings (`pt_br`, `PT-br`, `pt-BR`) to the
/// BCP 47 shape `pt-BR`. Providers that ignore the hint still normalize correctly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lang(String);

impl Lang {
    /// Parse a locale hint.
    ///
    /// Returns `None` for empty input or input that does not start with an
    /// alphabetic primary subtag.
    ///
    /// # Examples
    /// ```
    /// use ip_locator::Lang;
    ///
    /// assert_eq!(Lang::parse("pt_br").unwrap().as_str(), "pt-BR");
    /// assert!(Lang::parse("").is_none());
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().replace('_', "-");
        let mut parts = s.split('-').filter(|p| !p.is_empty());

        let primary = parts.next()?;
        if !primary.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let primary = primary.to_ascii_lowercase();

        match parts.next() {
            Some(region) if region.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Some(Self(format!("{}-{}", primary, region.to_ascii_uppercase())))
            }
            _ => Some(Self(primary)),
        }
    }

    /// The normalized locale string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag (`pt` for `pt-BR`).
    pub fn primary(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    /// Map the hint to a locale the providers understand.
    ///
    /// Exact matches win, then the first supported locale sharing the primary
    /// subtag (`pt` -> `pt-BR`, `zh-TW` -> `zh-CN`). Anything else is `None`
    /// and the query parameter is omitted.
    pub fn for_provider_query(&self) -> Option<&'static str> {
        PROVIDER_LOCALES
            .iter()
            .find(|l| **l == self.0)
            .or_else(|| {
                PROVIDER_LOCALES
                    .iter()
                    .find(|l| l.split('-').next() == Some(self.primary()))
            })
            .copied()
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification of a failed provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, DNS failure, non-2xx status
    Transport,
    /// Provider did not answer within its window
    Timeout,
    /// Body was not JSON or lacked the fields the normalizer needs
    Schema,
    /// Provider reported its own failure inside a 200-OK body
    ProviderSignaled,
}

impl FailureKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Schema => "schema",
            Self::ProviderSignaled => "provider_signaled",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a resolution result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Served {
    /// Session cache hit, no network activity
    Cache,
    /// Attached to a self-lookup that was already in flight
    Shared,
    /// This call ran the provider sweep itself
    Network,
}
