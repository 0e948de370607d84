use crate::adapters::outbound::DEFAULT_USER_AGENT;
use crate::domain::entities::ResolutionRequest;
use crate::domain::services::ProviderCatalog;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Request defaults
    pub per_provider_timeout_ms: u64,
    pub overall_deadline_ms: Option<u64>,
    pub lang: Option<String>,

    // Provider catalog
    pub providers: Vec<String>,
    pub extra_providers: Vec<(String, String)>,

    // HTTP client
    pub user_agent: String,

    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            per_provider_timeout_ms: 5000,
            overall_deadline_ms: None,
            lang: None,
            providers: Vec::new(),
            extra_providers: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            debug: false,
        }
    }
}

impl Config {
    /// Default request for a self-lookup built from these settings.
    pub fn request(&self) -> ResolutionRequest {
        let mut request = ResolutionRequest::self_lookup()
            .per_provider_timeout(Duration::from_millis(self.per_provider_timeout_ms));
        if let Some(ms) = self.overall_deadline_ms {
            request = request.overall_deadline(Duration::from_millis(ms));
        }
        if let Some(lang) = &self.lang {
            request = request.lang(lang);
        }
        request
    }

    /// Built-in catalog, narrowed and reordered by `providers`, then extended
    /// with the configured custom providers.
    pub fn catalog(&self) -> ProviderCatalog {
        self.extra_providers.iter().fold(
            ProviderCatalog::builtin().select(&self.providers),
            |catalog, (name, template)| catalog.with_custom(name.as_str(), template.as_str()),
        )
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let per_provider_timeout_ms = std::env::var("IPLOCATOR_TIMEOUT_MS")
        .unwrap_or_else(|_| "5000".to_string())
        .parse()
        .unwrap_or(5000);

    let overall_deadline_ms = std::env::var("IPLOCATOR_OVERALL_DEADLINE_MS")
        .ok()
        .and_then(|v| v.parse().ok());

    let lang = std::env::var("IPLOCATOR_LANG")
        .ok()
        .filter(|v| !v.trim().is_empty());

    let providers = std::env::var("IPLOCATOR_PROVIDERS")
        .map(|v| split_list(&v))
        .unwrap_or_default();

    let extra_providers = std::env::var("IPLOCATOR_EXTRA_PROVIDERS")
        .map(|v| parse_extra_providers(&v))
        .unwrap_or_default();

    let user_agent = std::env::var("IPLOCATOR_USER_AGENT")
        .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

    let debug = std::env::var("DEBUG").is_ok();

    Ok(Config {
        per_provider_timeout_ms,
        overall_deadline_ms,
        lang,
        providers,
        extra_providers,
        user_agent,
        debug,
    })
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `name=template` pairs; entries without a name or template are skipped.
fn parse_extra_providers(v: &str) -> Vec<(String, String)> {
    split_list(v)
        .into_iter()
        .filter_map(|entry| match entry.split_once('=') {
            Some((name, template)) if !name.trim().is_empty() && !template.trim().is_empty() => {
                Some((name.trim().to_string(), template.trim().to_string()))
            }
            _ => {
                tracing::warn!("ignoring malformed custom provider entry {:?}", entry);
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::services::ProviderKind;
    use std::sync::Mutex;

    // Tests below mutate process-wide environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "IPLOCATOR_TIMEOUT_MS",
        "IPLOCATOR_OVERALL_DEADLINE_MS",
        "IPLOCATOR_LANG",
        "IPLOCATOR_PROVIDERS",
        "IPLOCATOR_EXTRA_PROVIDERS",
        "IPLOCATOR_USER_AGENT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.per_provider_timeout_ms, 5000);
        assert!(cfg.overall_deadline_ms.is_none());
        assert!(cfg.lang.is_none());
        assert!(cfg.providers.is_empty());
        assert!(cfg.user_agent.starts_with("ip-locator/"));
    }

    #[test]
    fn test_load_config_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let cfg = load_config().unwrap();
        assert_eq!(cfg.per_provider_timeout_ms, 5000);
        assert!(cfg.overall_deadline_ms.is_none());
        assert!(cfg.lang.is_none());
        assert!(cfg.providers.is_empty());
        assert!(cfg.extra_providers.is_empty());
        assert_eq!(cfg.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("IPLOCATOR_TIMEOUT_MS", "750");
        std::env::set_var("IPLOCATOR_OVERALL_DEADLINE_MS", "3000");
        std::env::set_var("IPLOCATOR_LANG", "pt_BR");
        std::env::set_var("IPLOCATOR_PROVIDERS", "ipinfo.io, geojs.io");
        std::env::set_var("IPLOCATOR_USER_AGENT", "probe/1.0");

        let cfg = load_config().unwrap();
        assert_eq!(cfg.per_provider_timeout_ms, 750);
        assert_eq!(cfg.overall_deadline_ms, Some(3000));
        assert_eq!(cfg.lang.as_deref(), Some("pt_BR"));
        assert_eq!(cfg.providers, vec!["ipinfo.io", "geojs.io"]);
        assert_eq!(cfg.user_agent, "probe/1.0");

        clear_env();
    }

    #[test]
    fn test_load_config_parse_error_uses_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("IPLOCATOR_TIMEOUT_MS", "soon");
        std::env::set_var("IPLOCATOR_OVERALL_DEADLINE_MS", "-1");

        let cfg = load_config().unwrap();
        assert_eq!(cfg.per_provider_timeout_ms, 5000);
        assert!(cfg.overall_deadline_ms.is_none());

        clear_env();
    }

    #[test]
    fn test_load_config_extra_providers() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var(
            "IPLOCATOR_EXTRA_PROVIDERS",
            "mine=https://geo.example.com/{ip}?lang={lang}, broken, =nameless",
        );

        let cfg = load_config().unwrap();
        assert_eq!(
            cfg.extra_providers,
            vec![(
                "mine".to_string(),
                "https://geo.example.com/{ip}?lang={lang}".to_string()
            )]
        );

        clear_env();
    }

    #[test]
    fn test_request_from_config() {
        let cfg = Config {
            per_provider_timeout_ms: 1200,
            overall_deadline_ms: Some(4000),
            lang: Some("de".to_string()),
            ..Config::default()
        };

        let request = cfg.request();
        assert!(request.is_self_lookup());
        assert_eq!(request.per_provider_timeout, Duration::from_millis(1200));
        assert_eq!(request.overall_deadline, Some(Duration::from_secs(4)));
        assert_eq!(request.lang.as_ref().map(|l| l.as_str()), Some("de"));
    }

    #[test]
    fn test_catalog_default_is_builtin() {
        let catalog = Config::default().catalog();
        assert_eq!(catalog, ProviderCatalog::builtin());
    }

    #[test]
    fn test_catalog_selection_and_custom() {
        let cfg = Config {
            providers: vec!["geojs.io".to_string(), "ipwho.is".to_string()],
            extra_providers: vec![("mine".to_string(), "https://geo.example.com/{ip}".to_string())],
            ..Config::default()
        };

        let catalog = cfg.catalog();
        assert_eq!(catalog.names(), vec!["geojs.io", "ipwho.is", "mine"]);
        assert!(matches!(
            catalog.get("mine").unwrap().kind(),
            ProviderKind::Custom { .. }
        ));
    }

    #[test]
    fn test_catalog_with_misspelled_selection_falls_back_to_builtin() {
        let cfg = Config {
            providers: vec!["ipwhois".to_string()],
            ..Config::default()
        };

        let catalog = cfg.catalog();
        assert_eq!(catalog, ProviderCatalog::builtin());
        assert_eq!(catalog.len(), 6);
    }

    #[test]
    fn test_config_clone() {
        let cfg = Config::default();
        let cloned = cfg.clone();
        assert_eq!(cfg.user_agent, cloned.user_agent);
        assert_eq!(cfg.per_provider_timeout_ms, cloned.per_provider_timeout_ms);
    }
}
