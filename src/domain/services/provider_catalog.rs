//! Provider Catalog
//!
//! Ordered, read-only list of the geolocation providers the coordinator
//! falls back through. Order is priority: earlier entries are asked first.

use crate::domain::entities::ResolutionRequest;
use crate::domain::value_objects::Lang;
use std::net::IpAddr;

/// Known provider schemas, plus ad-hoc providers configured at runtime.
///
/// The kind selects both the URL layout and the normalizer, so dispatch
/// happens once when the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    /// ipwho.is
    IpWhoIs,
    /// ip-api.com (free endpoint is plain HTTP only)
    IpApiCom,
    /// ipapi.co
    IpApiCo,
    /// ipinfo.io (anonymous tier)
    IpInfo,
    /// get.geojs.io
    GeoJs,
    /// db-ip.com free tier, self lookups only
    DbIp,
    /// URL template with `{ip}` / `{lang}` placeholders, parsed best-effort
    Custom { template: String },
}

impl ProviderKind {
    /// Every built-in kind in fallback order.
    pub const BUILTIN: [ProviderKind; 6] = [
        ProviderKind::IpWhoIs,
        ProviderKind::IpApiCom,
        ProviderKind::IpApiCo,
        ProviderKind::IpInfo,
        ProviderKind::GeoJs,
        ProviderKind::DbIp,
    ];

    /// Stable identifier for built-in kinds.
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::IpWhoIs => "ipwho.is",
            Self::IpApiCom => "ip-api.com",
            Self::IpApiCo => "ipapi.co",
            Self::IpInfo => "ipinfo.io",
            Self::GeoJs => "geojs.io",
            Self::DbIp => "db-ip.com",
            Self::Custom { .. } => "custom",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::IpWhoIs => "https://ipwho.is",
            Self::IpApiCom => "http://ip-api.com",
            Self::IpApiCo => "https://ipapi.co",
            Self::IpInfo => "https://ipinfo.io",
            Self::GeoJs => "https://get.geojs.io",
            Self::DbIp => "https://api.db-ip.com",
            Self::Custom { .. } => "",
        }
    }

    fn supports_target_query(&self) -> bool {
        match self {
            Self::DbIp => false,
            Self::Custom { template } => template.contains("{ip}"),
            _ => true,
        }
    }
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    name: String,
    kind: ProviderKind,
    base_url: String,
    supports_target_query: bool,
}

impl ProviderDescriptor {
    /// Descriptor for a built-in provider at its public endpoint.
    pub fn builtin(kind: ProviderKind) -> Self {
        Self {
            name: kind.default_name().to_string(),
            base_url: kind.default_base_url().to_string(),
            supports_target_query: kind.supports_target_query(),
            kind,
        }
    }

    /// Descriptor for an ad-hoc provider described by a URL template.
    ///
    /// The template may contain `{ip}` (empty for self lookups) and `{lang}`.
    /// Only templates containing `{ip}` can answer target-IP queries.
    pub fn custom(name: impl Into<String>, template: impl Into<String>) -> Self {
        let kind = ProviderKind::Custom {
            template: template.into(),
        };
        Self {
            name: name.into(),
            base_url: String::new(),
            supports_target_query: kind.supports_target_query(),
            kind,
        }
    }

    /// Point a built-in descriptor at another host (mirror, mock server).
    ///
    /// Custom descriptors carry their host in the template and are unchanged.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        if !matches!(self.kind, ProviderKind::Custom { .. }) {
            self.base_url = base_url.into().trim_end_matches('/').to_string();
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ProviderKind {
        &self.kind
    }

    pub fn supports_target_query(&self) -> bool {
        self.supports_target_query
    }

    /// Build the request URL for this provider.
    ///
    /// Returns `None` when a target IP is given but the provider can only
    /// look up the caller's own address.
    pub fn build_url(&self, target_ip: Option<IpAddr>, lang: Option<&Lang>) -> Option<String> {
        if target_ip.is_some() && !self.supports_target_query {
            return None;
        }

        let base = &self.base_url;
        let ip = target_ip.map(|ip| ip.to_string());
        let query_lang = lang.and_then(|l| l.for_provider_query());
        let lang_param = query_lang
            .map(|l| format!("?lang={}", l))
            .unwrap_or_default();

        let url = match &self.kind {
            ProviderKind::IpWhoIs => match ip {
                Some(ip) => format!("{}/{}{}", base, ip, lang_param),
                None => format!("{}/{}", base, lang_param),
            },
            ProviderKind::IpApiCom => match ip {
                Some(ip) => format!("{}/json/{}{}", base, ip, lang_param),
                None => format!("{}/json/{}", base, lang_param),
            },
            ProviderKind::IpApiCo => match ip {
                Some(ip) => format!("{}/{}/json/", base, ip),
                None => format!("{}/json/", base),
            },
            ProviderKind::IpInfo => match ip {
                Some(ip) => format!("{}/{}/json", base, ip),
                None => format!("{}/json", base),
            },
            ProviderKind::GeoJs => match ip {
                Some(ip) => format!("{}/v1/ip/geo/{}.json", base, ip),
                None => format!("{}/v1/ip/geo.json", base),
            },
            ProviderKind::DbIp => format!("{}/v2/free/self", base),
            ProviderKind::Custom { template } => {
                let lang: &str = match query_lang {
                    Some(l) => l,
                    None => lang.map(Lang::as_str).unwrap_or("en"),
                };
                template
                    .replace("{ip}", ip.as_deref().unwrap_or(""))
                    .replace("{lang}", lang)
            }
        };

        Some(url)
    }
}

/// Ordered, read-only sequence of provider descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCatalog {
    providers: Vec<ProviderDescriptor>,
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProviderCatalog {
    /// The built-in providers in fallback order.
    ///
    /// ipwho.is and ip-api.com come first: both answer with timezone and
    /// coordinates on the anonymous tier and localize names. ipinfo.io and
    /// geojs.io are stricter about anonymous rate limits, and db-ip.com
    /// cannot look up arbitrary IPs.
    pub fn builtin() -> Self {
        Self {
            providers: ProviderKind::BUILTIN
                .iter()
                .cloned()
                .map(ProviderDescriptor::builtin)
                .collect(),
        }
    }

    /// Catalog with an explicit provider order.
    pub fn new(providers: Vec<ProviderDescriptor>) -> Self {
        Self { providers }
    }

    /// Restrict and reorder the catalog to the given provider names.
    ///
    /// Names are matched case-insensitively; unknown names are skipped. An
    /// empty list, or one where no name matches, keeps the catalog as it is.
    pub fn select<S: AsRef<str>>(self, names: &[S]) -> Self {
        if names.is_empty() {
            return self;
        }

        let mut selected: Vec<ProviderDescriptor> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            match self
                .providers
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
            {
                Some(p) if !selected.iter().any(|s| s.name == p.name) => selected.push(p.clone()),
                Some(_) => {}
                None => tracing::warn!("unknown provider '{}' in selection, skipping", name),
            }
        }

        if selected.is_empty() {
            tracing::warn!("no known provider in selection, keeping the full catalog");
            return self;
        }

        Self {
            providers: selected,
        }
    }

    /// Append an ad-hoc provider (lowest priority).
    pub fn with_custom(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.providers.push(ProviderDescriptor::custom(name, template));
        self
    }

    /// Point every built-in provider at one host, keeping each provider's path.
    pub fn with_base_url(self, base_url: &str) -> Self {
        Self {
            providers: self
                .providers
                .into_iter()
                .map(|p| p.with_base_url(base_url))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Provider names in order.
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    /// Providers eligible for a request, in order.
    ///
    /// Target-IP requests only see providers that can answer for an
    /// arbitrary address.
    pub fn for_request(&self, request: &ResolutionRequest) -> Vec<&ProviderDescriptor> {
        self.providers
            .iter()
            .filter(|p| request.is_self_lookup() || p.supports_target_query)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip() -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)))
    }

    // ===== Catalog Order Tests =====

    #[test]
    fn test_builtin_order_is_stable() {
        let catalog = ProviderCatalog::builtin();
        assert_eq!(
            catalog.names(),
            vec!["ipwho.is", "ip-api.com", "ipapi.co", "ipinfo.io", "geojs.io", "db-ip.com"]
        );
        assert_eq!(catalog.len(), 6);
        assert!(!catalog.is_empty());
    }

    #[test]
    fn test_default_is_builtin() {
        assert_eq!(ProviderCatalog::default(), ProviderCatalog::builtin());
    }

    #[test]
    fn test_for_request_self_lookup_includes_all() {
        let catalog = ProviderCatalog::builtin();
        let eligible = catalog.for_request(&ResolutionRequest::self_lookup());
        assert_eq!(eligible.len(), catalog.len());
    }

    #[test]
    fn test_for_request_target_excludes_self_only() {
        let catalog = ProviderCatalog::builtin();
        let req = ResolutionRequest::for_target("8.8.8.8".parse().unwrap());
        let names: Vec<_> = catalog.for_request(&req).iter().map(|p| p.name()).collect();
        assert!(!names.contains(&"db-ip.com"));
        assert_eq!(names.len(), 5);
        assert_eq!(names[0], "ipwho.is");
    }

    #[test]
    fn test_select_reorders_and_filters() {
        let catalog = ProviderCatalog::builtin().select(&["IPINFO.IO", "ipwho.is", "nope", "ipwho.is"]);
        assert_eq!(catalog.names(), vec!["ipinfo.io", "ipwho.is"]);
    }

    #[test]
    fn test_select_empty_keeps_catalog() {
        let empty: Vec<String> = Vec::new();
        let catalog = ProviderCatalog::builtin().select(&empty);
        assert_eq!(catalog, ProviderCatalog::builtin());
    }

    #[test]
    fn test_select_without_known_names_keeps_catalog() {
        let catalog = ProviderCatalog::builtin().select(&["ipwhois", "ip-api"]);
        assert_eq!(catalog, ProviderCatalog::builtin());
    }

    #[test]
    fn test_get_by_name() {
        let catalog = ProviderCatalog::builtin();
        assert_eq!(catalog.get("ipapi.co").unwrap().kind(), &ProviderKind::IpApiCo);
        assert!(catalog.get("unknown").is_none());
    }

    // ===== URL Building Tests =====

    #[test]
    fn test_build_url_self_lookup() {
        let tests = vec![
            (ProviderKind::IpWhoIs, "https://ipwho.is/"),
            (ProviderKind::IpApiCom, "http://ip-api.com/json/"),
            (ProviderKind::IpApiCo, "https://ipapi.co/json/"),
            (ProviderKind::IpInfo, "https://ipinfo.io/json"),
            (ProviderKind::GeoJs, "https://get.geojs.io/v1/ip/geo.json"),
            (ProviderKind::DbIp, "https://api.db-ip.com/v2/free/self"),
        ];

        for (kind, expected) in tests {
            let url = ProviderDescriptor::builtin(kind.clone()).build_url(None, None);
            assert_eq!(url.as_deref(), Some(expected), "kind: {:?}", kind);
        }
    }

    #[test]
    fn test_build_url_target() {
        let tests = vec![
            (ProviderKind::IpWhoIs, "https://ipwho.is/8.8.8.8"),
            (ProviderKind::IpApiCom, "http://ip-api.com/json/8.8.8.8"),
            (ProviderKind::IpApiCo, "https://ipapi.co/8.8.8.8/json/"),
            (ProviderKind::IpInfo, "https://ipinfo.io/8.8.8.8/json"),
            (ProviderKind::GeoJs, "https://get.geojs.io/v1/ip/geo/8.8.8.8.json"),
        ];

        for (kind, expected) in tests {
            let url = ProviderDescriptor::builtin(kind.clone()).build_url(ip(), None);
            assert_eq!(url.as_deref(), Some(expected), "kind: {:?}", kind);
        }
    }

    #[test]
    fn test_build_url_self_only_rejects_target() {
        let db_ip = ProviderDescriptor::builtin(ProviderKind::DbIp);
        assert!(!db_ip.supports_target_query());
        assert!(db_ip.build_url(ip(), None).is_none());
    }

    #[test]
    fn test_build_url_with_lang() {
        let lang = Lang::parse("pt").unwrap();
        let whois = ProviderDescriptor::builtin(ProviderKind::IpWhoIs);
        assert_eq!(
            whois.build_url(ip(), Some(&lang)).as_deref(),
            Some("https://ipwho.is/8.8.8.8?lang=pt-BR")
        );

        let ip_api = ProviderDescriptor::builtin(ProviderKind::IpApiCom);
        assert_eq!(
            ip_api.build_url(None, Some(&lang)).as_deref(),
            Some("http://ip-api.com/json/?lang=pt-BR")
        );

        // ipapi.co ignores the hint
        let ipapi = ProviderDescriptor::builtin(ProviderKind::IpApiCo);
        assert_eq!(
            ipapi.build_url(None, Some(&lang)).as_deref(),
            Some("https://ipapi.co/json/")
        );
    }

    #[test]
    fn test_build_url_unsupported_lang_omitted() {
        let lang = Lang::parse("nl").unwrap();
        let whois = ProviderDescriptor::builtin(ProviderKind::IpWhoIs);
        assert_eq!(whois.build_url(None, Some(&lang)).as_deref(), Some("https://ipwho.is/"));
    }

    #[test]
    fn test_build_url_ipv6_target() {
        let v6: IpAddr = "2001:4860:4860::8888".parse().unwrap();
        let ipinfo = ProviderDescriptor::builtin(ProviderKind::IpInfo);
        assert_eq!(
            ipinfo.build_url(Some(v6), None).as_deref(),
            Some("https://ipinfo.io/2001:4860:4860::8888/json")
        );
    }

    // ===== Base URL / Custom Tests =====

    #[test]
    fn test_with_base_url_keeps_paths() {
        let catalog = ProviderCatalog::builtin().with_base_url("http://127.0.0.1:9999/");
        let urls: Vec<_> = catalog
            .iter()
            .map(|p| p.build_url(None, None).unwrap())
            .collect();

        assert_eq!(urls[0], "http://127.0.0.1:9999/");
        assert_eq!(urls[1], "http://127.0.0.1:9999/json/");
        assert_eq!(urls[5], "http://127.0.0.1:9999/v2/free/self");
    }

    #[test]
    fn test_custom_template_target_support() {
        let with_ip = ProviderDescriptor::custom("mine", "https://geo.example/{ip}?hl={lang}");
        assert!(with_ip.supports_target_query());
        assert_eq!(
            with_ip.build_url(ip(), Some(&Lang::parse("de-AT").unwrap())).as_deref(),
            Some("https://geo.example/8.8.8.8?hl=de")
        );
        assert_eq!(
            with_ip.build_url(None, None).as_deref(),
            Some("https://geo.example/?hl=en")
        );

        let self_only = ProviderDescriptor::custom("self", "https://geo.example/me");
        assert!(!self_only.supports_target_query());
        assert!(self_only.build_url(ip(), None).is_none());
    }

    #[test]
    fn test_custom_ignores_base_url_override() {
        let custom = ProviderDescriptor::custom("mine", "https://geo.example/{ip}")
            .with_base_url("http://localhost:1");
        assert_eq!(custom.build_url(None, None).as_deref(), Some("https://geo.example/"));
    }

    #[test]
    fn test_with_custom_appends_last() {
        let catalog = ProviderCatalog::builtin().with_custom("mine", "https://geo.example/{ip}");
        assert_eq!(catalog.names().last(), Some(&"mine"));
        assert!(matches!(
            catalog.get("mine").unwrap().kind(),
            ProviderKind::Custom { .. }
        ));
    }
}
