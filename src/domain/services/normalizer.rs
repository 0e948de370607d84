//! Response Normalizer
//!
//! Pure mapping from each provider's JSON payload to a `LocationRecord`.
//! Every built-in provider has an explicit payload type; ad-hoc providers go
//! through a separate best-effort mapping that guesses common key names.
//!
//! Normalizers check the provider's in-band failure sentinel before mapping
//! anything, and never substitute defaults for fields the payload lacks.

use crate::domain::entities::LocationRecord;
use crate::domain::services::provider_catalog::{ProviderDescriptor, ProviderKind};
use crate::domain::value_objects::FailureKind;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Why a payload could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("provider reported failure: {0}")]
    ProviderSignaled(String),
    #[error("missing required field '{0}'")]
    MissingAnchor(&'static str),
    #[error("unexpected payload shape: {0}")]
    Shape(String),
}

impl NormalizeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ProviderSignaled(_) => FailureKind::ProviderSignaled,
            Self::MissingAnchor(_) | Self::Shape(_) => FailureKind::Schema,
        }
    }
}

/// Normalize a payload, discarding the failure reason.
pub fn normalize(provider: &ProviderDescriptor, raw: &Value) -> Option<LocationRecord> {
    try_normalize(provider, raw).ok()
}

/// Normalize a payload with the mapping that belongs to the provider's kind.
pub fn try_normalize(
    provider: &ProviderDescriptor,
    raw: &Value,
) -> Result<LocationRecord, NormalizeError> {
    let source = provider.name();
    match provider.kind() {
        ProviderKind::IpWhoIs => ip_who_is(source, parse(raw)?),
        ProviderKind::IpApiCom => ip_api_com(source, parse(raw)?),
        ProviderKind::IpApiCo => ip_api_co(source, parse(raw)?),
        ProviderKind::IpInfo => ip_info(source, parse(raw)?),
        ProviderKind::GeoJs => geo_js(source, parse(raw)?),
        ProviderKind::DbIp => db_ip(source, parse(raw)?),
        ProviderKind::Custom { .. } => normalize_generic(source, raw),
    }
}

fn parse<T: DeserializeOwned>(raw: &Value) -> Result<T, NormalizeError> {
    if !raw.is_object() {
        return Err(NormalizeError::Shape("expected a JSON object".to_string()));
    }
    T::deserialize(raw).map_err(|e| NormalizeError::Shape(e.to_string()))
}

fn anchored(source: &str, ip: Option<String>) -> Result<LocationRecord, NormalizeError> {
    let ip = ip.ok_or(NormalizeError::MissingAnchor("ip"))?;
    Ok(LocationRecord {
        ip: Some(ip),
        ..LocationRecord::new(source)
    })
}

fn signaled(message: Option<String>, fallback: &str) -> NormalizeError {
    NormalizeError::ProviderSignaled(message.unwrap_or_else(|| fallback.to_string()))
}

fn forward(record: &mut LocationRecord, key: &str, value: Option<String>) {
    if let Some(v) = value {
        record.extra.insert(key.to_string(), Value::String(v));
    }
}

// ===== ipwho.is =====

#[derive(Debug, Deserialize)]
struct IpWhoIsPayload {
    #[serde(default, deserialize_with = "lenient::flag")]
    success: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    message: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    ip: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    continent: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    country: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    region: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    region_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    postal: Option<String>,
    #[serde(default)]
    flag: Option<IpWhoIsFlag>,
    #[serde(default)]
    connection: Option<IpWhoIsConnection>,
    #[serde(default)]
    timezone: Option<IpWhoIsTimezone>,
}

#[derive(Debug, Deserialize)]
struct IpWhoIsFlag {
    #[serde(default, deserialize_with = "lenient::text")]
    emoji: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpWhoIsConnection {
    #[serde(default, deserialize_with = "lenient::text")]
    asn: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    org: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    isp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpWhoIsTimezone {
    #[serde(default, deserialize_with = "lenient::text")]
    id: Option<String>,
}

fn ip_who_is(source: &str, p: IpWhoIsPayload) -> Result<LocationRecord, NormalizeError> {
    if p.success == Some(false) {
        return Err(signaled(p.message, "success=false"));
    }

    let mut record = anchored(source, p.ip)?;
    record.country = p.country;
    record.country_code = p.country_code.map(|c| c.to_ascii_uppercase());
    record.region = p.region_code;
    record.region_name = p.region;
    record.city = p.city;
    record.latitude = latitude(p.latitude);
    record.longitude = longitude(p.longitude);
    record.timezone = p.timezone.and_then(|t| t.id);
    if let Some(conn) = p.connection {
        record.asn = conn.asn.as_deref().and_then(parse_asn).map(|(n, _)| n);
        record.org = conn.org;
        record.isp = conn.isp;
    }
    forward(&mut record, "continent", p.continent);
    forward(&mut record, "postal", p.postal);
    forward(&mut record, "flag", p.flag.and_then(|f| f.emoji));
    Ok(record)
}

// ===== ip-api.com =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiComPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    message: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    query: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    country: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    region: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    region_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    zip: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    timezone: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    isp: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    org: Option<String>,
    #[serde(default, rename = "as", deserialize_with = "lenient::text")]
    as_number: Option<String>,
}

fn ip_api_com(source: &str, p: IpApiComPayload) -> Result<LocationRecord, NormalizeError> {
    let failed = p
        .status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("fail"));
    if failed {
        return Err(signaled(p.message, "status=fail"));
    }

    let mut record = anchored(source, p.query)?;
    record.country = p.country;
    record.country_code = p.country_code.map(|c| c.to_ascii_uppercase());
    record.region = p.region;
    record.region_name = p.region_name;
    record.city = p.city;
    record.latitude = latitude(p.lat);
    record.longitude = longitude(p.lon);
    record.timezone = p.timezone;
    record.isp = p.isp;
    record.org = p.org;
    record.asn = p.as_number.as_deref().and_then(parse_asn).map(|(n, _)| n);
    forward(&mut record, "postal", p.zip);
    Ok(record)
}

// ===== ipapi.co =====

#[derive(Debug, Deserialize)]
struct IpApiCoPayload {
    #[serde(default, deserialize_with = "lenient::flag")]
    error: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    ip: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    country_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    region: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    region_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    postal: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    timezone: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    currency: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    asn: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    org: Option<String>,
}

fn ip_api_co(source: &str, p: IpApiCoPayload) -> Result<LocationRecord, NormalizeError> {
    if p.error == Some(true) {
        return Err(signaled(p.reason, "error=true"));
    }

    let mut record = anchored(source, p.ip)?;
    record.country = p.country_name;
    record.country_code = p.country_code.map(|c| c.to_ascii_uppercase());
    record.region = p.region_code;
    record.region_name = p.region;
    record.city = p.city;
    record.latitude = latitude(p.latitude);
    record.longitude = longitude(p.longitude);
    record.timezone = p.timezone;
    record.asn = p.asn.as_deref().and_then(parse_asn).map(|(n, _)| n);
    record.org = p.org;
    forward(&mut record, "postal", p.postal);
    forward(&mut record, "currency", p.currency);
    Ok(record)
}

// ===== ipinfo.io =====

#[derive(Debug, Deserialize)]
struct IpInfoPayload {
    #[serde(default, deserialize_with = "lenient::flag")]
    bogon: Option<bool>,
    #[serde(default)]
    error: Option<IpInfoError>,
    #[serde(default, deserialize_with = "lenient::text")]
    ip: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    hostname: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    city: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    region: Option<String>,
    /// Two-letter code only; ipinfo does not send a country name
    #[serde(default, deserialize_with = "lenient::text")]
    country: Option<String>,
    /// "lat,lon"
    #[serde(default, deserialize_with = "lenient::text")]
    loc: Option<String>,
    /// "AS15169 Google LLC"
    #[serde(default, deserialize_with = "lenient::text")]
    org: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    postal: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IpInfoError {
    Detailed {
        #[serde(default, deserialize_with = "lenient::text")]
        title: Option<String>,
        #[serde(default, deserialize_with = "lenient::text")]
        message: Option<String>,
    },
    Plain(Value),
}

fn ip_info(source: &str, p: IpInfoPayload) -> Result<LocationRecord, NormalizeError> {
    if p.bogon == Some(true) {
        return Err(NormalizeError::ProviderSignaled("bogon address".to_string()));
    }
    match p.error {
        Some(IpInfoError::Detailed { title, message }) => {
            return Err(signaled(message.or(title), "error"));
        }
        Some(IpInfoError::Plain(v)) if !v.is_null() => {
            return Err(signaled(value_text(&v), "error"));
        }
        _ => {}
    }

    let mut record = anchored(source, p.ip)?;
    record.country_code = p.country.map(|c| c.to_ascii_uppercase());
    record.region_name = p.region;
    record.city = p.city;
    if let Some((lat, lon)) = p.loc.as_deref().and_then(parse_loc) {
        record.latitude = latitude(Some(lat));
        record.longitude = longitude(Some(lon));
    }
    record.timezone = p.timezone;
    match p.org.as_deref().and_then(parse_asn) {
        Some((asn, name)) => {
            record.asn = Some(asn);
            record.org = name;
        }
        None => record.org = p.org,
    }
    forward(&mut record, "postal", p.postal);
    forward(&mut record, "hostname", p.hostname);
    Ok(record)
}

// ===== geojs.io =====

#[derive(Debug, Deserialize)]
struct GeoJsPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    ip: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    country: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    region: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    city: Option<String>,
    /// Sent as a string
    #[serde(default, deserialize_with = "lenient::number")]
    latitude: Option<f64>,
    /// Sent as a string
    #[serde(default, deserialize_with = "lenient::number")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    timezone: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    asn: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    organization_name: Option<String>,
}

fn geo_js(source: &str, p: GeoJsPayload) -> Result<LocationRecord, NormalizeError> {
    // No in-band sentinel: unknown addresses come back without an ip
    let mut record = anchored(source, p.ip)?;
    record.country = p.country;
    record.country_code = p.country_code.map(|c| c.to_ascii_uppercase());
    record.region_name = p.region;
    record.city = p.city;
    record.latitude = latitude(p.latitude);
    record.longitude = longitude(p.longitude);
    record.timezone = p.timezone;
    record.asn = p.asn.as_deref().and_then(parse_asn).map(|(n, _)| n);
    record.org = p.organization_name;
    Ok(record)
}

// ===== db-ip.com =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DbIpPayload {
    #[serde(default, deserialize_with = "lenient::text")]
    error: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    ip_address: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    continent_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    country_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    state_prov_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    state_prov: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    city: Option<String>,
}

fn db_ip(source: &str, p: DbIpPayload) -> Result<LocationRecord, NormalizeError> {
    if let Some(error) = p.error {
        return Err(NormalizeError::ProviderSignaled(error));
    }

    let mut record = anchored(source, p.ip_address)?;
    record.country = p.country_name;
    record.country_code = p.country_code.map(|c| c.to_ascii_uppercase());
    record.region = p.state_prov_code;
    record.region_name = p.state_prov;
    record.city = p.city;
    forward(&mut record, "continent", p.continent_name);
    Ok(record)
}

// ===== Best-effort mapping for ad-hoc providers =====

const IP_KEYS: &[&str] = &["ip", "query", "ipAddress", "ip_address"];
const COUNTRY_KEYS: &[&str] = &["country_name", "countryName", "country"];
const COUNTRY_CODE_KEYS: &[&str] = &["country_code", "countryCode"];
const REGION_KEYS: &[&str] = &["region_code", "regionCode"];
const REGION_NAME_KEYS: &[&str] = &["region_name", "regionName", "region", "state"];
const CITY_KEYS: &[&str] = &["city", "cityName"];
const TIMEZONE_KEYS: &[&str] = &["timezone", "time_zone", "timeZone"];
const LATITUDE_KEYS: &[&str] = &["latitude", "lat"];
const LONGITUDE_KEYS: &[&str] = &["longitude", "lon", "lng"];
const ISP_KEYS: &[&str] = &["isp"];
const ORG_KEYS: &[&str] = &["org", "organization", "organization_name"];
const ASN_KEYS: &[&str] = &["asn", "as"];

/// Best-effort normalizer for providers without a precise mapping.
///
/// Inspects a small set of common key names and the common failure
/// sentinels. Forwards nothing into `extra`. Never used for a provider that
/// has a precise mapping.
pub fn normalize_generic(source: &str, raw: &Value) -> Result<LocationRecord, NormalizeError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| NormalizeError::Shape("expected a JSON object".to_string()))?;

    if let Some(reason) = generic_sentinel(obj) {
        return Err(NormalizeError::ProviderSignaled(reason));
    }

    let mut record = anchored(source, first_text(obj, IP_KEYS))?;
    record.country = first_text(obj, COUNTRY_KEYS)
        // a two-letter "country" is a code, not a name
        .filter(|c| !(c.len() == 2 && c.chars().all(|ch| ch.is_ascii_alphabetic())));
    record.country_code = first_text(obj, COUNTRY_CODE_KEYS)
        .or_else(|| first_text(obj, &["country"]).filter(|c| c.len() == 2))
        .map(|c| c.to_ascii_uppercase());
    record.region = first_text(obj, REGION_KEYS);
    record.region_name = first_text(obj, REGION_NAME_KEYS);
    record.city = first_text(obj, CITY_KEYS);
    record.timezone = TIMEZONE_KEYS
        .iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| match v {
            Value::Object(tz) => first_text(tz, &["id", "name"]),
            other => value_text(other),
        });

    record.latitude = latitude(first_f64(obj, LATITUDE_KEYS));
    record.longitude = longitude(first_f64(obj, LONGITUDE_KEYS));
    if !record.has_coordinates() {
        if let Some((lat, lon)) = first_text(obj, &["loc"]).as_deref().and_then(parse_loc) {
            record.latitude = latitude(Some(lat));
            record.longitude = longitude(Some(lon));
        }
    }

    record.isp = first_text(obj, ISP_KEYS);
    let org = first_text(obj, ORG_KEYS);
    let asn = first_text(obj, ASN_KEYS).as_deref().and_then(parse_asn);
    match (asn, org) {
        (Some((n, name)), None) => {
            record.asn = Some(n);
            record.org = name;
        }
        (asn, Some(org)) => match parse_asn(&org) {
            Some((n, name)) => {
                record.asn = asn.map(|(a, _)| a).or(Some(n));
                record.org = name;
            }
            None => {
                record.asn = asn.map(|(a, _)| a);
                record.org = Some(org);
            }
        },
        (None, None) => {}
    }
    Ok(record)
}

fn generic_sentinel(obj: &Map<String, Value>) -> Option<String> {
    let message = || first_text(obj, &["message", "reason"]);

    if obj.get("success").and_then(Value::as_bool) == Some(false) {
        return Some(message().unwrap_or_else(|| "success=false".to_string()));
    }
    if obj
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("fail") || s.eq_ignore_ascii_case("error"))
    {
        return Some(message().unwrap_or_else(|| "status=fail".to_string()));
    }
    match obj.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::Bool(true)) => Some(message().unwrap_or_else(|| "error=true".to_string())),
        Some(Value::Object(err)) => Some(
            first_text(err, &["message", "title"]).unwrap_or_else(|| "error".to_string()),
        ),
        Some(other) => Some(value_text(other).unwrap_or_else(|| "error".to_string())),
    }
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(value_text)
}

fn first_f64(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(value_f64)
}

// ===== Field helpers =====

/// Strings are trimmed and blank ones treated as unknown; numbers are
/// rendered; anything else is unknown.
fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn latitude(v: Option<f64>) -> Option<f64> {
    v.filter(|l| (-90.0..=90.0).contains(l))
}

fn longitude(v: Option<f64>) -> Option<f64> {
    v.filter(|l| (-180.0..=180.0).contains(l))
}

/// Split "37.4056,-122.0775" into coordinates.
fn parse_loc(s: &str) -> Option<(f64, f64)> {
    let (lat, lon) = s.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

/// Parse "AS15169 Google LLC", "AS15169" or "15169".
///
/// Returns the number and the trailing organization name, if any.
fn parse_asn(s: &str) -> Option<(u32, Option<String>)> {
    let s = s.trim();
    let rest = match s.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("as") => &s[2..],
        _ => s,
    };
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let number = rest[..digits_end].parse().ok()?;
    let name = rest[digits_end..].trim();
    Some((number, (!name.is_empty()).then(|| name.to_string())))
}

/// Field deserializers that tolerate providers sending the "wrong" JSON type.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(super::value_text(&Value::deserialize(d)?))
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(super::value_f64(&Value::deserialize(d)?))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => Some(b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        })
    }
}
