//! External collaborators: ip-api.com geolocation and the PeeringDB facility registry.
//!
//! The HTTP clients are blocking (`ureq`) and run on tokio's blocking pool.
//! Response bodies are decoded by plain functions so they can be tested
//! against fixtures without a network.

use super::types::{Facility, Location, ProviderError};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

const USER_AGENT: &str = "UnderseaTrace/0.3 (hop-enrichment)";

pub const IP_API_BASE: &str = "http://ip-api.com";
pub const PEERINGDB_BASE: &str = "https://www.peeringdb.com/api";

// ─── Provider contracts ─────────────────────────────────────────

/// Raw geolocation answer for a routable address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoRecord {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub region_name: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub isp: Option<String>,
    /// Free-text AS field, e.g. "AS15169 Google LLC".
    pub as_text: Option<String>,
}

/// Outcome of a geolocation lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoLookup {
    Found(GeoRecord),
    /// Private, reserved, or otherwise non-routable address.
    Private,
}

/// Resolves an IP address to a place.
pub trait GeoProvider: Send + Sync {
    fn lookup(&self, ip: &str) -> impl Future<Output = Result<GeoLookup, ProviderError>> + Send;
}

/// Narrowing filter for a facility search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityFilter {
    /// US addresses: filter by state code.
    Region(String),
    /// Elsewhere: filter by city within a country.
    CityCountry { city: String, country: String },
}

impl FacilityFilter {
    /// Pick the narrowest filter the location supports. `None` means no search.
    pub fn for_location(loc: &Location) -> Option<Self> {
        let country = loc.country_code.as_deref().filter(|c| !c.is_empty())?;
        if country.eq_ignore_ascii_case("US") {
            return loc
                .region
                .as_deref()
                .filter(|r| !r.is_empty())
                .map(|r| Self::Region(r.to_string()));
        }
        loc.city
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|city| Self::CityCountry {
                city: city.to_string(),
                country: country.to_string(),
            })
    }

    fn query(&self) -> String {
        match self {
            Self::Region(region) => format!("fac__state={}", urlencode(region)),
            Self::CityCountry { city, country } => {
                format!("fac__city={}&fac__country={}", urlencode(city), urlencode(country))
            }
        }
    }
}

/// Facility registry lookups.
pub trait FacilityProvider: Send + Sync {
    /// Facility ids where the network `asn` is present, narrowed by `filter`.
    fn candidate_ids(
        &self,
        asn: u32,
        filter: &FacilityFilter,
    ) -> impl Future<Output = Result<Vec<u64>, ProviderError>> + Send;

    /// Full facility record, or `None` if the registry has no such id.
    fn facility(&self, id: u64) -> impl Future<Output = Result<Option<Facility>, ProviderError>> + Send;
}

// ─── ip-api.com ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    zip: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    isp: Option<String>,
    #[serde(default, rename = "as")]
    as_text: Option<String>,
}

/// Decode an ip-api.com JSON body.
pub fn parse_ip_api(body: &str) -> Result<GeoLookup, ProviderError> {
    let r: IpApiResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

    match r.status.as_str() {
        "success" => Ok(GeoLookup::Found(GeoRecord {
            country: r.country,
            country_code: r.country_code,
            region: r.region,
            region_name: r.region_name,
            city: r.city,
            zip: r.zip,
            lat: r.lat,
            lon: r.lon,
            isp: r.isp,
            as_text: r.as_text,
        })),
        "fail" => match r.message.as_deref() {
            Some("private range") | Some("reserved range") => Ok(GeoLookup::Private),
            Some(msg) => Err(ProviderError::InvalidResponse(msg.to_string())),
            None => Err(ProviderError::InvalidResponse("lookup failed".into())),
        },
        other => Err(ProviderError::InvalidResponse(format!("unknown status '{}'", other))),
    }
}

/// Geolocation via the free ip-api.com JSON endpoint.
#[derive(Debug, Clone)]
pub struct IpApiProvider {
    base_url: String,
    timeout: Duration,
}

impl IpApiProvider {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(IP_API_BASE, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

impl GeoProvider for IpApiProvider {
    async fn lookup(&self, ip: &str) -> Result<GeoLookup, ProviderError> {
        let url = format!("{}/json/{}", self.base_url, urlencode(ip));
        let body = get_text(url, None, self.timeout).await?;
        parse_ip_api(&body)
    }
}

// ─── PeeringDB ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct PdbEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct NetFac {
    fac_id: u64,
}

/// Decode a `/netfac` listing into facility ids, keeping registry order.
pub fn parse_netfac(body: &str) -> Result<Vec<u64>, ProviderError> {
    let env: PdbEnvelope<NetFac> =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    Ok(env.data.into_iter().map(|n| n.fac_id).collect())
}

/// Decode a `/fac?id=` response. An empty `data` array means no such facility.
pub fn parse_fac(body: &str) -> Result<Option<Facility>, ProviderError> {
    let env: PdbEnvelope<Facility> =
        serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    Ok(env.data.into_iter().next())
}

/// PeeringDB REST client.
#[derive(Debug, Clone)]
pub struct PeeringDbProvider {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl PeeringDbProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        Self::with_base_url(PEERINGDB_BASE, api_key, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        if api_key.is_none() {
            log::warn!("No PeeringDB API key configured; anonymous requests are heavily rate-limited");
        }
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key.as_ref().map(|k| format!("Api-Key {}", k))
    }
}

impl FacilityProvider for PeeringDbProvider {
    async fn candidate_ids(&self, asn: u32, filter: &FacilityFilter) -> Result<Vec<u64>, ProviderError> {
        let url = format!("{}/netfac?net__asn={}&{}", self.base_url, asn, filter.query());
        let body = get_text(url, self.auth_header(), self.timeout).await?;
        parse_netfac(&body)
    }

    async fn facility(&self, id: u64) -> Result<Option<Facility>, ProviderError> {
        let url = format!("{}/fac?id={}", self.base_url, id);
        let body = get_text(url, self.auth_header(), self.timeout).await?;
        parse_fac(&body)
    }
}

// ─── HTTP plumbing ──────────────────────────────────────────────

async fn get_text(url: String, authorization: Option<String>, timeout: Duration) -> Result<String, ProviderError> {
    log::debug!("GET {}", url);
    tokio::task::spawn_blocking(move || {
        let mut request = ureq::get(&url).set("User-Agent", USER_AGENT).timeout(timeout);
        if let Some(auth) = &authorization {
            request = request.set("Authorization", auth);
        }
        let response = request.call()?;
        response
            .into_string()
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    })
    .await?
}

// ─── URL encoding (minimal, no extra dep) ───────────────────────

fn urlencode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b':' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}
