//! Builds one enriched [`Location`] per hop address.

use super::providers::{FacilityProvider, GeoLookup, GeoProvider, GeoRecord};
use super::resolver::{acquire, FacilityResolver};
use super::types::{EnrichWarning, Location};
use crate::geo::GeoPoint;
use regex::Regex;
use std::sync::OnceLock;
use tokio::sync::Semaphore;

/// A hop plus anything that went wrong while filling it in.
#[derive(Debug)]
pub struct Enriched {
    pub location: Location,
    pub warnings: Vec<EnrichWarning>,
}

/// Geolocates an address and attaches its nearest facility.
pub struct LocationEnricher<'a, G, F> {
    geo: &'a G,
    facilities: FacilityResolver<'a, F>,
    limiter: &'a Semaphore,
}

impl<'a, G: GeoProvider, F: FacilityProvider> LocationEnricher<'a, G, F> {
    pub fn new(geo: &'a G, facilities: &'a F, limiter: &'a Semaphore) -> Self {
        Self {
            geo,
            facilities: FacilityResolver::new(facilities, limiter),
            limiter,
        }
    }

    /// Enrich a single address. Never fails: provider problems leave a
    /// partially filled location and are reported as warnings.
    pub async fn enrich(&self, ip: &str) -> Enriched {
        let mut warnings = Vec::new();

        let lookup = match acquire(self.limiter).await {
            Ok(_permit) => self.geo.lookup(ip).await,
            Err(e) => Err(e),
        };

        let mut location = match lookup {
            Ok(GeoLookup::Private) => {
                log::debug!("{} is a private or reserved address", ip);
                return Enriched { location: Location::private(ip), warnings };
            }
            Ok(GeoLookup::Found(record)) => from_record(ip, record, &mut warnings),
            Err(source) => {
                warnings.push(EnrichWarning::Geolocation { ip: ip.to_string(), source });
                return Enriched { location: Location::new(ip), warnings };
            }
        };

        if location.point.is_some() {
            match self.facilities.resolve(&location).await {
                Ok(facility) => location.facility = facility,
                Err(source) => warnings.push(EnrichWarning::Facility { ip: ip.to_string(), source }),
            }
        }

        Enriched { location, warnings }
    }
}

fn from_record(ip: &str, record: GeoRecord, warnings: &mut Vec<EnrichWarning>) -> Location {
    let asn = match record.as_text.as_deref() {
        Some(raw) => {
            let asn = parse_asn(raw);
            if asn.is_none() {
                warnings.push(EnrichWarning::UnparsedAsn { ip: ip.to_string(), raw: raw.to_string() });
            }
            asn
        }
        None => {
            warnings.push(EnrichWarning::UnparsedAsn { ip: ip.to_string(), raw: String::new() });
            None
        }
    };

    let point = match (record.lat, record.lon) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
        _ => None,
    };

    Location {
        country: record.country,
        country_code: record.country_code,
        region: record.region,
        region_name: record.region_name,
        city: record.city,
        zip: record.zip,
        point,
        isp: record.isp,
        asn,
        ..Location::new(ip)
    }
}

/// Extract the AS number from free text such as `"AS15169 Google LLC"`.
///
/// Takes the first run of ASCII digits; `None` if there is none or it does
/// not fit in 32 bits.
pub fn parse_asn(text: &str) -> Option<u32> {
    static DIGITS: OnceLock<Option<Regex>> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new(r"[0-9]+").ok()).as_ref()?;
    re.find(text)?.as_str().parse().ok()
}
