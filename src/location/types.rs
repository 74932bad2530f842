//! Core types for the hop location subsystem.

use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A physical interconnection facility (PeeringDB `fac` object, trimmed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub website: Option<String>,
}

impl Facility {
    /// Coordinates, when the registry has both.
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

/// One side of a cable crossing: which cable, and where the hop meets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CableLink {
    pub id: String,
    pub entry_point: GeoPoint,
}

/// Enriched state of a single traceroute hop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Location {
    pub ip: String,
    pub country: Option<String>,
    /// ISO 3166-1 alpha-2 code (e.g. "US", "SE")
    pub country_code: Option<String>,
    /// Short region code (e.g. "CA" for California)
    pub region: Option<String>,
    pub region_name: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub point: Option<GeoPoint>,
    pub isp: Option<String>,
    pub asn: Option<u32>,
    pub facility: Option<Facility>,
    pub is_private: bool,
    /// Set when this hop is the sending side of a cable crossing.
    pub source_cable: Option<CableLink>,
    /// Set when this hop is the receiving side of a cable crossing.
    pub destination_cable: Option<CableLink>,
    /// Distance from the previous hop, km.
    pub distance_to: f64,
    /// Distance to the next hop, km.
    pub distance_from: f64,
}

impl Location {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    /// A hop the geolocation provider reported as private or reserved.
    pub fn private(ip: impl Into<String>) -> Self {
        Self {
            is_private: true,
            ..Self::new(ip)
        }
    }

    /// Whether the hop can take part in linking and merging.
    pub fn is_resolved(&self) -> bool {
        !self.is_private && self.point.is_some()
    }

    pub fn set_source_cable(&mut self, id: impl Into<String>, entry_point: GeoPoint) {
        self.source_cable = Some(CableLink { id: id.into(), entry_point });
    }

    pub fn set_destination_cable(&mut self, id: impl Into<String>, entry_point: GeoPoint) {
        self.destination_cable = Some(CableLink { id: id.into(), entry_point });
    }
}

/// Client-facing record for one physical site, covering one or more hops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedLocation {
    pub ips: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    /// Country code, as the map client expects.
    pub country: Option<String>,
    pub facility: Option<Facility>,
    pub isp: Option<String>,
    pub source_cable: Option<CableLink>,
    pub dest_cable: Option<CableLink>,
    pub distance_to: f64,
    pub distance_from: f64,
}

impl From<Location> for MergedLocation {
    fn from(loc: Location) -> Self {
        Self {
            ips: vec![loc.ip],
            latitude: loc.point.map(|p| p.lat),
            longitude: loc.point.map(|p| p.lon),
            city: loc.city,
            country: loc.country_code,
            facility: loc.facility,
            isp: loc.isp,
            source_cable: loc.source_cable,
            dest_cable: loc.destination_cable,
            distance_to: loc.distance_to,
            distance_from: loc.distance_from,
        }
    }
}

/// Failure talking to a geolocation or facility registry.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned HTTP {code}")]
    Status { code: u16 },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Provider task did not complete: {0}")]
    Unavailable(String),
}

impl From<ureq::Error> for ProviderError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => Self::Status { code },
            ureq::Error::Transport(t) => Self::Network(t.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ProviderError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Non-fatal problems found while enriching a hop. The hop is still returned.
#[derive(Error, Debug)]
pub enum EnrichWarning {
    #[error("No AS number in '{raw}' for {ip}")]
    UnparsedAsn { ip: String, raw: String },

    #[error("Geolocation failed for {ip}: {source}")]
    Geolocation {
        ip: String,
        #[source]
        source: ProviderError,
    },

    #[error("Facility search failed for {ip}: {source}")]
    Facility {
        ip: String,
        #[source]
        source: ProviderError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(lat: Option<f64>, lon: Option<f64>) -> Facility {
        Facility {
            id: 1,
            name: "Equinix SV1".into(),
            city: Some("San Jose".into()),
            country: Some("US".into()),
            latitude: lat,
            longitude: lon,
            website: None,
        }
    }

    #[test]
    fn test_facility_point_requires_both() {
        assert_eq!(facility(Some(1.0), Some(2.0)).point(), Some(GeoPoint::new(1.0, 2.0)));
        assert_eq!(facility(Some(1.0), None).point(), None);
        assert_eq!(facility(None, Some(2.0)).point(), None);
    }

    #[test]
    fn test_facility_ignores_extra_registry_fields() {
        let json = r#"{"id": 18, "name": "Equinix SV1", "org_id": 2, "latitude": 37.37,
            "longitude": -121.97, "status": "ok", "clli": "SNJSCA"}"#;
        let fac: Facility = serde_json::from_str(json).unwrap();
        assert_eq!(fac.id, 18);
        assert!(fac.city.is_none());
        assert_eq!(fac.point(), Some(GeoPoint::new(37.37, -121.97)));
    }

    #[test]
    fn test_new_location_defaults() {
        let loc = Location::new("8.8.8.8");
        assert_eq!(loc.ip, "8.8.8.8");
        assert_eq!(loc.distance_to, 0.0);
        assert_eq!(loc.distance_from, 0.0);
        assert!(!loc.is_private);
        assert!(!loc.is_resolved());
    }

    #[test]
    fn test_private_is_never_resolved() {
        let mut loc = Location::private("10.0.0.1");
        loc.point = Some(GeoPoint::new(0.0, 0.0));
        assert!(!loc.is_resolved());
    }

    #[test]
    fn test_merged_from_location() {
        let mut loc = Location::new("1.1.1.1");
        loc.point = Some(GeoPoint::new(-33.86, 151.2));
        loc.country = Some("Australia".into());
        loc.country_code = Some("AU".into());
        loc.set_destination_cable("southern-cross", GeoPoint::new(-33.9, 151.3));
        loc.distance_to = 120.5;

        let merged = MergedLocation::from(loc);
        assert_eq!(merged.ips, vec!["1.1.1.1"]);
        assert_eq!(merged.latitude, Some(-33.86));
        assert_eq!(merged.country.as_deref(), Some("AU"));
        assert_eq!(merged.dest_cable.as_ref().unwrap().id, "southern-cross");
        assert!(merged.source_cable.is_none());
        assert_eq!(merged.distance_to, 120.5);
    }

    #[test]
    fn test_merged_json_shape() {
        let mut loc = Location::new("1.1.1.1");
        loc.point = Some(GeoPoint::new(1.0, 2.0));
        loc.set_source_cable("x", GeoPoint::new(1.5, 2.5));
        let json = serde_json::to_value(MergedLocation::from(loc)).unwrap();
        for key in [
            "ips", "latitude", "longitude", "city", "country", "facility", "isp",
            "source_cable", "dest_cable", "distance_to", "distance_from",
        ] {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(json["source_cable"]["entry_point"]["lat"], 1.5);
        assert!(json["dest_cable"].is_null());
    }
}
