//! Nearest-cable search between two hop locations.

use super::catalog::{Cable, CableCatalog};
use crate::geo::{haversine_km, GeoPoint};
use serde::Serialize;

/// Default acceptance radius for a hop pair to be attributed to a cable.
pub const DEFAULT_TOLERANCE_KM: f64 = 30.0;

/// The best-fitting cable for a pair of points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CableMatch {
    pub id: String,
    /// Docking point nearest to the first location.
    #[serde(rename = "endpoint_A")]
    pub endpoint_a: GeoPoint,
    /// Docking point nearest to the second location.
    #[serde(rename = "endpoint_B")]
    pub endpoint_b: GeoPoint,
    /// Mean of the two nearest-endpoint distances, in km.
    pub avg_distance_km: f64,
}

/// Read-only search over a shared catalog.
#[derive(Debug, Clone, Copy)]
pub struct CableMatcher<'a> {
    catalog: &'a CableCatalog,
}

impl<'a> CableMatcher<'a> {
    pub fn new(catalog: &'a CableCatalog) -> Self {
        Self { catalog }
    }

    /// Find the cable whose nearest docking points to `a` and `b` have the
    /// lowest mean distance, provided that mean is within `tolerance_km`.
    ///
    /// A cable whose nearest endpoint to both points is the same endpoint is
    /// never a candidate. Ties keep the first cable in catalog order.
    pub fn find_nearest_cable(&self, a: GeoPoint, b: GeoPoint, tolerance_km: f64) -> Option<CableMatch> {
        let mut best: Option<CableMatch> = None;

        for cable in self.catalog.cables() {
            let Some((endpoint_a, dist_a)) = nearest_endpoint(cable, a) else { continue };
            let Some((endpoint_b, dist_b)) = nearest_endpoint(cable, b) else { continue };

            if endpoint_a == endpoint_b {
                continue;
            }

            let avg = (dist_a + dist_b) / 2.0;
            if best.as_ref().map_or(true, |m| avg < m.avg_distance_km) {
                best = Some(CableMatch {
                    id: cable.id.clone(),
                    endpoint_a,
                    endpoint_b,
                    avg_distance_km: avg,
                });
            }
        }

        best.filter(|m| m.avg_distance_km <= tolerance_km)
    }
}

// First endpoint at the minimum distance wins.
fn nearest_endpoint(cable: &Cable, point: GeoPoint) -> Option<(GeoPoint, f64)> {
    let mut nearest: Option<(GeoPoint, f64)> = None;
    for &endpoint in &cable.endpoints {
        let d = haversine_km(point, endpoint);
        if nearest.map_or(true, |(_, best)| d < best) {
            nearest = Some((endpoint, d));
        }
    }
    nearest
}
