//! Neighbor linking: cable crossings and distances between consecutive hops.

use super::types::Location;
use crate::cables::{CableCatalog, CableMatcher};
use crate::geo::haversine_km;

/// Populate cable links and distances for every adjacent pair of hops.
///
/// Hop `i` is the cable's source side and hop `i + 1` its destination side,
/// following traversal order. Pairs with a missing coordinate are skipped.
pub fn link_neighbors(locations: &mut [Location], catalog: &CableCatalog, tolerance_km: f64) {
    let matcher = CableMatcher::new(catalog);

    for i in 1..locations.len() {
        let (head, tail) = locations.split_at_mut(i);
        let prev = &mut head[i - 1];
        let next = &mut tail[0];

        let (Some(a), Some(b)) = (prev.point, next.point) else {
            continue;
        };

        if let Some(m) = matcher.find_nearest_cable(a, b, tolerance_km) {
            log::debug!(
                "{} -> {} via cable '{}' (avg {:.1} km from landings)",
                prev.ip, next.ip, m.id, m.avg_distance_km
            );
            prev.set_source_cable(m.id.clone(), m.endpoint_a);
            next.set_destination_cable(m.id, m.endpoint_b);
        }

        let dist = haversine_km(a, b);
        prev.distance_from = dist;
        next.distance_to = dist;
    }
}
