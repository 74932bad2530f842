//! Collapse runs of consecutive hops that sit at the same physical site.

use super::types::{Location, MergedLocation};

/// Two records describe the same site when they share a facility or have
/// exactly equal coordinates.
pub fn same_site(anchor: &MergedLocation, candidate: &MergedLocation) -> bool {
    if let (Some(a), Some(b)) = (&anchor.facility, &candidate.facility) {
        if a.id == b.id {
            return true;
        }
    }
    anchor.latitude == candidate.latitude && anchor.longitude == candidate.longitude
}

/// Merge adjacent equivalent records, preserving order.
///
/// Each run is folded into its first record: IPs are appended, a later
/// member's outbound cable replaces the anchor's, and `distance_from` keeps
/// the largest value seen in the run.
pub fn merge(records: impl IntoIterator<Item = MergedLocation>) -> Vec<MergedLocation> {
    let mut merged = Vec::new();
    let mut iter = records.into_iter();
    let Some(mut anchor) = iter.next() else {
        return merged;
    };

    for candidate in iter {
        if same_site(&anchor, &candidate) {
            absorb(&mut anchor, candidate);
        } else {
            merged.push(std::mem::replace(&mut anchor, candidate));
        }
    }
    merged.push(anchor);
    merged
}

/// Convert enriched hops and merge them.
pub fn merge_locations(locations: Vec<Location>) -> Vec<MergedLocation> {
    merge(locations.into_iter().map(MergedLocation::from))
}

fn absorb(anchor: &mut MergedLocation, candidate: MergedLocation) {
    anchor.ips.extend(candidate.ips);
    if candidate.source_cable.is_some() {
        anchor.source_cable = candidate.source_cable;
    }
    if candidate.distance_from > anchor.distance_from {
        anchor.distance_from = candidate.distance_from;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::location::types::{CableLink, Facility};

    fn facility(id: u64) -> Facility {
        Facility {
            id,
            name: format!("F{}", id),
            city: None,
            country: None,
            latitude: None,
            longitude: None,
            website: None,
        }
    }

    fn record(ip: &str, lat: f64, lon: f64, fac: Option<u64>) -> MergedLocation {
        MergedLocation {
            ips: vec![ip.to_string()],
            latitude: Some(lat),
            longitude: Some(lon),
            city: None,
            country: None,
            facility: fac.map(facility),
            isp: None,
            source_cable: None,
            dest_cable: None,
            distance_to: 0.0,
            distance_from: 0.0,
        }
    }

    fn ips(out: &[MergedLocation]) -> Vec<Vec<&str>> {
        out.iter().map(|m| m.ips.iter().map(String::as_str).collect()).collect()
    }

    #[test]
    fn test_merge_by_facility() {
        let out = merge(vec![
            record("1.1.1.1", 1.0, 1.0, Some(1)),
            record("2.2.2.2", 2.0, 2.0, Some(1)),
            record("3.3.3.3", 3.0, 3.0, Some(2)),
        ]);
        assert_eq!(ips(&out), vec![vec!["1.1.1.1", "2.2.2.2"], vec!["3.3.3.3"]]);
        assert_eq!(out[0].facility.as_ref().map(|f| f.id), Some(1));
        assert_eq!(out[1].facility.as_ref().map(|f| f.id), Some(2));
    }

    #[test]
    fn test_merge_by_exact_coordinates() {
        let out = merge(vec![
            record("a", 48.8566, 2.3522, None),
            record("b", 48.8566, 2.3522, Some(9)),
            record("c", 48.8566, 2.3523, None),
        ]);
        assert_eq!(ips(&out), vec![vec!["a", "b"], vec!["c"]]);
        // The anchor's own fields are kept.
        assert!(out[0].facility.is_none());
    }

    #[test]
    fn test_different_facilities_same_coordinates_still_merge() {
        let out = merge(vec![record("a", 1.0, 1.0, Some(1)), record("b", 1.0, 1.0, Some(2))]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_only_adjacent_runs_merge() {
        let out = merge(vec![
            record("a", 1.0, 1.0, Some(1)),
            record("b", 2.0, 2.0, Some(2)),
            record("c", 1.0, 1.0, Some(1)),
        ]);
        assert_eq!(ips(&out), vec![vec!["a"], vec!["b"], vec!["c"]]);
    }

    #[test]
    fn test_source_cable_taken_from_later_member() {
        let mut a = record("a", 1.0, 1.0, None);
        a.dest_cable = Some(CableLink { id: "in".into(), entry_point: GeoPoint::new(1.0, 1.0) });
        let mut b = record("b", 1.0, 1.0, None);
        b.source_cable = Some(CableLink { id: "out".into(), entry_point: GeoPoint::new(1.1, 1.1) });
        let c = record("c", 1.0, 1.0, None);

        let out = merge(vec![a, b, c]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_cable.as_ref().map(|l| l.id.as_str()), Some("out"));
        assert_eq!(out[0].dest_cable.as_ref().map(|l| l.id.as_str()), Some("in"));
    }

    #[test]
    fn test_distance_from_keeps_maximum() {
        let mut a = record("a", 1.0, 1.0, None);
        a.distance_to = 12.0;
        let mut b = record("b", 1.0, 1.0, None);
        b.distance_from = 850.0;
        let mut c = record("c", 1.0, 1.0, None);
        c.distance_from = 0.0;

        let out = merge(vec![a, b, c]);
        assert_eq!(out[0].distance_from, 850.0);
        assert_eq!(out[0].distance_to, 12.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(merge(Vec::new()).is_empty());
    }

    #[test]
    fn test_preserves_ip_count() {
        let input = vec![
            record("a", 1.0, 1.0, Some(1)),
            record("b", 1.0, 1.0, None),
            record("c", 5.0, 5.0, Some(2)),
            record("d", 6.0, 6.0, Some(2)),
            record("e", 7.0, 7.0, None),
            record("f", 7.0, 7.0, None),
            record("g", 8.0, 8.0, None),
        ];
        let n = input.len();
        let out = merge(input);
        assert_eq!(out.iter().map(|m| m.ips.len()).sum::<usize>(), n);
        assert_eq!(ips(&out), vec![vec!["a", "b"], vec!["c", "d"], vec!["e", "f"], vec!["g"]]);
    }

    #[test]
    fn test_idempotent() {
        let input = vec![
            record("a", 1.0, 1.0, Some(1)),
            record("b", 2.0, 2.0, Some(1)),
            record("c", 2.0, 2.0, None),
            record("d", 3.0, 3.0, Some(4)),
            record("e", 4.0, 4.0, None),
        ];
        let once = merge(input);
        let twice = merge(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_locations_from_hops() {
        let hop = |ip: &str, lat: f64| Location {
            point: Some(GeoPoint::new(lat, 0.0)),
            ..Location::new(ip)
        };
        let out = merge_locations(vec![hop("x", 1.0), hop("y", 1.0), hop("z", 2.0)]);
        assert_eq!(ips(&out), vec![vec!["x", "y"], vec!["z"]]);
    }
}
