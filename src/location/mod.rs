//! Hop location subsystem.
//!
//! Geolocation and facility providers, per-hop enrichment, neighbor linking
//! across submarine cables, and same-site merging.

pub mod enricher;
pub mod linker;
pub mod merge;
pub mod providers;
pub mod resolver;
pub mod types;

pub use enricher::{parse_asn, Enriched, LocationEnricher};
pub use linker::link_neighbors;
pub use merge::{merge, merge_locations, same_site};
pub use providers::{
    FacilityFilter, FacilityProvider, GeoLookup, GeoProvider, GeoRecord, IpApiProvider, PeeringDbProvider,
};
pub use resolver::{nearest_facility, FacilityResolver};
pub use types::{CableLink, EnrichWarning, Facility, Location, MergedLocation, ProviderError};
