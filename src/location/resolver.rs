//! Facility resolution: registry candidates → details → nearest by great-circle distance.

use super::providers::{FacilityFilter, FacilityProvider};
use super::types::{Facility, Location, ProviderError};
use crate::geo::GeoPoint;
use futures::future::join_all;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Picks the registry facility closest to a located hop.
pub struct FacilityResolver<'a, F> {
    provider: &'a F,
    limiter: &'a Semaphore,
}

impl<'a, F: FacilityProvider> FacilityResolver<'a, F> {
    pub fn new(provider: &'a F, limiter: &'a Semaphore) -> Self {
        Self { provider, limiter }
    }

    /// Resolve the nearest facility for `loc`.
    ///
    /// Returns `Ok(None)` when the hop has no AS number, no coordinates, no
    /// usable region/city filter, or when no candidate has coordinates.
    /// Detail lookups that fail are logged and skipped; only a failed
    /// candidate search is an error.
    pub async fn resolve(&self, loc: &Location) -> Result<Option<Facility>, ProviderError> {
        let (Some(asn), Some(origin)) = (loc.asn, loc.point) else {
            return Ok(None);
        };
        let Some(filter) = FacilityFilter::for_location(loc) else {
            log::debug!("{}: no region or city to search facilities by", loc.ip);
            return Ok(None);
        };

        let ids = {
            let _permit = acquire(self.limiter).await?;
            self.provider.candidate_ids(asn, &filter).await?
        };
        if ids.is_empty() {
            log::debug!("{}: AS{} has no facilities for {:?}", loc.ip, asn, filter);
            return Ok(None);
        }

        let lookups = ids.iter().map(|&id| async move {
            let _permit = acquire(self.limiter).await?;
            self.provider.facility(id).await
        });
        let candidates = join_all(lookups)
            .await
            .into_iter()
            .zip(&ids)
            .filter_map(|(result, id)| match result {
                Ok(fac) => fac,
                Err(e) => {
                    log::warn!("{}: facility {} lookup failed: {}", loc.ip, id, e);
                    None
                }
            });

        Ok(nearest_facility(origin, candidates))
    }
}

pub(crate) async fn acquire(limiter: &Semaphore) -> Result<SemaphorePermit<'_>, ProviderError> {
    limiter
        .acquire()
        .await
        .map_err(|_| ProviderError::Unavailable("request limiter closed".into()))
}

/// The facility nearest to `origin`, skipping any without coordinates.
/// The first of several equally near facilities wins.
pub fn nearest_facility(origin: GeoPoint, candidates: impl IntoIterator<Item = Facility>) -> Option<Facility> {
    let mut best: Option<(Facility, f64)> = None;
    for fac in candidates {
        let Some(point) = fac.point() else { continue };
        let d = origin.distance_km(&point);
        if best.as_ref().map_or(true, |(_, best_d)| d < *best_d) {
            best = Some((fac, d));
        }
    }
    best.map(|(fac, _)| fac)
}
