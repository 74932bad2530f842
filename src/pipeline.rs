//! Hop enrichment pipeline.
//!
//! Flow: enrich every address concurrently → drop private/unresolved hops →
//! link neighbors (cables, distances) → merge same-site runs.

use crate::cables::CableCatalog;
use crate::config::Config;
use crate::location::{
    link_neighbors, merge_locations, Enriched, FacilityProvider, GeoProvider, IpApiProvider, Location,
    LocationEnricher, MergedLocation, PeeringDbProvider,
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Orchestrates enrichment for one batch of hop addresses at a time.
///
/// The catalog is shared read-only; every outbound provider request holds a
/// permit from one semaphore, so nested fan-out stays within the limit.
pub struct Pipeline<G, F> {
    catalog: Arc<CableCatalog>,
    geo: G,
    facilities: F,
    limiter: Semaphore,
    tolerance_km: f64,
}

impl Pipeline<IpApiProvider, PeeringDbProvider> {
    /// Pipeline backed by ip-api.com and PeeringDB.
    pub fn live(config: &Config, catalog: Arc<CableCatalog>) -> Self {
        let geo = IpApiProvider::new(config.provider_timeout);
        let facilities = PeeringDbProvider::new(config.peeringdb_api_key.clone(), config.provider_timeout);
        Self::new(catalog, geo, facilities, config)
    }
}

impl<G: GeoProvider, F: FacilityProvider> Pipeline<G, F> {
    pub fn new(catalog: Arc<CableCatalog>, geo: G, facilities: F, config: &Config) -> Self {
        Self {
            catalog,
            geo,
            facilities,
            limiter: Semaphore::new(config.max_concurrency.clamp(1, Semaphore::MAX_PERMITS)),
            tolerance_km: config.cable_tolerance_km,
        }
    }

    pub fn catalog(&self) -> &CableCatalog {
        &self.catalog
    }

    pub fn tolerance_km(&self) -> f64 {
        self.tolerance_km
    }

    /// Enrich every address. Results come back in input order.
    pub async fn enrich_all(&self, ips: &[String]) -> Vec<Enriched> {
        let enricher = LocationEnricher::new(&self.geo, &self.facilities, &self.limiter);
        let enricher = &enricher;

        let mut tasks: FuturesUnordered<_> = ips
            .iter()
            .enumerate()
            .map(|(index, ip)| async move { (index, enricher.enrich(ip).await) })
            .collect();

        let mut done = Vec::with_capacity(ips.len());
        while let Some(item) = tasks.next().await {
            done.push(item);
        }
        // Completion order is arbitrary; restore the hop order.
        done.sort_by_key(|(index, _)| *index);
        done.into_iter().map(|(_, enriched)| enriched).collect()
    }

    /// Resolved hops in input order, with cables and distances linked.
    pub async fn locate(&self, ips: &[String]) -> Vec<Location> {
        let mut locations = Vec::with_capacity(ips.len());
        for Enriched { location, warnings } in self.enrich_all(ips).await {
            for warning in &warnings {
                log::warn!("{}", warning);
            }
            if location.is_private {
                log::debug!("Dropping private hop {}", location.ip);
            } else if location.point.is_none() {
                log::debug!("Dropping unresolved hop {}", location.ip);
            } else {
                locations.push(location);
            }
        }

        link_neighbors(&mut locations, &self.catalog, self.tolerance_km);
        locations
    }

    /// Full pipeline: the client-facing, merged view of a hop list.
    pub async fn run(&self, ips: &[String]) -> Vec<MergedLocation> {
        let start = Instant::now();
        let locations = self.locate(ips).await;
        let resolved = locations.len();
        let merged = merge_locations(locations);

        log::info!(
            "Enriched {} hops -> {} resolved -> {} sites ({:.1}ms)",
            ips.len(),
            resolved,
            merged.len(),
            start.elapsed().as_secs_f64() * 1000.0,
        );
        merged
    }
}
