//! Partitioned parallel ingestion (feature `parallel`).
//!
//! Routes are bucketed by weekday.  Each bucket is ingested into its own
//! [`MemoryStore`] on the Rayon pool, then the stores are merged.  Merging
//! is additive, so the result matches sequential ingestion of the same
//! batch up to the order of observed points within a location (and hence
//! floating-point rounding of centroids and sums).

use rayon::prelude::*;

use traj_core::{Weekday, weekday_from_index, weekday_index};
use traj_route::Route;
use traj_spatial::{Geocoder, Router};

use crate::config::ModelConfig;
use crate::model::{IngestReport, MobilityModel};
use crate::store::{MemoryStore, ModelStore};
use crate::MobilityResult;

/// Ingest `batch` across weekday partitions and return the merged store,
/// with probabilities built, and the summed report.
pub fn ingest_partitioned<G: Geocoder, R: Router>(
    geocoder: &G,
    router:   &R,
    config:   &ModelConfig,
    batch:    &[(Route, Weekday)],
) -> MobilityResult<(MemoryStore, IngestReport)> {
    let mut partitions: [Vec<&Route>; 7] = Default::default();
    for (route, weekday) in batch {
        partitions[weekday_index(*weekday) as usize].push(route);
    }
    let partitions: Vec<(Weekday, Vec<&Route>)> = partitions
        .into_iter()
        .enumerate()
        .filter(|(_, routes)| !routes.is_empty())
        .filter_map(|(i, routes)| weekday_from_index(i as u8).map(|day| (day, routes)))
        .collect();

    let results: Vec<(MemoryStore, IngestReport)> = partitions
        .into_par_iter()
        .map(|(weekday, routes)| -> MobilityResult<(MemoryStore, IngestReport)> {
            let mut model = MobilityModel::new(geocoder, router, MemoryStore::new())
                .with_config(config.clone());
            let mut report = IngestReport::default();
            for route in routes {
                report += model.ingest_route(route, weekday)?;
            }
            Ok((model.into_store(), report))
        })
        .collect::<MobilityResult<_>>()?;

    let mut merged = MemoryStore::new();
    let mut total = IngestReport::default();
    for (store, report) in results {
        merged.merge(store)?;
        total += report;
    }
    merged.rebuild_probabilities()?;
    log::info!(
        "ingested {} routes in parallel: {} pairs, {} skipped, {} fallbacks",
        batch.len(),
        total.pairs_ingested,
        total.pairs_skipped,
        total.fallbacks
    );
    Ok((merged, total))
}
