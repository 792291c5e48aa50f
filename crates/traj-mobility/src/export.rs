//! CSV export and import of the aggregate tables.
//!
//! Two files in one directory:
//! - `transitions.csv`: `segment_from,segment_to,weekday,count,distance_sum,duration_sum,distance_avg,duration_avg,transition_probability`
//! - `locations.csv`: `segment_id,observed_points,centroid`
//!
//! `weekday` is 0 (Monday) to 6; an empty `transition_probability` means the
//! probability was never built for that row.  Point columns use the
//! `[[lon, lat], …]` text form in degrees.

use std::path::Path;

use csv::Writer;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use traj_core::{CoordinatesUnit, GeoReferenceSystem, SegmentId, weekday_from_index, weekday_index};
use traj_route::codec;

use crate::record::{LocationRecord, TransitionKey, TransitionRecord};
use crate::store::{MemoryStore, ModelStore};
use crate::{MobilityError, MobilityResult};

pub const TRANSITIONS_FILE: &str = "transitions.csv";
pub const LOCATIONS_FILE: &str = "locations.csv";

/// Write both tables of `store` into `dir`, creating it if needed.
pub fn export_csv<S: ModelStore + ?Sized>(store: &S, dir: &Path) -> MobilityResult<()> {
    std::fs::create_dir_all(dir)?;

    let mut transitions = Writer::from_path(dir.join(TRANSITIONS_FILE))?;
    transitions.write_record([
        "segment_from",
        "segment_to",
        "weekday",
        "count",
        "distance_sum",
        "duration_sum",
        "distance_avg",
        "duration_avg",
        "transition_probability",
    ])?;
    let rows = store.transitions()?;
    for t in &rows {
        let r = &t.record;
        transitions.write_record(&[
            r.key.segment_from.0.to_string(),
            r.key.segment_to.0.to_string(),
            weekday_index(r.key.weekday).to_string(),
            r.count.to_string(),
            r.distance_sum.to_string(),
            r.duration_sum.to_string(),
            r.distance_avg().to_string(),
            r.duration_avg().to_string(),
            t.probability.map(|p| p.to_string()).unwrap_or_default(),
        ])?;
    }
    transitions.flush()?;

    let mut locations = Writer::from_path(dir.join(LOCATIONS_FILE))?;
    locations.write_record(["segment_id", "observed_points", "centroid"])?;
    let locs = store.locations()?;
    for l in &locs {
        locations.write_record(&[
            l.segment_id.0.to_string(),
            codec::encode_route(&l.observed_points)?,
            codec::encode_point(&l.centroid)?,
        ])?;
    }
    locations.flush()?;

    log::info!(
        "exported {} transitions and {} locations to {}",
        rows.len(),
        locs.len(),
        dir.display()
    );
    Ok(())
}

#[derive(Deserialize)]
struct TransitionCsvRecord {
    segment_from:           u64,
    segment_to:             u64,
    weekday:                u8,
    count:                  u64,
    distance_sum:           f64,
    duration_sum:           f64,
    transition_probability: Option<f64>,
}

#[derive(Deserialize)]
struct LocationCsvRecord {
    segment_id:      u64,
    observed_points: String,
    centroid:        String,
}

/// Read tables written by [`export_csv`] into a [`MemoryStore`].  The
/// derived average columns are ignored.
pub fn import_csv(dir: &Path) -> MobilityResult<MemoryStore> {
    let mut store = MemoryStore::new();
    let mut probabilities: FxHashMap<TransitionKey, f64> = FxHashMap::default();

    let mut reader = csv::Reader::from_path(dir.join(TRANSITIONS_FILE))?;
    for result in reader.deserialize::<TransitionCsvRecord>() {
        let row = result?;
        let weekday = weekday_from_index(row.weekday).ok_or_else(|| MobilityError::Corrupt {
            table:  "transition",
            reason: format!("weekday {} outside 0..=6", row.weekday),
        })?;
        let key = TransitionKey::new(SegmentId(row.segment_from), SegmentId(row.segment_to), weekday);
        store.put_transition(TransitionRecord {
            key,
            count:        row.count,
            distance_sum: row.distance_sum,
            duration_sum: row.duration_sum,
        })?;
        if let Some(p) = row.transition_probability {
            probabilities.insert(key, p);
        }
    }
    store.replace_probabilities(probabilities)?;

    let mut reader = csv::Reader::from_path(dir.join(LOCATIONS_FILE))?;
    for result in reader.deserialize::<LocationCsvRecord>() {
        let row = result?;
        let (reference, unit) = (GeoReferenceSystem::LatLon, CoordinatesUnit::Degrees);
        store.put_location(LocationRecord::from_parts(
            SegmentId(row.segment_id),
            codec::decode_route(&row.observed_points, reference, unit)?,
            codec::decode_point(&row.centroid, reference, unit)?,
        ))?;
    }

    log::info!(
        "imported {} transitions and {} locations from {}",
        store.transition_count(),
        store.location_count(),
        dir.display()
    );
    Ok(store)
}
