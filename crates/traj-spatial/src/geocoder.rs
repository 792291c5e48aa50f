//! Reverse geocoding: point → road segment.
//!
//! # Segment index
//!
//! [`SegmentIndex`] holds one or more anchor points per segment in an R-tree
//! (via `rstar`) keyed on `[lon, lat]` degrees and answers with the segment
//! of the nearest anchor.  Nearest-anchor search uses planar distance in
//! degree space, which ranks correctly within a city; the optional snap
//! threshold is then checked with the haversine distance.
//!
//! # CSV format
//!
//! ```csv
//! segment_id,lon,lat
//! 4242,-8.6110,41.1470
//! 4242,-8.6102,41.1475
//! 977,-8.6000,41.1600
//! ```

use std::io::Read;
use std::path::Path;

use rstar::{AABB, PointDistance, RTree, RTreeObject};
use serde::Deserialize;

use traj_core::{CoordinatesUnit, Point, SegmentId, get_distance};

use crate::{SpatialError, SpatialResult};

// ── Geocoder trait ────────────────────────────────────────────────────────────

/// Reverse-geocoding collaborator.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync` so one geocoder can serve parallel
/// ingestion partitions.
pub trait Geocoder: Send + Sync {
    /// Segment under `point` (latlon).  A failed lookup should be reported as
    /// [`SpatialError::NoMatch`] or [`SpatialError::Unavailable`] so callers
    /// can skip it.
    fn reverse_geocode(&self, point: &Point) -> SpatialResult<SegmentId>;
}

impl<G: Geocoder + ?Sized> Geocoder for &G {
    fn reverse_geocode(&self, point: &Point) -> SpatialResult<SegmentId> {
        (**self).reverse_geocode(point)
    }
}

// ── R-tree entry ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct AnchorEntry {
    point: [f64; 2], // [lon, lat] degrees
    id:    SegmentId,
}

impl RTreeObject for AnchorEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for AnchorEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlon = self.point[0] - point[0];
        let dlat = self.point[1] - point[1];
        dlon * dlon + dlat * dlat
    }
}

// ── SegmentIndex ──────────────────────────────────────────────────────────────

/// Immutable nearest-anchor reverse geocoder.
#[derive(Debug)]
pub struct SegmentIndex {
    tree:       RTree<AnchorEntry>,
    max_snap_m: Option<f64>,
}

impl SegmentIndex {
    pub fn builder() -> SegmentIndexBuilder {
        SegmentIndexBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn max_snap_m(&self) -> Option<f64> {
        self.max_snap_m
    }

    /// Reject matches farther than `metres` from the queried point.
    pub fn with_max_snap_m(mut self, metres: Option<f64>) -> Self {
        self.max_snap_m = metres;
        self
    }

    /// Nearest anchor's segment and its haversine distance in metres.
    /// `None` only if the index is empty.
    pub fn nearest(&self, point: &Point) -> SpatialResult<Option<(SegmentId, f64)>> {
        let query = point.in_unit(CoordinatesUnit::Degrees)?;
        let Some(entry) = self.tree.nearest_neighbor(&query.coords()) else {
            return Ok(None);
        };
        let anchor = Point::latlon(entry.point[0], entry.point[1], CoordinatesUnit::Degrees)?;
        Ok(Some((entry.id, get_distance(&query, &anchor)?)))
    }
}

impl Geocoder for SegmentIndex {
    fn reverse_geocode(&self, point: &Point) -> SpatialResult<SegmentId> {
        match self.nearest(point)? {
            None => Err(SpatialError::NoMatch(format!("{point} (empty segment index)"))),
            Some((_, metres)) if self.max_snap_m.is_some_and(|max| metres > max) => {
                Err(SpatialError::NoMatch(format!("{point} (nearest anchor {metres:.0} m away)")))
            }
            Some((id, _)) => Ok(id),
        }
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Collects anchors, then bulk-loads the R-tree.
#[derive(Debug, Default)]
pub struct SegmentIndexBuilder {
    anchors:    Vec<AnchorEntry>,
    max_snap_m: Option<f64>,
}

impl SegmentIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an anchor for `id`.  `point` must be latlon; it is stored in
    /// degrees.
    pub fn add_anchor(&mut self, id: SegmentId, point: &Point) -> SpatialResult<&mut Self> {
        let p = point.in_unit(CoordinatesUnit::Degrees)?;
        self.anchors.push(AnchorEntry { point: p.coords(), id });
        Ok(self)
    }

    pub fn max_snap_m(&mut self, metres: Option<f64>) -> &mut Self {
        self.max_snap_m = metres;
        self
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// O(N log N) bulk load.
    pub fn build(self) -> SegmentIndex {
        SegmentIndex {
            tree:       RTree::bulk_load(self.anchors),
            max_snap_m: self.max_snap_m,
        }
    }
}

// ── CSV loading ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SegmentRecord {
    segment_id: u64,
    lon:        f64,
    lat:        f64,
}

/// Load a [`SegmentIndex`] from a `segment_id,lon,lat` CSV file.
pub fn load_segments_csv(path: &Path) -> SpatialResult<SegmentIndex> {
    let file = std::fs::File::open(path).map_err(SpatialError::Io)?;
    load_segments_reader(file)
}

/// Like [`load_segments_csv`] but accepts any `Read` source.
pub fn load_segments_reader<R: Read>(reader: R) -> SpatialResult<SegmentIndex> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut builder = SegmentIndexBuilder::new();

    for result in csv_reader.deserialize::<SegmentRecord>() {
        let row = result.map_err(|e| SpatialError::Parse(e.to_string()))?;
        let point = Point::latlon(row.lon, row.lat, CoordinatesUnit::Degrees)?;
        builder.add_anchor(SegmentId(row.segment_id), &point)?;
    }

    log::debug!("loaded {} segment anchors", builder.anchor_count());
    Ok(builder.build())
}
