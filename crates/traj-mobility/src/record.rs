//! Aggregate rows of the mobility model.
//!
//! | Table        | Key                                   | Payload                              |
//! |--------------|---------------------------------------|--------------------------------------|
//! | transitions  | `(segment_from, segment_to, weekday)` | count, distance and duration sums    |
//! | probability  | transition key                        | `count / Σcount` per `(from, weekday)` |
//! | locations    | `segment_id`                          | distinct observed points, centroid   |
//!
//! Location points are latlon degrees.

use rustc_hash::FxHashMap;

use traj_core::{CoordinatesUnit, Point, SegmentId, Weekday, weekday_index};
use traj_route::Route;

use crate::{MobilityError, MobilityResult};

// ── Transitions ───────────────────────────────────────────────────────────────

/// Key of the transitions table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransitionKey {
    pub segment_from: SegmentId,
    pub segment_to:   SegmentId,
    pub weekday:      Weekday,
}

impl TransitionKey {
    pub fn new(segment_from: SegmentId, segment_to: SegmentId, weekday: Weekday) -> Self {
        Self { segment_from, segment_to, weekday }
    }

    /// Stable ordering: origin, weekday (Monday first), destination.
    pub fn sort_key(&self) -> (SegmentId, u8, SegmentId) {
        (self.segment_from, weekday_index(self.weekday), self.segment_to)
    }
}

/// Accumulated observations of one transition.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TransitionRecord {
    pub key:          TransitionKey,
    pub count:        u64,
    pub distance_sum: f64,
    pub duration_sum: f64,
}

impl TransitionRecord {
    /// A transition seen once.
    pub fn first(key: TransitionKey, distance_m: f64, duration_s: f64) -> Self {
        Self { key, count: 1, distance_sum: distance_m, duration_sum: duration_s }
    }

    pub fn observe(&mut self, distance_m: f64, duration_s: f64) {
        self.count += 1;
        self.distance_sum += distance_m;
        self.duration_sum += duration_s;
    }

    /// Fold another record for the same key into this one.
    pub fn absorb(&mut self, other: &TransitionRecord) {
        debug_assert_eq!(self.key, other.key);
        self.count += other.count;
        self.distance_sum += other.distance_sum;
        self.duration_sum += other.duration_sum;
    }

    pub fn distance_avg(&self) -> f64 {
        self.distance_sum / self.count as f64
    }

    pub fn duration_avg(&self) -> f64 {
        self.duration_sum / self.count as f64
    }
}

/// A transition as returned by queries: the record plus its probability,
/// `None` until probabilities have been built for it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transition {
    pub record:      TransitionRecord,
    pub probability: Option<f64>,
}

impl Transition {
    #[inline]
    pub fn key(&self) -> TransitionKey {
        self.record.key
    }
}

/// `count / Σcount` for every record, grouped by `(segment_from, weekday)`.
pub fn transition_probabilities<'a>(
    records: impl IntoIterator<Item = &'a TransitionRecord>,
) -> FxHashMap<TransitionKey, f64> {
    let records: Vec<&TransitionRecord> = records.into_iter().collect();

    let mut totals: FxHashMap<(SegmentId, Weekday), u64> = FxHashMap::default();
    for r in &records {
        *totals.entry((r.key.segment_from, r.key.weekday)).or_default() += r.count;
    }

    records
        .into_iter()
        .map(|r| {
            let total = totals[&(r.key.segment_from, r.key.weekday)];
            (r.key, r.count as f64 / total as f64)
        })
        .collect()
}

// ── Locations ─────────────────────────────────────────────────────────────────

/// Distinct points observed on one segment and their mean.
#[derive(Clone, Debug, PartialEq)]
pub struct LocationRecord {
    pub segment_id:      SegmentId,
    pub observed_points: Route,
    pub centroid:        Point,
}

impl LocationRecord {
    /// A location seen at a single point.
    pub fn first(segment_id: SegmentId, point: &Point) -> MobilityResult<Self> {
        let point = point.in_unit(CoordinatesUnit::Degrees)?;
        Ok(Self {
            segment_id,
            observed_points: Route::from_waypoints([point])?,
            centroid:        point,
        })
    }

    /// Rebuild from persisted parts, recomputing nothing.
    pub fn from_parts(segment_id: SegmentId, observed_points: Route, centroid: Point) -> Self {
        Self { segment_id, observed_points, centroid }
    }

    /// Add `point` if it is not already among the observed points (exact
    /// equality) and recompute the centroid.  Returns `true` if it was added.
    pub fn observe(&mut self, point: &Point) -> MobilityResult<bool> {
        let point = point.in_unit(CoordinatesUnit::Degrees)?;
        if self.observed_points.iter().any(|p| *p == point) {
            return Ok(false);
        }
        self.observed_points.append(point)?;
        self.centroid = self.observed_points.get_average_point().ok_or_else(|| {
            MobilityError::Corrupt {
                table:  "location",
                reason: format!("segment {} has no observed points", self.segment_id),
            }
        })?;
        Ok(true)
    }

    /// Union `other`'s points into this record.
    pub fn absorb(&mut self, other: &LocationRecord) -> MobilityResult<()> {
        for p in other.observed_points.iter() {
            self.observe(p)?;
        }
        Ok(())
    }
}
