//! Storage of the aggregate tables.
//!
//! [`ModelStore`] is the seam between the aggregator and its persistence.
//! Backends provide keyed reads and writes; the upsert, probability rebuild
//! and candidate query have default implementations on top of those that a
//! backend may replace with native equivalents (see `SqliteStore`).
//!
//! Probabilities are a rebuildable view: upserts leave them untouched, so
//! they reflect the data as of the last rebuild and a transition first seen
//! afterwards reports `None`.

use rustc_hash::FxHashMap;

use traj_core::{Point, SegmentId, Weekday};

use crate::record::{
    LocationRecord, Transition, TransitionKey, TransitionRecord, transition_probabilities,
};
use crate::MobilityResult;

// ── ModelStore trait ──────────────────────────────────────────────────────────

/// Keyed storage for transitions, probabilities and locations.
pub trait ModelStore {
    fn find_transition(&self, key: &TransitionKey) -> MobilityResult<Option<Transition>>;

    /// Insert or overwrite the record stored under `record.key`.
    fn put_transition(&mut self, record: TransitionRecord) -> MobilityResult<()>;

    fn find_location(&self, segment_id: SegmentId) -> MobilityResult<Option<LocationRecord>>;

    /// Insert or overwrite the record stored under `record.segment_id`.
    fn put_location(&mut self, record: LocationRecord) -> MobilityResult<()>;

    /// Every transition, ordered by [`TransitionKey::sort_key`].
    fn transitions(&self) -> MobilityResult<Vec<Transition>>;

    /// Every location, ordered by segment id.
    fn locations(&self) -> MobilityResult<Vec<LocationRecord>>;

    /// Drop the probability view and replace it with `probabilities`.
    fn replace_probabilities(
        &mut self,
        probabilities: FxHashMap<TransitionKey, f64>,
    ) -> MobilityResult<()>;

    // ── Provided ──────────────────────────────────────────────────────────

    /// Count one observation of `key`, creating the row on first sight.
    fn upsert_transition(
        &mut self,
        key: TransitionKey,
        distance_m: f64,
        duration_s: f64,
    ) -> MobilityResult<()> {
        let record = match self.find_transition(&key)? {
            Some(existing) => {
                let mut r = existing.record;
                r.observe(distance_m, duration_s);
                r
            }
            None => TransitionRecord::first(key, distance_m, duration_s),
        };
        self.put_transition(record)
    }

    /// Record `point` against `segment_id`.  Returns `true` if the location
    /// changed (new segment or new distinct point).
    fn upsert_location(&mut self, segment_id: SegmentId, point: &Point) -> MobilityResult<bool> {
        match self.find_location(segment_id)? {
            Some(mut existing) => {
                if !existing.observe(point)? {
                    return Ok(false);
                }
                self.put_location(existing)?;
            }
            None => self.put_location(LocationRecord::first(segment_id, point)?)?,
        }
        Ok(true)
    }

    /// Recompute every probability from the transitions table.
    fn rebuild_probabilities(&mut self) -> MobilityResult<()> {
        let records: Vec<TransitionRecord> =
            self.transitions()?.into_iter().map(|t| t.record).collect();
        self.replace_probabilities(transition_probabilities(&records))
    }

    /// Transitions leaving `segment_from` on `weekday`, excluding any whose
    /// destination is in `forbidden`, ordered by destination.
    fn find_possible_transitions(
        &self,
        segment_from: SegmentId,
        forbidden: &[SegmentId],
        weekday: Weekday,
    ) -> MobilityResult<Vec<Transition>> {
        Ok(self
            .transitions()?
            .into_iter()
            .filter(|t| {
                let k = t.key();
                k.segment_from == segment_from
                    && k.weekday == weekday
                    && !forbidden.contains(&k.segment_to)
            })
            .collect())
    }
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

/// In-process store backed by hash maps.
///
/// Used for tests, for CSV import, and as the per-partition store of
/// parallel ingestion; stores merge additively with [`MemoryStore::merge`].
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    transitions:   FxHashMap<TransitionKey, TransitionRecord>,
    probabilities: FxHashMap<TransitionKey, f64>,
    locations:     FxHashMap<SegmentId, LocationRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    /// Fold `other` into `self`: counts and sums add, observed points union.
    /// The probability view is cleared; rebuild it after merging.
    pub fn merge(&mut self, other: MemoryStore) -> MobilityResult<()> {
        for (key, record) in other.transitions {
            self.transitions
                .entry(key)
                .and_modify(|r| r.absorb(&record))
                .or_insert(record);
        }
        for (id, location) in other.locations {
            match self.locations.get_mut(&id) {
                Some(existing) => existing.absorb(&location)?,
                None => {
                    self.locations.insert(id, location);
                }
            }
        }
        self.probabilities.clear();
        Ok(())
    }

    fn with_probability(&self, record: &TransitionRecord) -> Transition {
        Transition {
            record:      *record,
            probability: self.probabilities.get(&record.key).copied(),
        }
    }
}

impl ModelStore for MemoryStore {
    fn find_transition(&self, key: &TransitionKey) -> MobilityResult<Option<Transition>> {
        Ok(self.transitions.get(key).map(|r| self.with_probability(r)))
    }

    fn put_transition(&mut self, record: TransitionRecord) -> MobilityResult<()> {
        self.transitions.insert(record.key, record);
        Ok(())
    }

    fn find_location(&self, segment_id: SegmentId) -> MobilityResult<Option<LocationRecord>> {
        Ok(self.locations.get(&segment_id).cloned())
    }

    fn put_location(&mut self, record: LocationRecord) -> MobilityResult<()> {
        self.locations.insert(record.segment_id, record);
        Ok(())
    }

    fn transitions(&self) -> MobilityResult<Vec<Transition>> {
        let mut out: Vec<Transition> =
            self.transitions.values().map(|r| self.with_probability(r)).collect();
        out.sort_by_key(|t| t.key().sort_key());
        Ok(out)
    }

    fn locations(&self) -> MobilityResult<Vec<LocationRecord>> {
        let mut out: Vec<LocationRecord> = self.locations.values().cloned().collect();
        out.sort_by_key(|l| l.segment_id);
        Ok(out)
    }

    fn replace_probabilities(
        &mut self,
        probabilities: FxHashMap<TransitionKey, f64>,
    ) -> MobilityResult<()> {
        self.probabilities = probabilities;
        Ok(())
    }
}
