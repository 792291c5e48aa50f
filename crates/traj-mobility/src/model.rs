//! The aggregator: routes in, transition and location tables out.

use std::ops::AddAssign;

use chrono::Datelike;

use traj_core::{CoordinatesUnit, Point, SegmentId, Weekday};
use traj_route::Route;
use traj_spatial::{Geocoder, Router, ShortestRoute, straight_line};

use crate::config::ModelConfig;
use crate::record::{LocationRecord, Transition, TransitionKey};
use crate::store::ModelStore;
use crate::{MobilityError, MobilityResult};

// ── IngestReport ──────────────────────────────────────────────────────────────

/// Outcome of ingesting one or more routes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Pairs recorded in the transitions table.
    pub pairs_ingested: usize,
    /// Pairs dropped because a point could not be geocoded.
    pub pairs_skipped:  usize,
    /// Recorded pairs whose leg came from the straight-line fallback.
    pub fallbacks:      usize,
}

impl AddAssign for IngestReport {
    fn add_assign(&mut self, other: IngestReport) {
        self.pairs_ingested += other.pairs_ingested;
        self.pairs_skipped += other.pairs_skipped;
        self.fallbacks += other.fallbacks;
    }
}

// ── MobilityModel ─────────────────────────────────────────────────────────────

/// Builds the mobility model from routes using a geocoder `G`, a router `R`
/// and a store `S`.
///
/// Per consecutive point pair of an ingested route:
///
/// 1. both points are reverse geocoded to segments;
/// 2. the leg's distance and duration come from the router, or from the
///    great-circle distance at `fallback_speed_kmh` if the router reports a
///    recoverable failure;
/// 3. the `(from, to, weekday)` transition is counted;
/// 4. the first point is recorded at its segment's location, and for the
///    last pair the second point too.
///
/// A recoverable geocoder failure skips the pairs touching that point.
/// Non-recoverable collaborator errors and store errors abort the call.
pub struct MobilityModel<G, R, S> {
    geocoder:        G,
    router:          R,
    store:           S,
    config:          ModelConfig,
    routes_ingested: u64,
}

impl<G: Geocoder, R: Router, S: ModelStore> MobilityModel<G, R, S> {
    pub fn new(geocoder: G, router: R, store: S) -> Self {
        Self {
            geocoder,
            router,
            store,
            config: ModelConfig::default(),
            routes_ingested: 0,
        }
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Routes passed to [`ingest_route`](Self::ingest_route) so far.
    pub fn routes_ingested(&self) -> u64 {
        self.routes_ingested
    }

    // ── Ingestion ─────────────────────────────────────────────────────────

    /// Fold `route` into the model under `weekday`.
    ///
    /// # Errors
    ///
    /// The route is not latlon, a collaborator fails non-recoverably, or the
    /// store fails.  Pairs already written stay written.
    pub fn ingest_route(&mut self, route: &Route, weekday: Weekday) -> MobilityResult<IngestReport> {
        let route = route.in_unit(CoordinatesUnit::Degrees)?;
        let points: Vec<Point> = route.iter().copied().collect();
        let segments = points
            .iter()
            .map(|p| self.resolve_segment(p))
            .collect::<MobilityResult<Vec<_>>>()?;

        let mut report = IngestReport::default();
        let last_pair = points.len().saturating_sub(2);

        for i in 0..points.len().saturating_sub(1) {
            let (Some(from), Some(to)) = (segments[i], segments[i + 1]) else {
                report.pairs_skipped += 1;
                continue;
            };
            let (a, b) = (&points[i], &points[i + 1]);

            let (leg, fallback) = self.resolve_leg(a, b)?;
            if fallback {
                report.fallbacks += 1;
            }

            self.store
                .upsert_transition(TransitionKey::new(from, to, weekday), leg.distance_m, leg.duration_s)?;
            self.store.upsert_location(from, a)?;
            if i == last_pair {
                self.store.upsert_location(to, b)?;
            }
            report.pairs_ingested += 1;
        }

        self.routes_ingested += 1;
        log::debug!(
            "ingested route of {} points on {weekday:?}: {} pairs, {} skipped, {} fallbacks",
            points.len(),
            report.pairs_ingested,
            report.pairs_skipped,
            report.fallbacks
        );
        Ok(report)
    }

    /// [`ingest_route`](Self::ingest_route) on the weekday (UTC) of the
    /// route's first timestamp.
    pub fn ingest_timed_route(&mut self, route: &Route) -> MobilityResult<IngestReport> {
        let start = route.start_time().ok_or(MobilityError::MissingTimestamps)?;
        self.ingest_route(route, start.weekday())
    }

    /// Rebuild every transition probability from the current counts.  Call
    /// after ingesting; queries report the probabilities of the last build.
    pub fn finalize_probabilities(&mut self) -> MobilityResult<()> {
        self.store.rebuild_probabilities()?;
        log::info!("transition probabilities rebuilt after {} routes", self.routes_ingested);
        Ok(())
    }

    fn resolve_segment(&self, point: &Point) -> MobilityResult<Option<SegmentId>> {
        match self.geocoder.reverse_geocode(point) {
            Ok(id) => Ok(Some(id)),
            Err(e) if e.is_recoverable() => {
                log::warn!("ingest_route: skipping point {point}: {e}");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Router answer, or the straight-line estimate flagged `true`.
    fn resolve_leg(&self, a: &Point, b: &Point) -> MobilityResult<(ShortestRoute, bool)> {
        match self.router.shortest_route(a, b) {
            Ok(leg) => Ok((leg, false)),
            Err(e) if e.is_recoverable() => {
                log::warn!(
                    "ingest_route: routing {a} -> {b} failed ({e}), assuming {} km/h straight line",
                    self.config.fallback_speed_kmh
                );
                Ok((straight_line(a, b, self.config.fallback_speed_kmh)?, true))
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn find_transition(
        &self,
        segment_from: SegmentId,
        segment_to: SegmentId,
        weekday: Weekday,
    ) -> MobilityResult<Option<Transition>> {
        self.store
            .find_transition(&TransitionKey::new(segment_from, segment_to, weekday))
    }

    pub fn find_possible_transitions(
        &self,
        segment_from: SegmentId,
        forbidden_targets: &[SegmentId],
        weekday: Weekday,
    ) -> MobilityResult<Vec<Transition>> {
        self.store
            .find_possible_transitions(segment_from, forbidden_targets, weekday)
    }

    pub fn find_location(&self, segment_id: SegmentId) -> MobilityResult<Option<LocationRecord>> {
        self.store.find_location(segment_id)
    }
}
