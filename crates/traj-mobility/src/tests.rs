//! Unit tests for traj-mobility.

#[cfg(test)]
mod helpers {
    use std::io;

    use traj_core::{CoordinatesUnit, Point, SegmentId};
    use traj_route::Route;
    use traj_spatial::{Geocoder, Router, ShortestRoute, SpatialError, SpatialResult};

    pub const A: [f64; 2] = [0.0, 0.0];
    pub const A2: [f64; 2] = [0.001, 0.0];
    pub const B: [f64; 2] = [0.01, 0.0];
    pub const C: [f64; 2] = [0.02, 0.0];
    pub const D: [f64; 2] = [0.01, 0.01];
    pub const NOWHERE: [f64; 2] = [5.0, 5.0];

    pub fn deg([lon, lat]: [f64; 2]) -> Point {
        Point::latlon(lon, lat, CoordinatesUnit::Degrees).unwrap()
    }

    pub fn route(coords: &[[f64; 2]]) -> Route {
        Route::from_coords(coords, CoordinatesUnit::Degrees).unwrap()
    }

    /// Exact lookup table: A and A2 → 1, B → 2, C → 3, D → 4.
    pub struct TableGeocoder;

    impl Geocoder for TableGeocoder {
        fn reverse_geocode(&self, point: &Point) -> SpatialResult<SegmentId> {
            let p = point.in_unit(CoordinatesUnit::Degrees)?.coords();
            let table = [(A, 1), (A2, 1), (B, 2), (C, 3), (D, 4)];
            table
                .iter()
                .find(|(q, _)| (q[0] - p[0]).abs() < 1e-9 && (q[1] - p[1]).abs() < 1e-9)
                .map(|(_, id)| SegmentId(*id))
                .ok_or_else(|| SpatialError::NoMatch(point.to_string()))
        }
    }

    /// Maps every point to segment 1.
    pub struct OneSegment;

    impl Geocoder for OneSegment {
        fn reverse_geocode(&self, _: &Point) -> SpatialResult<SegmentId> {
            Ok(SegmentId(1))
        }
    }

    /// `TableGeocoder` whose connection times out when asked about B.
    pub struct TimeoutGeocoder;

    impl Geocoder for TimeoutGeocoder {
        fn reverse_geocode(&self, point: &Point) -> SpatialResult<SegmentId> {
            if *point == deg(B) {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out").into());
            }
            TableGeocoder.reverse_geocode(point)
        }
    }

    /// `TableGeocoder` with segments 2 and 3 renumbered above 2^63.
    pub struct WideIdGeocoder;

    pub const WIDE_B: SegmentId = SegmentId(u64::MAX);
    pub const WIDE_C: SegmentId = SegmentId(1 << 63);

    impl Geocoder for WideIdGeocoder {
        fn reverse_geocode(&self, point: &Point) -> SpatialResult<SegmentId> {
            Ok(match TableGeocoder.reverse_geocode(point)? {
                SegmentId(2) => WIDE_B,
                SegmentId(3) => WIDE_C,
                id => id,
            })
        }
    }

    /// Every leg is 1 km in 60 s.
    pub struct FixedRouter;

    impl Router for FixedRouter {
        fn shortest_route(&self, from: &Point, to: &Point) -> SpatialResult<ShortestRoute> {
            Ok(ShortestRoute {
                distance_m: 1000.0,
                duration_s: 60.0,
                geometry:   Route::from_waypoints([*from, *to])?,
            })
        }
    }

    /// Simulates an unreachable routing service.
    pub struct FailingRouter;

    impl Router for FailingRouter {
        fn shortest_route(&self, _: &Point, _: &Point) -> SpatialResult<ShortestRoute> {
            Err(SpatialError::Unavailable("connection refused".into()))
        }
    }

    /// Socket reset on every request.
    pub struct ResetRouter;

    impl Router for ResetRouter {
        fn shortest_route(&self, _: &Point, _: &Point) -> SpatialResult<ShortestRoute> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"))?
        }
    }

    /// Fails with an error that is not a per-query miss.
    pub struct BrokenRouter;

    impl Router for BrokenRouter {
        fn shortest_route(&self, _: &Point, _: &Point) -> SpatialResult<ShortestRoute> {
            Err(SpatialError::InvalidSpeed(0.0))
        }
    }
}

// ── Records ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod record {
    use traj_core::{CoordinatesUnit, SegmentId, Weekday};

    use super::helpers::deg;
    use crate::{LocationRecord, TransitionKey, TransitionRecord, transition_probabilities};

    #[test]
    fn averages_follow_sums() {
        let key = TransitionKey::new(SegmentId(1), SegmentId(2), Weekday::Mon);
        let mut r = TransitionRecord::first(key, 100.0, 10.0);
        r.observe(300.0, 30.0);
        assert_eq!(r.count, 2);
        assert_eq!(r.distance_avg(), 200.0);
        assert_eq!(r.duration_avg(), 20.0);
    }

    #[test]
    fn probabilities_group_by_origin_and_weekday() {
        let k = |to, day| TransitionKey::new(SegmentId(1), SegmentId(to), day);
        let mut a = TransitionRecord::first(k(2, Weekday::Mon), 1.0, 1.0);
        a.observe(1.0, 1.0);
        a.observe(1.0, 1.0);
        let b = TransitionRecord::first(k(3, Weekday::Mon), 1.0, 1.0);
        let c = TransitionRecord::first(k(2, Weekday::Tue), 1.0, 1.0);

        let p = transition_probabilities([&a, &b, &c]);
        assert_eq!(p[&k(2, Weekday::Mon)], 0.75);
        assert_eq!(p[&k(3, Weekday::Mon)], 0.25);
        assert_eq!(p[&k(2, Weekday::Tue)], 1.0);
    }

    #[test]
    fn centroid_is_mean_of_distinct_points() {
        let mut loc = LocationRecord::first(SegmentId(9), &deg([2.0, 4.0])).unwrap();
        assert_eq!(loc.centroid, deg([2.0, 4.0]));

        assert!(loc.observe(&deg([4.0, 8.0])).unwrap());
        assert_eq!(loc.centroid.coords(), [3.0, 6.0]);
        assert_eq!(loc.observed_points.len(), 2);

        // duplicate: no change
        assert!(!loc.observe(&deg([4.0, 8.0])).unwrap());
        assert_eq!(loc.observed_points.len(), 2);
        assert_eq!(loc.centroid.coords(), [3.0, 6.0]);
    }

    #[test]
    fn locations_store_degrees() {
        let p = deg([10.0, 20.0]).to_radians().unwrap();
        let loc = LocationRecord::first(SegmentId(1), &p).unwrap();
        assert_eq!(loc.centroid.coordinates_unit(), CoordinatesUnit::Degrees);
        assert!((loc.centroid.x_lon() - 10.0).abs() < 1e-9);
        let mut loc = loc;
        let stored = loc.centroid;
        assert!(!loc.observe(&stored).unwrap());
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod model {
    use chrono::{DateTime, Utc};
    use traj_core::{CoordinatesUnit, Point, SegmentId, Weekday, get_distance};
    use traj_route::Route;

    use super::helpers::*;
    use crate::{MemoryStore, MobilityError, MobilityModel, ModelStore};

    fn model<R: traj_spatial::Router>(router: R) -> MobilityModel<TableGeocoder, R, MemoryStore> {
        MobilityModel::new(TableGeocoder, router, MemoryStore::new())
    }

    #[test]
    fn same_route_twice_counts_two() {
        let mut m = model(FixedRouter);
        let r = route(&[A, B, C]);
        for _ in 0..2 {
            let report = m.ingest_route(&r, Weekday::Mon).unwrap();
            assert_eq!(report.pairs_ingested, 2);
            assert_eq!(report.pairs_skipped, 0);
            assert_eq!(report.fallbacks, 0);
        }
        assert_eq!(m.routes_ingested(), 2);

        let t = m.find_transition(SegmentId(1), SegmentId(2), Weekday::Mon).unwrap().unwrap();
        assert_eq!(t.record.count, 2);
        assert_eq!(t.record.distance_sum, 2000.0);
        assert_eq!(t.record.duration_avg(), 60.0);
        assert_eq!(t.probability, None);

        m.finalize_probabilities().unwrap();
        let t = m.find_transition(SegmentId(1), SegmentId(2), Weekday::Mon).unwrap().unwrap();
        assert_eq!(t.probability, Some(1.0));
    }

    #[test]
    fn probabilities_sum_to_one_per_origin() {
        let mut m = model(FixedRouter);
        m.ingest_route(&route(&[A, B]), Weekday::Mon).unwrap();
        m.ingest_route(&route(&[A, B]), Weekday::Mon).unwrap();
        m.ingest_route(&route(&[A, D]), Weekday::Mon).unwrap();
        m.ingest_route(&route(&[A, C]), Weekday::Tue).unwrap();
        m.finalize_probabilities().unwrap();

        let out = m.find_possible_transitions(SegmentId(1), &[], Weekday::Mon).unwrap();
        assert_eq!(out.len(), 2);
        let sum: f64 = out.iter().filter_map(|t| t.probability).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((out[0].probability.unwrap() - 2.0 / 3.0).abs() < 1e-12);

        let tue = m.find_possible_transitions(SegmentId(1), &[], Weekday::Tue).unwrap();
        assert_eq!(tue.len(), 1);
        assert_eq!(tue[0].probability, Some(1.0));
    }

    #[test]
    fn forbidden_targets_are_excluded() {
        let mut m = model(FixedRouter);
        m.ingest_route(&route(&[A, B]), Weekday::Fri).unwrap();
        m.ingest_route(&route(&[A, D]), Weekday::Fri).unwrap();
        let out = m
            .find_possible_transitions(SegmentId(1), &[SegmentId(2)], Weekday::Fri)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key().segment_to, SegmentId(4));
        assert!(m.find_possible_transitions(SegmentId(7), &[], Weekday::Fri).unwrap().is_empty());
    }

    #[test]
    fn last_pair_records_destination() {
        let mut m = model(FixedRouter);
        m.ingest_route(&route(&[A, B, C]), Weekday::Wed).unwrap();
        for id in [1, 2, 3] {
            assert!(m.find_location(SegmentId(id)).unwrap().is_some(), "segment {id}");
        }
        assert_eq!(m.store().location_count(), 3);
    }

    #[test]
    fn distinct_points_on_one_segment_average() {
        let mut m = model(FixedRouter);
        m.ingest_route(&route(&[A, B]), Weekday::Mon).unwrap();
        m.ingest_route(&route(&[A2, B]), Weekday::Mon).unwrap();
        m.ingest_route(&route(&[A, B]), Weekday::Mon).unwrap();

        let loc = m.find_location(SegmentId(1)).unwrap().unwrap();
        assert_eq!(loc.observed_points.len(), 2);
        assert!((loc.centroid.x_lon() - 0.0005).abs() < 1e-12);
        assert_eq!(loc.centroid.y_lat(), 0.0);
        // A and A2 both map to 1, so 1 → 2 was seen three times
        let t = m.find_transition(SegmentId(1), SegmentId(2), Weekday::Mon).unwrap().unwrap();
        assert_eq!(t.record.count, 3);
    }

    #[test]
    fn geocoder_miss_skips_pairs() {
        let mut m = model(FixedRouter);
        let report = m.ingest_route(&route(&[A, NOWHERE, B]), Weekday::Mon).unwrap();
        assert_eq!(report.pairs_ingested, 0);
        assert_eq!(report.pairs_skipped, 2);
        assert_eq!(m.store().transition_count(), 0);

        let report = m.ingest_route(&route(&[A, B, NOWHERE]), Weekday::Mon).unwrap();
        assert_eq!(report.pairs_ingested, 1);
        assert_eq!(report.pairs_skipped, 1);
        // B only appears as the destination of a non-final pair
        assert!(m.find_location(SegmentId(2)).unwrap().is_none());
        assert!(m.find_location(SegmentId(1)).unwrap().is_some());
    }

    #[test]
    fn geocoder_io_failure_skips_pairs() {
        let mut m = MobilityModel::new(TimeoutGeocoder, FixedRouter, MemoryStore::new());
        let report = m.ingest_route(&route(&[A, B, C]), Weekday::Mon).unwrap();
        assert_eq!(report.pairs_ingested, 0);
        assert_eq!(report.pairs_skipped, 2);

        let report = m.ingest_route(&route(&[A, D]), Weekday::Mon).unwrap();
        assert_eq!(report.pairs_ingested, 1);
    }

    #[test]
    fn router_io_failure_falls_back() {
        let mut m = model(ResetRouter);
        let report = m.ingest_route(&route(&[A, B, C]), Weekday::Fri).unwrap();
        assert_eq!(report.pairs_ingested, 2);
        assert_eq!(report.fallbacks, 2);
    }

    #[test]
    fn router_failure_falls_back_to_straight_line() {
        let mut m = model(FailingRouter);
        let report = m.ingest_route(&route(&[A, B]), Weekday::Sat).unwrap();
        assert_eq!(report.fallbacks, 1);
        assert_eq!(report.pairs_ingested, 1);

        let t = m.find_transition(SegmentId(1), SegmentId(2), Weekday::Sat).unwrap().unwrap();
        let expected = get_distance(&deg(A), &deg(B)).unwrap();
        assert!((t.record.distance_sum - expected).abs() < 1e-9);
        // 45 km/h = 12.5 m/s
        assert!((t.record.duration_sum - expected / 12.5).abs() < 1e-9);
    }

    #[test]
    fn fallback_speed_comes_from_config() {
        let config = crate::ModelConfig { fallback_speed_kmh: 90.0, ..Default::default() };
        let mut m = model(FailingRouter).with_config(config);
        m.ingest_route(&route(&[A, B]), Weekday::Sat).unwrap();
        let t = m.find_transition(SegmentId(1), SegmentId(2), Weekday::Sat).unwrap().unwrap();
        assert!((t.record.duration_sum - t.record.distance_sum / 25.0).abs() < 1e-9);
    }

    #[test]
    fn unrecoverable_router_error_aborts() {
        let mut m = model(BrokenRouter);
        let err = m.ingest_route(&route(&[A, B]), Weekday::Sun).unwrap_err();
        assert!(matches!(err, MobilityError::Spatial(_)));
    }

    #[test]
    fn radians_routes_are_converted() {
        let mut m = model(FixedRouter);
        let r = route(&[A, B]).to_radians().unwrap();
        let report = m.ingest_route(&r, Weekday::Thu).unwrap();
        assert_eq!(report.pairs_ingested, 1);
        let loc = m.find_location(SegmentId(2)).unwrap().unwrap();
        assert_eq!(loc.centroid.coordinates_unit(), CoordinatesUnit::Degrees);
    }

    #[test]
    fn cartesian_route_is_rejected() {
        let mut m = model(FixedRouter);
        let r = Route::from_waypoints([Point::cartesian(0.0, 0.0).unwrap(), Point::cartesian(1.0, 1.0).unwrap()])
            .unwrap();
        assert!(matches!(m.ingest_route(&r, Weekday::Mon), Err(MobilityError::Route(_))));
    }

    #[test]
    fn short_routes_ingest_nothing() {
        let mut m = model(FixedRouter);
        assert_eq!(m.ingest_route(&Route::new(), Weekday::Mon).unwrap().pairs_ingested, 0);
        assert_eq!(m.ingest_route(&route(&[A]), Weekday::Mon).unwrap().pairs_ingested, 0);
        assert_eq!(m.store().location_count(), 0);
    }

    #[test]
    fn timed_route_uses_start_weekday() {
        let mut m = model(FixedRouter);
        assert!(matches!(
            m.ingest_timed_route(&route(&[A, B])),
            Err(MobilityError::MissingTimestamps)
        ));

        // 2023-11-14 is a Tuesday
        let t0 = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let t1 = DateTime::<Utc>::from_timestamp(1_700_000_060, 0).unwrap();
        let r = Route::with_timestamps(vec![deg(A), deg(B)], vec![t0, t1]).unwrap();
        m.ingest_timed_route(&r).unwrap();
        assert!(m.find_transition(SegmentId(1), SegmentId(2), Weekday::Tue).unwrap().is_some());
        assert!(m.store().find_transition(&crate::TransitionKey::new(SegmentId(1), SegmentId(2), Weekday::Mon)).unwrap().is_none());
    }
}

// ── MemoryStore ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod store {
    use traj_core::{SegmentId, Weekday};
    use traj_route::Route;

    use super::helpers::*;
    use crate::{MemoryStore, MobilityModel, ModelStore, TransitionKey};

    fn ingest(routes: &[(Route, Weekday)]) -> MemoryStore {
        let mut m = MobilityModel::new(TableGeocoder, FixedRouter, MemoryStore::new());
        for (r, day) in routes {
            m.ingest_route(r, *day).unwrap();
        }
        m.into_store()
    }

    #[test]
    fn merge_is_additive() {
        let mut left = ingest(&[(route(&[A, B]), Weekday::Mon), (route(&[A, D]), Weekday::Mon)]);
        let right = ingest(&[(route(&[A2, B]), Weekday::Mon), (route(&[B, C]), Weekday::Tue)]);
        let both = ingest(&[
            (route(&[A, B]), Weekday::Mon),
            (route(&[A, D]), Weekday::Mon),
            (route(&[A2, B]), Weekday::Mon),
            (route(&[B, C]), Weekday::Tue),
        ]);

        left.rebuild_probabilities().unwrap();
        left.merge(right).unwrap();
        // merged view is stale until rebuilt
        assert!(left.transitions().unwrap().iter().all(|t| t.probability.is_none()));

        let key = TransitionKey::new(SegmentId(1), SegmentId(2), Weekday::Mon);
        assert_eq!(left.find_transition(&key).unwrap().unwrap().record.count, 2);
        assert_eq!(left.transitions().unwrap(), both.transitions().unwrap());
        assert_eq!(
            left.find_location(SegmentId(1)).unwrap().unwrap().observed_points.len(),
            2
        );
    }

    #[test]
    fn listings_are_ordered() {
        let s = ingest(&[(route(&[C, B]), Weekday::Sun), (route(&[A, D]), Weekday::Mon), (route(&[A, B]), Weekday::Mon)]);
        let keys: Vec<_> = s.transitions().unwrap().iter().map(|t| t.key().sort_key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        let ids: Vec<_> = s.locations().unwrap().iter().map(|l| l.segment_id).collect();
        assert_eq!(ids, vec![SegmentId(1), SegmentId(2), SegmentId(3), SegmentId(4)]);
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod config {
    use std::path::PathBuf;

    use crate::{DEFAULT_FALLBACK_SPEED_KMH, MobilityError, ModelConfig};

    #[test]
    fn empty_toml_is_default() {
        let c = ModelConfig::from_toml_str("").unwrap();
        assert_eq!(c, ModelConfig::default());
        assert_eq!(c.fallback_speed_kmh, DEFAULT_FALLBACK_SPEED_KMH);
    }

    #[test]
    fn keys_override_defaults() {
        let c = ModelConfig::from_toml_str(
            "fallback_speed_kmh = 30.0\ndatabase = \"m.db\"\nmax_snap_distance_m = 75.0\n",
        )
        .unwrap();
        assert_eq!(c.fallback_speed_kmh, 30.0);
        assert_eq!(c.database, Some(PathBuf::from("m.db")));
        assert_eq!(c.max_snap_distance_m, Some(75.0));
        assert_eq!(c.export_dir, None);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            ModelConfig::from_toml_str("fallback_speed_kmh = 0.0"),
            Err(MobilityError::Config(_))
        ));
        assert!(matches!(
            ModelConfig::from_toml_str("max_snap_distance_m = -1.0"),
            Err(MobilityError::Config(_))
        ));
        assert!(matches!(ModelConfig::from_toml_str("speed = 3"), Err(MobilityError::Toml(_))));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        std::fs::write(&path, "export_dir = \"out\"\n").unwrap();
        let c = ModelConfig::load(&path).unwrap();
        assert_eq!(c.export_dir, Some(PathBuf::from("out")));
        assert!(matches!(
            ModelConfig::load(&dir.path().join("missing.toml")),
            Err(MobilityError::Io(_))
        ));
    }
}

// ── CSV export ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod export {
    use traj_core::Weekday;

    use super::helpers::*;
    use crate::{MemoryStore, MobilityModel, ModelStore, export_csv, import_csv};

    #[test]
    fn export_then_import_preserves_tables() {
        let mut m = MobilityModel::new(TableGeocoder, FailingRouter, MemoryStore::new());
        m.ingest_route(&route(&[A, B, C]), Weekday::Mon).unwrap();
        m.ingest_route(&route(&[A2, D]), Weekday::Mon).unwrap();
        m.finalize_probabilities().unwrap();
        // seen after the rebuild: exported with an empty probability
        m.ingest_route(&route(&[C, A]), Weekday::Wed).unwrap();

        let dir = tempfile::tempdir().unwrap();
        export_csv(m.store(), dir.path()).unwrap();

        let header = std::fs::read_to_string(dir.path().join("transitions.csv")).unwrap();
        assert!(header.starts_with(
            "segment_from,segment_to,weekday,count,distance_sum,duration_sum,distance_avg,duration_avg,transition_probability"
        ));

        let back = import_csv(dir.path()).unwrap();
        assert_eq!(back.transitions().unwrap(), m.store().transitions().unwrap());
        assert_eq!(back.locations().unwrap(), m.store().locations().unwrap());
    }

    #[test]
    fn imported_locations_keep_exact_points() {
        let mut m = MobilityModel::new(OneSegment, FixedRouter, MemoryStore::new());
        for i in 0..200 {
            let lon = -8.6 + i as f64 * 1.234_567e-5;
            let r = route(&[[lon, 41.15], [lon, 41.15]]).to_radians().unwrap();
            m.ingest_route(&r, Weekday::Mon).unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        export_csv(m.store(), dir.path()).unwrap();

        let mut back = import_csv(dir.path()).unwrap();
        let stored = m.store().find_location(traj_core::SegmentId(1)).unwrap().unwrap();
        for p in stored.observed_points.iter() {
            assert!(!back.upsert_location(traj_core::SegmentId(1), p).unwrap());
        }
        assert_eq!(back.locations().unwrap(), m.store().locations().unwrap());
    }

    #[test]
    fn import_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(import_csv(&dir.path().join("nope")).is_err());
    }
}

// ── SQLite store ──────────────────────────────────────────────────────────────

#[cfg(all(test, feature = "sqlite"))]
mod sqlite {
    use traj_core::{SegmentId, Weekday};
    use traj_route::Route;

    use super::helpers::*;
    use crate::{MemoryStore, MobilityModel, ModelStore, SqliteStore};

    fn batch() -> Vec<(Route, Weekday)> {
        vec![
            (route(&[A, B, C]), Weekday::Mon),
            (route(&[A, B, C]), Weekday::Mon),
            (route(&[A2, D]), Weekday::Mon),
            (route(&[B, NOWHERE, C]), Weekday::Tue),
            (route(&[C, A]), Weekday::Sun),
        ]
    }

    #[test]
    fn matches_memory_store() {
        let mut mem = MobilityModel::new(TableGeocoder, FailingRouter, MemoryStore::new());
        let mut sql = MobilityModel::new(TableGeocoder, FailingRouter, SqliteStore::open_in_memory().unwrap());
        for (r, day) in batch() {
            let a = mem.ingest_route(&r, day).unwrap();
            let b = sql.ingest_route(&r, day).unwrap();
            assert_eq!(a, b);
        }
        mem.finalize_probabilities().unwrap();
        sql.finalize_probabilities().unwrap();

        let (mt, st) = (mem.store().transitions().unwrap(), sql.store().transitions().unwrap());
        assert_eq!(mt.len(), st.len());
        for (a, b) in mt.iter().zip(&st) {
            assert_eq!(a.key(), b.key());
            assert_eq!(a.record.count, b.record.count);
            assert!((a.record.distance_sum - b.record.distance_sum).abs() < 1e-9);
            assert!((a.probability.unwrap() - b.probability.unwrap()).abs() < 1e-12);
        }
        assert_eq!(mem.store().locations().unwrap(), sql.store().locations().unwrap());

        let forbidden = sql
            .find_possible_transitions(SegmentId(1), &[SegmentId(2)], Weekday::Mon)
            .unwrap();
        assert_eq!(forbidden.len(), 1);
        assert_eq!(forbidden[0].key().segment_to, SegmentId(4));
    }

    #[test]
    fn model_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            let mut m = MobilityModel::new(TableGeocoder, FixedRouter, store);
            m.ingest_route(&route(&[A, B, C]), Weekday::Mon).unwrap();
            m.finalize_probabilities().unwrap();
            m.store().checkpoint().unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let mut m = MobilityModel::new(TableGeocoder, FixedRouter, store);
        m.ingest_route(&route(&[A, B, C]), Weekday::Mon).unwrap();

        let t = m.find_transition(SegmentId(1), SegmentId(2), Weekday::Mon).unwrap().unwrap();
        assert_eq!(t.record.count, 2);
        // stale until rebuilt, but still present
        assert_eq!(t.probability, Some(1.0));
        m.ingest_route(&route(&[A, D]), Weekday::Mon).unwrap();
        let new = m.find_transition(SegmentId(1), SegmentId(4), Weekday::Mon).unwrap().unwrap();
        assert_eq!(new.probability, None);

        m.finalize_probabilities().unwrap();
        let t = m.find_transition(SegmentId(1), SegmentId(2), Weekday::Mon).unwrap().unwrap();
        assert!((t.probability.unwrap() - 2.0 / 3.0).abs() < 1e-12);

        let loc = m.find_location(SegmentId(3)).unwrap().unwrap();
        assert_eq!(loc.observed_points.len(), 1);
        assert_eq!(loc.centroid, deg(C));
    }

    /// Radians input converted to degrees lands on floats whose shortest
    /// text form must parse back to the same bits for the duplicate check.
    fn radians_routes(n: usize) -> Vec<Route> {
        (0..n)
            .map(|i| {
                let lon = -8.6 + i as f64 * 1.234_567e-5;
                let lat = 41.15 + i as f64 * 3.086_42e-5;
                route(&[[lon, lat], [lon, lat]]).to_radians().unwrap()
            })
            .collect()
    }

    #[test]
    fn stored_points_stay_deduplicated() {
        let routes = radians_routes(300);
        let mut mem = MobilityModel::new(OneSegment, FixedRouter, MemoryStore::new());
        let mut sql = MobilityModel::new(OneSegment, FixedRouter, SqliteStore::open_in_memory().unwrap());
        for r in routes.iter().chain(&routes) {
            mem.ingest_route(r, Weekday::Wed).unwrap();
            sql.ingest_route(r, Weekday::Wed).unwrap();
        }

        let loc = sql.find_location(SegmentId(1)).unwrap().unwrap();
        assert_eq!(loc.observed_points.len(), routes.len());
        assert_eq!(Some(loc), mem.find_location(SegmentId(1)).unwrap());

        // one more pass changes nothing
        let before = sql.find_location(SegmentId(1)).unwrap();
        sql.ingest_route(&routes[0], Weekday::Wed).unwrap();
        assert_eq!(sql.find_location(SegmentId(1)).unwrap(), before);
    }

    #[test]
    fn wide_ids_order_like_memory_store() {
        let mut mem = MobilityModel::new(WideIdGeocoder, FixedRouter, MemoryStore::new());
        let mut sql = MobilityModel::new(WideIdGeocoder, FixedRouter, SqliteStore::open_in_memory().unwrap());
        for r in [route(&[A, B, C]), route(&[A, D]), route(&[C, A])] {
            mem.ingest_route(&r, Weekday::Mon).unwrap();
            sql.ingest_route(&r, Weekday::Mon).unwrap();
        }
        mem.finalize_probabilities().unwrap();
        sql.finalize_probabilities().unwrap();

        let keys = |ts: Vec<crate::Transition>| ts.iter().map(|t| t.key().sort_key()).collect::<Vec<_>>();
        let st = keys(sql.store().transitions().unwrap());
        assert_eq!(st, keys(mem.store().transitions().unwrap()));
        assert_eq!(st.first().map(|k| k.0), Some(SegmentId(1)));

        let ids = |ls: Vec<crate::LocationRecord>| ls.iter().map(|l| l.segment_id).collect::<Vec<_>>();
        assert_eq!(ids(sql.store().locations().unwrap()), vec![SegmentId(1), SegmentId(4), WIDE_C, WIDE_B]);

        let out = sql.find_possible_transitions(SegmentId(1), &[], Weekday::Mon).unwrap();
        let targets: Vec<_> = out.iter().map(|t| t.key().segment_to).collect();
        assert_eq!(targets, vec![SegmentId(4), WIDE_B]);
    }

    #[test]
    fn averages_are_generated_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.db");
        {
            let mut m = MobilityModel::new(TableGeocoder, FixedRouter, SqliteStore::open(&path).unwrap());
            m.ingest_route(&route(&[A, B]), Weekday::Mon).unwrap();
            m.ingest_route(&route(&[A, B]), Weekday::Mon).unwrap();
            m.store().checkpoint().unwrap();
        }
        let conn = rusqlite::Connection::open(&path).unwrap();
        let (avg_d, avg_t): (f64, f64) = conn
            .query_row(
                "SELECT distance_avg, duration_avg FROM transition WHERE segment_from = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(avg_d, 1000.0);
        assert_eq!(avg_t, 60.0);
    }
}

// ── Parallel ingestion ────────────────────────────────────────────────────────

#[cfg(all(test, feature = "parallel"))]
mod parallel {
    use traj_core::Weekday;

    use super::helpers::*;
    use crate::{MemoryStore, MobilityModel, ModelConfig, ModelStore, ingest_partitioned};

    #[test]
    fn partitions_match_sequential() {
        let batch = vec![
            (route(&[A, B, C]), Weekday::Mon),
            (route(&[A, D]), Weekday::Tue),
            (route(&[A, B]), Weekday::Mon),
            (route(&[C, NOWHERE]), Weekday::Sat),
            (route(&[B, C]), Weekday::Tue),
        ];

        let (store, report) =
            ingest_partitioned(&TableGeocoder, &FixedRouter, &ModelConfig::default(), &batch).unwrap();

        let mut seq = MobilityModel::new(TableGeocoder, FixedRouter, MemoryStore::new());
        for (r, day) in &batch {
            seq.ingest_route(r, *day).unwrap();
        }
        seq.finalize_probabilities().unwrap();

        assert_eq!(report.pairs_ingested, 5);
        assert_eq!(report.pairs_skipped, 1);
        assert_eq!(store.transitions().unwrap(), seq.store().transitions().unwrap());
        assert_eq!(store.location_count(), seq.store().location_count());
    }
}
