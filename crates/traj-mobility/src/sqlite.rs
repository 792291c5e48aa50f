//! SQLite model store (feature `sqlite`).
//!
//! Three tables: `transition` (with generated average columns and a unique
//! key), `transition_probability` (dropped and rebuilt on finalize) and
//! `location` (points as `[[lon, lat], …]` text in degrees).  The upsert and
//! the probability rebuild each run as a single SQL statement.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use rustc_hash::FxHashMap;

use traj_core::{
    CoordinatesUnit, GeoReferenceSystem, SegmentId, Weekday, weekday_from_index, weekday_index,
};
use traj_route::codec;

use crate::record::{LocationRecord, Transition, TransitionKey, TransitionRecord};
use crate::store::ModelStore;
use crate::{MobilityError, MobilityResult};

const SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous  = NORMAL;
    CREATE TABLE IF NOT EXISTS transition (
        transition_id INTEGER PRIMARY KEY,
        segment_from  INTEGER NOT NULL,
        segment_to    INTEGER NOT NULL,
        weekday       INTEGER NOT NULL,
        count         INTEGER NOT NULL,
        distance_sum  REAL    NOT NULL,
        duration_sum  REAL    NOT NULL,
        distance_avg  REAL GENERATED ALWAYS AS (distance_sum / count) STORED,
        duration_avg  REAL GENERATED ALWAYS AS (duration_sum / count) STORED,
        UNIQUE (segment_from, segment_to, weekday)
    );
    CREATE TABLE IF NOT EXISTS transition_probability (
        transition_id INTEGER PRIMARY KEY,
        probability   REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS location (
        segment_id      INTEGER PRIMARY KEY,
        observed_points TEXT NOT NULL,
        centroid        TEXT NOT NULL
    );";

const REBUILD_PROBABILITIES: &str = "
    DROP TABLE IF EXISTS transition_probability;
    CREATE TABLE transition_probability (
        transition_id INTEGER PRIMARY KEY,
        probability   REAL NOT NULL
    );
    INSERT INTO transition_probability (transition_id, probability)
    SELECT t.transition_id, CAST(t.count AS REAL) / g.total
    FROM transition t
    JOIN (SELECT segment_from, weekday, SUM(count) AS total
          FROM transition
          GROUP BY segment_from, weekday) g
      ON g.segment_from = t.segment_from AND g.weekday = t.weekday;";

const SELECT_TRANSITIONS: &str = "
    SELECT t.segment_from, t.segment_to, t.weekday,
           t.count, t.distance_sum, t.duration_sum, p.probability
    FROM transition t
    LEFT JOIN transition_probability p ON p.transition_id = t.transition_id";

/// Column tuple of [`SELECT_TRANSITIONS`].
type RawTransition = (i64, i64, i64, i64, f64, f64, Option<f64>);

fn raw_transition(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTransition> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn weekday_from_sql(n: i64) -> MobilityResult<Weekday> {
    u8::try_from(n)
        .ok()
        .and_then(weekday_from_index)
        .ok_or_else(|| MobilityError::Corrupt {
            table:  "transition",
            reason: format!("weekday {n} outside 0..=6"),
        })
}

fn transition_from_raw(raw: RawTransition) -> MobilityResult<Transition> {
    let (from, to, weekday, count, distance_sum, duration_sum, probability) = raw;
    let count = u64::try_from(count).map_err(|_| MobilityError::Corrupt {
        table:  "transition",
        reason: format!("negative count {count}"),
    })?;
    Ok(Transition {
        record: TransitionRecord {
            key: TransitionKey::new(
                SegmentId::from_sql(from),
                SegmentId::from_sql(to),
                weekday_from_sql(weekday)?,
            ),
            count,
            distance_sum,
            duration_sum,
        },
        probability,
    })
}

fn location_from_raw(segment_id: i64, points: &str, centroid: &str) -> MobilityResult<LocationRecord> {
    let reference = GeoReferenceSystem::LatLon;
    let unit = CoordinatesUnit::Degrees;
    Ok(LocationRecord::from_parts(
        SegmentId::from_sql(segment_id),
        codec::decode_route(points, reference, unit)?,
        codec::decode_point(centroid, reference, unit)?,
    ))
}

// ── SqliteStore ───────────────────────────────────────────────────────────────

/// [`ModelStore`] persisted in a SQLite database file.
///
/// Reopening the same file continues the model where the last session left
/// it.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and initialise the schema.
    pub fn open(path: &Path) -> MobilityResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Private in-memory database; contents vanish on drop.
    pub fn open_in_memory() -> MobilityResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> MobilityResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn query_transitions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> MobilityResult<Vec<Transition>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let raws = stmt
            .query_map(params, raw_transition)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(transition_from_raw).collect()
    }

    /// Flush the write-ahead log into the main database file.
    pub fn checkpoint(&self) -> MobilityResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

impl ModelStore for SqliteStore {
    fn find_transition(&self, key: &TransitionKey) -> MobilityResult<Option<Transition>> {
        let sql = format!(
            "{SELECT_TRANSITIONS} WHERE t.segment_from = ?1 AND t.segment_to = ?2 AND t.weekday = ?3"
        );
        let raw = self
            .conn
            .prepare_cached(&sql)?
            .query_row(
                rusqlite::params![
                    key.segment_from.to_sql(),
                    key.segment_to.to_sql(),
                    weekday_index(key.weekday),
                ],
                raw_transition,
            )
            .optional()?;
        raw.map(transition_from_raw).transpose()
    }

    fn put_transition(&mut self, record: TransitionRecord) -> MobilityResult<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO transition \
                 (segment_from, segment_to, weekday, count, distance_sum, duration_sum) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT (segment_from, segment_to, weekday) DO UPDATE SET \
                 count = excluded.count, \
                 distance_sum = excluded.distance_sum, \
                 duration_sum = excluded.duration_sum",
            )?
            .execute(rusqlite::params![
                record.key.segment_from.to_sql(),
                record.key.segment_to.to_sql(),
                weekday_index(record.key.weekday),
                record.count as i64,
                record.distance_sum,
                record.duration_sum,
            ])?;
        Ok(())
    }

    fn upsert_transition(
        &mut self,
        key: TransitionKey,
        distance_m: f64,
        duration_s: f64,
    ) -> MobilityResult<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO transition \
                 (segment_from, segment_to, weekday, count, distance_sum, duration_sum) \
                 VALUES (?1, ?2, ?3, 1, ?4, ?5) \
                 ON CONFLICT (segment_from, segment_to, weekday) DO UPDATE SET \
                 count = count + 1, \
                 distance_sum = distance_sum + excluded.distance_sum, \
                 duration_sum = duration_sum + excluded.duration_sum",
            )?
            .execute(rusqlite::params![
                key.segment_from.to_sql(),
                key.segment_to.to_sql(),
                weekday_index(key.weekday),
                distance_m,
                duration_s,
            ])?;
        Ok(())
    }

    fn find_location(&self, segment_id: SegmentId) -> MobilityResult<Option<LocationRecord>> {
        let raw: Option<(String, String)> = self
            .conn
            .prepare_cached("SELECT observed_points, centroid FROM location WHERE segment_id = ?1")?
            .query_row([segment_id.to_sql()], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;
        raw.map(|(points, centroid)| location_from_raw(segment_id.to_sql(), &points, &centroid))
            .transpose()
    }

    fn put_location(&mut self, record: LocationRecord) -> MobilityResult<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO location (segment_id, observed_points, centroid) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT (segment_id) DO UPDATE SET \
                 observed_points = excluded.observed_points, \
                 centroid = excluded.centroid",
            )?
            .execute(rusqlite::params![
                record.segment_id.to_sql(),
                codec::encode_route(&record.observed_points)?,
                codec::encode_point(&record.centroid)?,
            ])?;
        Ok(())
    }

    // Ids are stored bit-cast to i64, so SQL would order ids at or above
    // 2^63 first.  Listings are sorted in Rust instead.
    fn transitions(&self) -> MobilityResult<Vec<Transition>> {
        let mut out = self.query_transitions(SELECT_TRANSITIONS, [])?;
        out.sort_by_key(|t| t.key().sort_key());
        Ok(out)
    }

    fn locations(&self) -> MobilityResult<Vec<LocationRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT segment_id, observed_points, centroid FROM location",
        )?;
        let raws = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut out = raws
            .iter()
            .map(|(id, points, centroid)| location_from_raw(*id, points, centroid))
            .collect::<MobilityResult<Vec<_>>>()?;
        out.sort_by_key(|l| l.segment_id);
        Ok(out)
    }

    fn replace_probabilities(
        &mut self,
        probabilities: FxHashMap<TransitionKey, f64>,
    ) -> MobilityResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM transition_probability", [])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO transition_probability (transition_id, probability) \
                 SELECT transition_id, ?4 FROM transition \
                 WHERE segment_from = ?1 AND segment_to = ?2 AND weekday = ?3",
            )?;
            for (key, probability) in &probabilities {
                stmt.execute(rusqlite::params![
                    key.segment_from.to_sql(),
                    key.segment_to.to_sql(),
                    weekday_index(key.weekday),
                    probability,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn rebuild_probabilities(&mut self) -> MobilityResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(REBUILD_PROBABILITIES)?;
        tx.commit()?;
        Ok(())
    }

    fn find_possible_transitions(
        &self,
        segment_from: SegmentId,
        forbidden: &[SegmentId],
        weekday: Weekday,
    ) -> MobilityResult<Vec<Transition>> {
        let mut sql = format!("{SELECT_TRANSITIONS} WHERE t.segment_from = ?1 AND t.weekday = ?2");
        if !forbidden.is_empty() {
            let placeholders: Vec<String> =
                (0..forbidden.len()).map(|i| format!("?{}", i + 3)).collect();
            sql.push_str(&format!(" AND t.segment_to NOT IN ({})", placeholders.join(", ")));
        }

        let params: Vec<i64> = [segment_from.to_sql(), i64::from(weekday_index(weekday))]
            .into_iter()
            .chain(forbidden.iter().map(|s| s.to_sql()))
            .collect();
        let mut out = self.query_transitions(&sql, rusqlite::params_from_iter(params))?;
        out.sort_by_key(|t| t.key().segment_to);
        Ok(out)
    }
}
