//! CSV trip loader.
//!
//! # CSV format
//!
//! One row per GPS fix.  Coordinates are WGS84 degrees; timestamps are Unix
//! seconds.
//!
//! ```csv
//! trip_id,timestamp,lon,lat
//! t1,1700000000,-7.6018,41.1671
//! t1,1700000030,-7.6007,41.1673
//! t2,1700003600,-8.6110,41.1470
//! ```
//!
//! Rows need not be grouped or ordered: fixes are bucketed by `trip_id` and
//! each trip becomes a timed [`Route`], sorted by timestamp.  Trips are
//! returned ordered by start time, then id.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::{Datelike, Weekday};
use serde::Deserialize;

use traj_core::{CoordinatesUnit, Point, TimedPoint, Timestamp};

use crate::{Route, RouteError, RouteResult};

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TripRecord {
    trip_id:   String,
    timestamp: i64,
    lon:       f64,
    lat:       f64,
}

// ── Trip ──────────────────────────────────────────────────────────────────────

/// A recorded journey: an id plus a timed latlon route in degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct Trip {
    pub trip_id: String,
    pub route:   Route,
}

impl Trip {
    /// Timestamp of the first fix.
    pub fn start(&self) -> Option<Timestamp> {
        self.route.start_time()
    }

    /// Day of week the trip started on (UTC).
    pub fn weekday(&self) -> Option<Weekday> {
        self.start().map(|t| t.weekday())
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load trips from a CSV file.
pub fn load_trips_csv(path: &Path) -> RouteResult<Vec<Trip>> {
    let file = std::fs::File::open(path).map_err(RouteError::Io)?;
    load_trips_reader(file)
}

/// Like [`load_trips_csv`] but accepts any `Read` source.
pub fn load_trips_reader<R: Read>(reader: R) -> RouteResult<Vec<Trip>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut by_trip: HashMap<String, Vec<TimedPoint>> = HashMap::new();

    for result in csv_reader.deserialize::<TripRecord>() {
        let row = result.map_err(|e| RouteError::Parse(e.to_string()))?;
        let point = Point::latlon(row.lon, row.lat, CoordinatesUnit::Degrees)?;
        let fix = TimedPoint::from_unix_secs(point, row.timestamp)?;
        by_trip.entry(row.trip_id).or_default().push(fix);
    }

    let mut trips = by_trip
        .into_iter()
        .map(|(trip_id, fixes)| {
            Ok(Trip {
                trip_id,
                route: Route::from_waypoints(fixes)?,
            })
        })
        .collect::<RouteResult<Vec<_>>>()?;

    trips.sort_by(|a, b| a.start().cmp(&b.start()).then_with(|| a.trip_id.cmp(&b.trip_id)));
    log::debug!("loaded {} trips", trips.len());
    Ok(trips)
}
