//! Points carrying a timestamp.

use chrono::{DateTime, Utc};

use crate::{GeoError, GeoResult, Point};

/// Absolute instant attached to a [`TimedPoint`].
pub type Timestamp = DateTime<Utc>;

/// A [`Point`] observed at a given instant.
///
/// Collections of timed points order by `timestamp`; two timed points are
/// equal only if both the point and the instant match.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedPoint {
    point:     Point,
    timestamp: Timestamp,
}

impl TimedPoint {
    #[inline]
    pub fn new(point: Point, timestamp: Timestamp) -> Self {
        Self { point, timestamp }
    }

    /// Build from Unix seconds.
    ///
    /// # Errors
    ///
    /// [`GeoError::InvalidArgument`] if `secs` is outside the representable
    /// timestamp range.
    pub fn from_unix_secs(point: Point, secs: i64) -> GeoResult<Self> {
        let timestamp = DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
            GeoError::InvalidArgument(format!("timestamp {secs} s is out of range"))
        })?;
        Ok(Self::new(point, timestamp))
    }

    #[inline]
    pub fn point(&self) -> &Point {
        &self.point
    }

    #[inline]
    pub fn point_mut(&mut self) -> &mut Point {
        &mut self.point
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Drop the timestamp.
    #[inline]
    pub fn into_point(self) -> Point {
        self.point
    }

    /// Apply a fallible point transform, keeping the timestamp.
    pub fn try_map<F>(&self, f: F) -> GeoResult<TimedPoint>
    where
        F: FnOnce(&Point) -> GeoResult<Point>,
    {
        Ok(Self::new(f(&self.point)?, self.timestamp))
    }
}
