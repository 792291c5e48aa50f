//! `Route`: an ordered, homogeneous sequence of points.

use std::time::Duration;

use traj_core::{
    CoordinatesUnit, GeoReferenceSystem, GeoResult, Point, TimedPoint, Timestamp, get_distance,
};

use crate::{RouteError, RouteResult};

// ── Waypoint ──────────────────────────────────────────────────────────────────

/// One route element: a plain point or a timed point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Waypoint {
    Plain(Point),
    Timed(TimedPoint),
}

impl Waypoint {
    #[inline]
    pub fn point(&self) -> &Point {
        match self {
            Waypoint::Plain(p) => p,
            Waypoint::Timed(t) => t.point(),
        }
    }

    #[inline]
    pub fn point_mut(&mut self) -> &mut Point {
        match self {
            Waypoint::Plain(p) => p,
            Waypoint::Timed(t) => t.point_mut(),
        }
    }

    #[inline]
    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Waypoint::Plain(_) => None,
            Waypoint::Timed(t) => Some(t.timestamp()),
        }
    }

    #[inline]
    pub fn is_timed(&self) -> bool {
        matches!(self, Waypoint::Timed(_))
    }

    /// Apply a fallible point transform, keeping the variant and timestamp.
    pub fn try_map<F>(&self, f: F) -> GeoResult<Waypoint>
    where
        F: FnOnce(&Point) -> GeoResult<Point>,
    {
        Ok(match self {
            Waypoint::Plain(p) => Waypoint::Plain(f(p)?),
            Waypoint::Timed(t) => Waypoint::Timed(t.try_map(f)?),
        })
    }
}

impl From<Point> for Waypoint {
    fn from(p: Point) -> Self {
        Waypoint::Plain(p)
    }
}

impl From<TimedPoint> for Waypoint {
    fn from(t: TimedPoint) -> Self {
        Waypoint::Timed(t)
    }
}

// ── Bounds ────────────────────────────────────────────────────────────────────

/// Coordinate extent `(x_min, x_max, y_min, y_max)` used by
/// [`Route::scale`] / [`Route::inverse_scale`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self { x_min, x_max, y_min, y_max }
    }

    fn spans(&self) -> RouteResult<(f64, f64)> {
        let dx = self.x_max - self.x_min;
        let dy = self.y_max - self.y_min;
        if dx == 0.0 || dy == 0.0 || !dx.is_finite() || !dy.is_finite() {
            return Err(RouteError::InvalidArgument(format!(
                "scale bounds must span a non-empty range, got {self:?}"
            )));
        }
        Ok((dx, dy))
    }
}

impl From<(f64, f64, f64, f64)> for Bounds {
    fn from((x_min, x_max, y_min, y_max): (f64, f64, f64, f64)) -> Self {
        Self::new(x_min, x_max, y_min, y_max)
    }
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// Ordered sequence of [`Waypoint`]s.
///
/// Invariants, enforced by every constructor and mutator:
///
/// - all elements share one [`GeoReferenceSystem`] and, under latlon, one
///   [`CoordinatesUnit`];
/// - either all elements are timed or none is;
/// - a timed route is sorted ascending by timestamp (stable).
///
/// `Clone` is the deep copy: points are values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Route {
    waypoints: Vec<Waypoint>,
}

impl Route {
    /// Empty route.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a route by appending each element in turn; the first element
    /// fixes the route's tags and later ones are admitted like
    /// [`append`](Self::append).
    pub fn from_waypoints<I, W>(items: I) -> RouteResult<Self>
    where
        I: IntoIterator<Item = W>,
        W: Into<Waypoint>,
    {
        let mut route = Self::new();
        for item in items {
            route.append(item)?;
        }
        Ok(route)
    }

    /// Coerce raw `[x, y]` pairs into latlon points in `unit`.
    pub fn from_coords(coords: &[[f64; 2]], unit: CoordinatesUnit) -> RouteResult<Self> {
        let points = coords
            .iter()
            .map(|&[x, y]| Point::new(x, y, GeoReferenceSystem::LatLon, unit))
            .collect::<GeoResult<Vec<_>>>()?;
        Self::from_waypoints(points)
    }

    /// Zip `points` with `timestamps` into a timed route, sorted by time.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidArgument`] if the lengths differ.
    pub fn with_timestamps(points: Vec<Point>, timestamps: Vec<Timestamp>) -> RouteResult<Self> {
        if points.len() != timestamps.len() {
            return Err(RouteError::InvalidArgument(format!(
                "{} points but {} timestamps",
                points.len(),
                timestamps.len()
            )));
        }
        Self::from_waypoints(
            points
                .into_iter()
                .zip(timestamps)
                .map(|(p, t)| TimedPoint::new(p, t)),
        )
    }

    // ── Inspection ────────────────────────────────────────────────────────

    #[inline]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// `true` if the route is non-empty and its elements are timed.
    pub fn has_timestamps(&self) -> bool {
        self.waypoints.first().is_some_and(Waypoint::is_timed)
    }

    pub fn get(&self, index: usize) -> Option<&Point> {
        self.waypoints.get(index).map(Waypoint::point)
    }

    pub fn waypoint(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> + '_ {
        self.waypoints.iter().map(Waypoint::point)
    }

    /// Timestamps in route order, or `None` for an untimed route.
    pub fn timestamps(&self) -> Option<Vec<Timestamp>> {
        self.waypoints.iter().map(Waypoint::timestamp).collect()
    }

    /// Earliest timestamp of a timed route.
    pub fn start_time(&self) -> Option<Timestamp> {
        self.waypoints.first().and_then(Waypoint::timestamp)
    }

    pub fn geo_reference_system(&self) -> Option<GeoReferenceSystem> {
        self.get(0).map(Point::geo_reference_system)
    }

    pub fn coordinates_unit(&self) -> Option<CoordinatesUnit> {
        self.get(0).map(Point::coordinates_unit)
    }

    // ── Mutation ──────────────────────────────────────────────────────────

    /// Append one element.
    ///
    /// - Reference system differs from the route's: [`RouteError::IncompatibleAppend`].
    /// - Timed route, untimed value: [`RouteError::IncompatibleAppend`].
    /// - Untimed route, timed value: timestamp discarded with a warning.
    /// - Unit differs: value converted to the route's unit with a warning.
    pub fn append(&mut self, value: impl Into<Waypoint>) -> RouteResult<()> {
        let value = admit(self.waypoints.first(), value.into())?;
        self.waypoints.push(value);
        self.resort();
        Ok(())
    }

    /// Coerce a raw coordinate slice (latlon, radians) and append it.
    pub fn append_coords(&mut self, coords: &[f64]) -> RouteResult<()> {
        self.append(Point::try_from(coords)?)
    }

    /// Replace the element at `index`, admitting `value` against the other
    /// elements as [`append`](Self::append) does.
    pub fn set(&mut self, index: usize, value: impl Into<Waypoint>) -> RouteResult<()> {
        self.check_index(index)?;
        let reference = self
            .waypoints
            .iter()
            .enumerate()
            .find(|(i, _)| *i != index)
            .map(|(_, w)| w);
        let value = admit(reference, value.into())?;
        self.waypoints[index] = value;
        self.resort();
        Ok(())
    }

    /// Remove and return the element at `index`.
    pub fn delete_point_at(&mut self, index: usize) -> RouteResult<Waypoint> {
        self.check_index(index)?;
        Ok(self.waypoints.remove(index))
    }

    /// Map every point into `[0, 1]²` relative to `bounds`.
    pub fn scale(&mut self, bounds: impl Into<Bounds>) -> RouteResult<()> {
        let b = bounds.into();
        let (dx, dy) = b.spans()?;
        for w in &mut self.waypoints {
            let p = w.point_mut();
            p.set_x_lon((p.x_lon() - b.x_min) / dx);
            p.set_y_lat((p.y_lat() - b.y_min) / dy);
        }
        Ok(())
    }

    /// Inverse of [`scale`](Self::scale).
    pub fn inverse_scale(&mut self, bounds: impl Into<Bounds>) -> RouteResult<()> {
        let b = bounds.into();
        let (dx, dy) = b.spans()?;
        for w in &mut self.waypoints {
            let p = w.point_mut();
            p.set_x_lon(p.x_lon() * dx + b.x_min);
            p.set_y_lat(p.y_lat() * dy + b.y_min);
        }
        Ok(())
    }

    /// Append `(0, 0)` points until the route has `target_len` elements.
    ///
    /// # Errors
    ///
    /// [`RouteError::UnsupportedOperation`] if the route holds timed points.
    pub fn pad(&mut self, target_len: usize) -> RouteResult<()> {
        if self.has_timestamps() {
            return Err(RouteError::UnsupportedOperation(
                "pad only applies to routes of plain points".into(),
            ));
        }
        let zero = match self.get(0) {
            Some(first) => {
                let mut z = *first;
                z.set_x_lon(0.0);
                z.set_y_lat(0.0);
                z
            }
            None => Point::try_from([0.0, 0.0])?,
        };
        if target_len > self.len() {
            self.waypoints.resize(target_len, Waypoint::Plain(zero));
        }
        Ok(())
    }

    /// Stable sort by timestamp.
    ///
    /// # Errors
    ///
    /// [`RouteError::UnsupportedOperation`] for a non-empty untimed route.
    pub fn sort_by_time(&mut self) -> RouteResult<()> {
        if !self.is_empty() && !self.has_timestamps() {
            return Err(RouteError::UnsupportedOperation(
                "sort_by_time only applies to routes of timed points".into(),
            ));
        }
        self.resort();
        Ok(())
    }

    fn resort(&mut self) {
        if self.has_timestamps() {
            self.waypoints.sort_by_key(Waypoint::timestamp);
        }
    }

    fn check_index(&self, index: usize) -> RouteResult<()> {
        if index >= self.len() {
            return Err(RouteError::IndexOutOfRange { index, len: self.len() });
        }
        Ok(())
    }

    // ── Aggregates ────────────────────────────────────────────────────────

    /// Coordinate-wise mean, tagged like the route; `None` when empty.
    pub fn get_average_point(&self) -> Option<Point> {
        let first = self.get(0)?;
        let n = self.len() as f64;
        let (sx, sy) = self
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x_lon(), sy + p.y_lat()));
        let mut mean = *first;
        mean.set_x_lon(sx / n);
        mean.set_y_lat(sy / n);
        Some(mean)
    }

    /// Highest speed in km/h between consecutive points, assuming `interval`
    /// between every pair.  Distances come from [`get_distance`], so latlon
    /// routes give metres.
    pub fn max_speed(&self, interval: Duration) -> RouteResult<f64> {
        let secs = interval.as_secs_f64();
        if secs <= 0.0 {
            return Err(RouteError::InvalidArgument(
                "interval between route points must be positive".into(),
            ));
        }
        let mut max_kmh: f64 = 0.0;
        for pair in self.waypoints.windows(2) {
            let metres = get_distance(pair[0].point(), pair[1].point())?;
            max_kmh = max_kmh.max(metres / secs * 3600.0 / 1000.0);
        }
        Ok(max_kmh)
    }

    /// Extent of all points across `routes`; `None` if they are all empty.
    pub fn location_bounds<'a>(routes: impl IntoIterator<Item = &'a Route>) -> Option<Bounds> {
        routes
            .into_iter()
            .flat_map(Route::iter)
            .fold(None, |acc: Option<Bounds>, p| {
                let (x, y) = (p.x_lon(), p.y_lat());
                Some(match acc {
                    None => Bounds::new(x, x, y, y),
                    Some(b) => Bounds::new(b.x_min.min(x), b.x_max.max(x), b.y_min.min(y), b.y_max.max(y)),
                })
            })
    }

    // ── Conversions ───────────────────────────────────────────────────────

    pub fn to_degrees(&self) -> RouteResult<Route> {
        let mut r = self.clone();
        r.to_degrees_in_place()?;
        Ok(r)
    }

    pub fn to_degrees_in_place(&mut self) -> RouteResult<()> {
        self.convert_unit(CoordinatesUnit::Degrees)
    }

    pub fn to_radians(&self) -> RouteResult<Route> {
        let mut r = self.clone();
        r.to_radians_in_place()?;
        Ok(r)
    }

    pub fn to_radians_in_place(&mut self) -> RouteResult<()> {
        self.convert_unit(CoordinatesUnit::Radians)
    }

    /// Copy in `unit` without the already-there warning.
    pub fn in_unit(&self, unit: CoordinatesUnit) -> RouteResult<Route> {
        let mut r = self.clone();
        r.map_points(|p| p.in_unit(unit))?;
        Ok(r)
    }

    pub fn to_cartesian(&self) -> RouteResult<Route> {
        let mut r = self.clone();
        r.to_cartesian_in_place()?;
        Ok(r)
    }

    pub fn to_cartesian_in_place(&mut self) -> RouteResult<()> {
        if self.geo_reference_system() == Some(GeoReferenceSystem::Cartesian) {
            log::warn!("route projection: geo reference system is already cartesian");
            return Ok(());
        }
        self.map_points(Point::to_cartesian)
    }

    pub fn to_latlon(&self) -> RouteResult<Route> {
        let mut r = self.clone();
        r.to_latlon_in_place()?;
        Ok(r)
    }

    pub fn to_latlon_in_place(&mut self) -> RouteResult<()> {
        if self.geo_reference_system() == Some(GeoReferenceSystem::LatLon) {
            log::warn!("route projection: geo reference system is already latlon");
            return Ok(());
        }
        self.map_points(Point::to_latlon)
    }

    fn convert_unit(&mut self, unit: CoordinatesUnit) -> RouteResult<()> {
        if self.geo_reference_system() == Some(GeoReferenceSystem::LatLon)
            && self.coordinates_unit() == Some(unit)
        {
            log::warn!("route unit conversion: coordinates unit is already {unit}");
            return Ok(());
        }
        self.map_points(|p| p.in_unit(unit))
    }

    /// All-or-nothing point transform: on error the route is unchanged.
    fn map_points<F>(&mut self, f: F) -> RouteResult<()>
    where
        F: Fn(&Point) -> GeoResult<Point>,
    {
        let mapped = self
            .waypoints
            .iter()
            .map(|w| w.try_map(&f))
            .collect::<GeoResult<Vec<_>>>()?;
        self.waypoints = mapped;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Route {
    type Item = &'a Point;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, Waypoint>, fn(&Waypoint) -> &Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.waypoints.iter().map(Waypoint::point as fn(&Waypoint) -> &Point)
    }
}

// ── Admission ─────────────────────────────────────────────────────────────────

/// Check `value` against an existing element and bring it into line.
fn admit(reference: Option<&Waypoint>, value: Waypoint) -> RouteResult<Waypoint> {
    let Some(reference) = reference else {
        return Ok(value);
    };
    let target = *reference.point();
    let incoming = *value.point();

    if incoming.geo_reference_system() != target.geo_reference_system() {
        return Err(RouteError::IncompatibleAppend(format!(
            "route is {}, point is {}",
            target.geo_reference_system(),
            incoming.geo_reference_system()
        )));
    }

    let value = match (reference, value) {
        (Waypoint::Timed(_), Waypoint::Plain(_)) => {
            return Err(RouteError::IncompatibleAppend(
                "route has timestamps, point has none".into(),
            ));
        }
        (Waypoint::Plain(_), Waypoint::Timed(t)) => {
            log::warn!("route append: route has no timestamps, discarding timestamp {}", t.timestamp());
            Waypoint::Plain(t.into_point())
        }
        (_, v) => v,
    };

    if target.is_latlon() && incoming.coordinates_unit() != target.coordinates_unit() {
        log::warn!(
            "route append: converting point from {} to {}",
            incoming.coordinates_unit(),
            target.coordinates_unit()
        );
        return Ok(value.try_map(|p| p.in_unit(target.coordinates_unit()))?);
    }
    Ok(value)
}
