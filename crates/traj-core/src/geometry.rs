//! Geometry on points: bearing, distance, interpolation.
//!
//! Destination-by-vector and projections are methods on [`Point`]; the
//! functions here take two points.
//!
//! When two latlon inputs carry different units, both are normalised to a
//! common unit with a warning and the computation proceeds.

use crate::point::EARTH_RADIUS_M;
use crate::{CoordinatesUnit, GeoError, GeoResult, Point, TimedPoint};

/// Initial bearing (radians) of the great-circle arc from `a` to `b`.
///
/// ```text
/// θ = atan2( sin Δλ · cos φ2,  cos φ1 · sin φ2 − sin φ1 · cos φ2 · cos Δλ )
/// ```
///
/// # Errors
///
/// [`GeoError::InvalidState`] if either point is cartesian.
pub fn get_bearing(a: &Point, b: &Point) -> GeoResult<f64> {
    if !a.is_latlon() || !b.is_latlon() {
        return Err(GeoError::InvalidState(
            "bearing requires both points in latlon".into(),
        ));
    }
    warn_unit_mismatch("get_bearing", a, b);
    let a = a.in_unit(CoordinatesUnit::Radians)?;
    let b = b.in_unit(CoordinatesUnit::Radians)?;

    let (lon1, lat1) = (a.x_lon(), a.y_lat());
    let (lon2, lat2) = (b.x_lon(), b.y_lat());
    let d_lon = lon2 - lon1;

    Ok((d_lon.sin() * lat2.cos())
        .atan2(lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos()))
}

/// Distance between two points.
///
/// Latlon: haversine great-circle distance in metres on a sphere of radius
/// [`EARTH_RADIUS_M`].  Cartesian: Euclidean distance in the points' own
/// units.
///
/// # Errors
///
/// [`GeoError::InvalidArgument`] if the reference systems differ.
pub fn get_distance(a: &Point, b: &Point) -> GeoResult<f64> {
    if a.geo_reference_system() != b.geo_reference_system() {
        return Err(GeoError::InvalidArgument(format!(
            "distance requires matching geo reference systems, got {} and {}",
            a.geo_reference_system(),
            b.geo_reference_system()
        )));
    }
    if !a.is_latlon() {
        return Ok((b.x_lon() - a.x_lon()).hypot(b.y_lat() - a.y_lat()));
    }
    warn_unit_mismatch("get_distance", a, b);
    let a = a.in_unit(CoordinatesUnit::Radians)?;
    let b = b.in_unit(CoordinatesUnit::Radians)?;

    let d_lat = b.y_lat() - a.y_lat();
    let d_lon = b.x_lon() - a.x_lon();
    let h = (d_lat * 0.5).sin().powi(2)
        + a.y_lat().cos() * b.y_lat().cos() * (d_lon * 0.5).sin().powi(2);
    Ok(2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt()))
}

/// Point on the great circle from `start` towards `end`, `ratio` of the way
/// along.  The result is in `start`'s unit.
///
/// # Errors
///
/// [`GeoError::NotSupported`] for cartesian inputs.
pub fn get_interpolated_point(start: &Point, end: &Point, ratio: f64) -> GeoResult<Point> {
    if !start.is_latlon() {
        return Err(GeoError::NotSupported(
            "interpolating in the cartesian plane".into(),
        ));
    }
    let distance = ratio * get_distance(start, end)?;
    let bearing = get_bearing(start, end)?;
    start.add_vector(distance, bearing)
}

/// [`get_interpolated_point`] for timed points.  Time is not interpolated:
/// the result carries `start`'s timestamp.
pub fn get_interpolated_timed_point(
    start: &TimedPoint,
    end: &TimedPoint,
    ratio: f64,
) -> GeoResult<TimedPoint> {
    let point = get_interpolated_point(start.point(), end.point(), ratio)?;
    Ok(TimedPoint::new(point, start.timestamp()))
}

fn warn_unit_mismatch(op: &str, a: &Point, b: &Point) {
    if a.coordinates_unit() != b.coordinates_unit() {
        log::warn!(
            "{op}: coordinates units differ ({} vs {}), normalising to radians",
            a.coordinates_unit(),
            b.coordinates_unit()
        );
    }
}
