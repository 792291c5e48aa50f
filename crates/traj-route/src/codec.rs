//! Coordinate text codec.
//!
//! Routes and points persist as JSON arrays of pairs, `[[x, y], …]` and
//! `[[x, y]]`.  Only coordinates are written; the reference system and unit
//! are fixed by the consumer (location tables store latlon degrees).

use traj_core::{CoordinatesUnit, GeoReferenceSystem, Point};

use crate::{Route, RouteError, RouteResult};

/// Encode raw coordinate pairs.
pub fn encode_coords(coords: &[[f64; 2]]) -> RouteResult<String> {
    Ok(serde_json::to_string(coords)?)
}

/// Encode the points of `route`, dropping timestamps.
pub fn encode_route(route: &Route) -> RouteResult<String> {
    let coords: Vec<[f64; 2]> = route.iter().map(Point::coords).collect();
    encode_coords(&coords)
}

/// Encode a single point as a one-element array.
pub fn encode_point(point: &Point) -> RouteResult<String> {
    encode_coords(&[point.coords()])
}

/// Decode `[[x, y], …]` into an untimed route with the given tags.
pub fn decode_route(
    text: &str,
    reference: GeoReferenceSystem,
    unit: CoordinatesUnit,
) -> RouteResult<Route> {
    let coords: Vec<[f64; 2]> = serde_json::from_str(text)?;
    let points = coords
        .into_iter()
        .map(|[x, y]| Point::new(x, y, reference, unit))
        .collect::<Result<Vec<_>, _>>()?;
    Route::from_waypoints(points)
}

/// Decode a one-element `[[x, y]]` array.
///
/// # Errors
///
/// [`RouteError::InvalidArgument`] if the array does not hold exactly one pair.
pub fn decode_point(
    text: &str,
    reference: GeoReferenceSystem,
    unit: CoordinatesUnit,
) -> RouteResult<Point> {
    let coords: Vec<[f64; 2]> = serde_json::from_str(text)?;
    match coords.as_slice() {
        [[x, y]] => Ok(Point::new(*x, *y, reference, unit)?),
        other => Err(RouteError::InvalidArgument(format!(
            "expected a single coordinate pair, got {}",
            other.len()
        ))),
    }
}
