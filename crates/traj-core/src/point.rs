//! Geographic / cartesian coordinate pair with unit and reference-system tags.
//!
//! A [`Point`] is a value type: `Copy`, no shared ownership.  Every
//! conversion comes in two flavours, a copy-returning `to_*` method and a
//! mutating `to_*_in_place` method.  Geometry functions always return new
//! points.
//!
//! Under [`GeoReferenceSystem::LatLon`] the pair is `[longitude, latitude]`;
//! under [`GeoReferenceSystem::Cartesian`] it is planar `[x, y]` and the unit
//! tag carries no meaning.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::fmt;
use std::str::FromStr;

use crate::{GeoError, GeoResult};

/// Mean Earth radius in metres.  Used by every distance, destination and
/// projection formula in the workspace.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Projection radius in kilometres for the Mercator-like cartesian form.
const PROJECTION_RADIUS_KM: f64 = EARTH_RADIUS_M / 1000.0;

// ── Tags ──────────────────────────────────────────────────────────────────────

/// Whether a point's coordinates are spherical or planar.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GeoReferenceSystem {
    /// Longitude / latitude on the Earth's surface.
    #[default]
    LatLon,
    /// Euclidean plane.
    Cartesian,
}

impl GeoReferenceSystem {
    pub fn as_str(self) -> &'static str {
        match self {
            GeoReferenceSystem::LatLon    => "latlon",
            GeoReferenceSystem::Cartesian => "cartesian",
        }
    }
}

impl fmt::Display for GeoReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoReferenceSystem {
    type Err = GeoError;

    fn from_str(s: &str) -> GeoResult<Self> {
        match s {
            "latlon"    => Ok(GeoReferenceSystem::LatLon),
            "cartesian" => Ok(GeoReferenceSystem::Cartesian),
            other => Err(GeoError::InvalidArgument(format!(
                "geo reference system must be \"latlon\" or \"cartesian\", got {other:?}"
            ))),
        }
    }
}

/// Angular unit of latlon coordinates.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CoordinatesUnit {
    #[default]
    Radians,
    Degrees,
}

impl CoordinatesUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            CoordinatesUnit::Radians => "radians",
            CoordinatesUnit::Degrees => "degrees",
        }
    }

    /// Inclusive `(longitude, latitude)` magnitude bounds for this unit.
    #[inline]
    pub fn bounds(self) -> (f64, f64) {
        match self {
            CoordinatesUnit::Radians => (PI, FRAC_PI_2),
            CoordinatesUnit::Degrees => (180.0, 90.0),
        }
    }
}

impl fmt::Display for CoordinatesUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoordinatesUnit {
    type Err = GeoError;

    fn from_str(s: &str) -> GeoResult<Self> {
        match s {
            "radians" => Ok(CoordinatesUnit::Radians),
            "degrees" => Ok(CoordinatesUnit::Degrees),
            other => Err(GeoError::InvalidArgument(format!(
                "coordinates unit must be \"radians\" or \"degrees\", got {other:?}"
            ))),
        }
    }
}

// ── Point ─────────────────────────────────────────────────────────────────────

/// A coordinate pair tagged with its reference system and unit.
///
/// The pair is the only coordinate state; [`x_lon`](Self::x_lon) and
/// [`y_lat`](Self::y_lat) read straight from it, so index-style writes via
/// [`set`](Self::set) can never leave a stale accessor behind.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    coords:    [f64; 2],
    reference: GeoReferenceSystem,
    unit:      CoordinatesUnit,
}

impl Point {
    /// Validating constructor.
    ///
    /// # Errors
    ///
    /// [`GeoError::InvalidArgument`] if a coordinate is not finite or, for
    /// latlon points, lies outside the range of `unit`
    /// (`lon ∈ [-180, 180]`, `lat ∈ [-90, 90]` or the radian equivalents).
    pub fn new(
        x: f64,
        y: f64,
        reference: GeoReferenceSystem,
        unit: CoordinatesUnit,
    ) -> GeoResult<Self> {
        if !x.is_finite() || !y.is_finite() {
            return Err(GeoError::InvalidArgument(format!(
                "coordinates must be finite numbers, got [{x}, {y}]"
            )));
        }
        if reference == GeoReferenceSystem::LatLon {
            let (lon_max, lat_max) = unit.bounds();
            if x.abs() > lon_max || y.abs() > lat_max {
                return Err(GeoError::InvalidArgument(format!(
                    "latlon coordinates [{x}, {y}] out of range for unit {unit} \
                     (|lon| <= {lon_max}, |lat| <= {lat_max})"
                )));
            }
        }
        Ok(Self::raw(x, y, reference, unit))
    }

    /// Latlon point, `lon`/`lat` in `unit`.
    pub fn latlon(lon: f64, lat: f64, unit: CoordinatesUnit) -> GeoResult<Self> {
        Self::new(lon, lat, GeoReferenceSystem::LatLon, unit)
    }

    /// Cartesian point.
    pub fn cartesian(x: f64, y: f64) -> GeoResult<Self> {
        Self::new(x, y, GeoReferenceSystem::Cartesian, CoordinatesUnit::Radians)
    }

    /// Construct from a coordinate slice and textual tags, as the dataset
    /// adapters hand them over.
    ///
    /// # Errors
    ///
    /// [`GeoError::InvalidArgument`] if `coords` is not exactly two elements
    /// long or either tag is not a recognised name.
    pub fn parse(coords: &[f64], reference: &str, unit: &str) -> GeoResult<Self> {
        let [x, y] = pair(coords)?;
        Self::new(x, y, reference.parse()?, unit.parse()?)
    }

    /// Unchecked constructor for results of conversions and formulas.
    #[inline]
    pub(crate) fn raw(x: f64, y: f64, reference: GeoReferenceSystem, unit: CoordinatesUnit) -> Self {
        Self { coords: [x, y], reference, unit }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// X coordinate, or longitude under latlon.
    #[inline]
    pub fn x_lon(&self) -> f64 {
        self.coords[0]
    }

    /// Y coordinate, or latitude under latlon.
    #[inline]
    pub fn y_lat(&self) -> f64 {
        self.coords[1]
    }

    #[inline]
    pub fn coords(&self) -> [f64; 2] {
        self.coords
    }

    #[inline]
    pub fn geo_reference_system(&self) -> GeoReferenceSystem {
        self.reference
    }

    #[inline]
    pub fn coordinates_unit(&self) -> CoordinatesUnit {
        self.unit
    }

    #[inline]
    pub fn is_latlon(&self) -> bool {
        self.reference == GeoReferenceSystem::LatLon
    }

    // ── Setters ───────────────────────────────────────────────────────────

    /// Index-style write: `0` is x / longitude, `1` is y / latitude.
    ///
    /// Setters do not re-validate ranges; `Route::scale` legitimately maps
    /// coordinates into `[0, 1]`.
    pub fn set(&mut self, index: usize, value: f64) -> GeoResult<()> {
        match self.coords.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(GeoError::InvalidArgument(format!(
                "point coordinate index must be 0 or 1, got {index}"
            ))),
        }
    }

    #[inline]
    pub fn set_x_lon(&mut self, value: f64) {
        self.coords[0] = value;
    }

    #[inline]
    pub fn set_y_lat(&mut self, value: f64) {
        self.coords[1] = value;
    }

    /// Relabel the reference system without touching the coordinates.
    pub fn set_geo_reference_system(&mut self, reference: GeoReferenceSystem) {
        self.reference = reference;
    }

    /// Relabel the unit without touching the coordinates.
    pub fn set_coordinates_unit(&mut self, unit: CoordinatesUnit) {
        self.unit = unit;
    }

    // ── Unit conversion ───────────────────────────────────────────────────

    /// Copy of this point in degrees.  See [`to_degrees_in_place`](Self::to_degrees_in_place).
    pub fn to_degrees(&self) -> GeoResult<Point> {
        let mut p = *self;
        p.to_degrees_in_place()?;
        Ok(p)
    }

    /// Convert latlon coordinates to degrees.  A point already in degrees is
    /// left unchanged with a warning.
    ///
    /// # Errors
    ///
    /// [`GeoError::InvalidState`] for cartesian points.
    pub fn to_degrees_in_place(&mut self) -> GeoResult<()> {
        self.convert_unit(CoordinatesUnit::Degrees, true)
    }

    /// Copy of this point in radians.  See [`to_radians_in_place`](Self::to_radians_in_place).
    pub fn to_radians(&self) -> GeoResult<Point> {
        let mut p = *self;
        p.to_radians_in_place()?;
        Ok(p)
    }

    /// Convert latlon coordinates to radians.  A point already in radians is
    /// left unchanged with a warning.
    ///
    /// # Errors
    ///
    /// [`GeoError::InvalidState`] for cartesian points.
    pub fn to_radians_in_place(&mut self) -> GeoResult<()> {
        self.convert_unit(CoordinatesUnit::Radians, true)
    }

    /// Copy of this point in `unit`, silently returning an unchanged copy
    /// when it is already there.
    pub fn in_unit(&self, unit: CoordinatesUnit) -> GeoResult<Point> {
        let mut p = *self;
        p.convert_unit(unit, false)?;
        Ok(p)
    }

    fn convert_unit(&mut self, target: CoordinatesUnit, warn_noop: bool) -> GeoResult<()> {
        if !self.is_latlon() {
            return Err(GeoError::InvalidState(format!(
                "coordinates can only be converted to {target} under latlon, point is {}",
                self.reference
            )));
        }
        if self.unit == target {
            if warn_noop {
                log::warn!("point unit conversion: coordinates unit is already {target}");
            }
            return Ok(());
        }
        let convert: fn(f64) -> f64 = match target {
            CoordinatesUnit::Degrees => f64::to_degrees,
            CoordinatesUnit::Radians => f64::to_radians,
        };
        self.coords = [convert(self.coords[0]), convert(self.coords[1])];
        self.unit = target;
        Ok(())
    }

    // ── Projection ────────────────────────────────────────────────────────

    /// Copy of this point projected to cartesian kilometres.
    pub fn to_cartesian(&self) -> GeoResult<Point> {
        let mut p = *self;
        p.to_cartesian_in_place()?;
        Ok(p)
    }

    /// Project latlon coordinates with `x = R·lon`, `y = R·ln(tan(π/4 + lat/2))`,
    /// `R` in kilometres.  A cartesian point is left unchanged with a warning.
    pub fn to_cartesian_in_place(&mut self) -> GeoResult<()> {
        if !self.is_latlon() {
            log::warn!("point projection: geo reference system is already cartesian");
            return Ok(());
        }
        self.convert_unit(CoordinatesUnit::Radians, false)?;
        let [lon, lat] = self.coords;
        self.coords = [
            PROJECTION_RADIUS_KM * lon,
            PROJECTION_RADIUS_KM * (FRAC_PI_4 + lat / 2.0).tan().ln(),
        ];
        self.reference = GeoReferenceSystem::Cartesian;
        Ok(())
    }

    /// Copy of this point unprojected to latlon radians.
    pub fn to_latlon(&self) -> GeoResult<Point> {
        let mut p = *self;
        p.to_latlon_in_place()?;
        Ok(p)
    }

    /// Inverse of [`to_cartesian_in_place`](Self::to_cartesian_in_place); the
    /// result is in radians with the longitude wrapped to `(-π, π]`, so an
    /// `x` beyond `±R·π` lands on the opposite side.  A latlon point is left unchanged with a warning.
    pub fn to_latlon_in_place(&mut self) -> GeoResult<()> {
        if self.is_latlon() {
            log::warn!("point projection: geo reference system is already latlon");
            return Ok(());
        }
        let [x, y] = self.coords;
        self.coords = [
            wrap_lon(x / PROJECTION_RADIUS_KM),
            FRAC_PI_2 - 2.0 * (-y / PROJECTION_RADIUS_KM).exp().atan(),
        ];
        self.reference = GeoReferenceSystem::LatLon;
        self.unit = CoordinatesUnit::Radians;
        Ok(())
    }

    // ── Destination ───────────────────────────────────────────────────────

    /// Destination reached from this point after `distance_m` metres along
    /// initial bearing `bearing_rad`.  See [`add_vector_in_place`](Self::add_vector_in_place).
    pub fn add_vector(&self, distance_m: f64, bearing_rad: f64) -> GeoResult<Point> {
        let mut p = *self;
        p.add_vector_in_place(distance_m, bearing_rad)?;
        Ok(p)
    }

    /// Move this point along a great circle (direct geodesic problem on a
    /// sphere of radius [`EARTH_RADIUS_M`]).  The longitude is normalised to
    /// `(-π, π]` and the point keeps its unit.
    ///
    /// # Errors
    ///
    /// [`GeoError::NotSupported`] for cartesian points.
    pub fn add_vector_in_place(&mut self, distance_m: f64, bearing_rad: f64) -> GeoResult<()> {
        if !self.is_latlon() {
            return Err(GeoError::NotSupported(
                "adding a vector onto a cartesian point".into(),
            ));
        }
        let unit = self.unit;
        self.convert_unit(CoordinatesUnit::Radians, false)?;

        let [lon, lat] = self.coords;
        let angular = distance_m / EARTH_RADIUS_M;
        let lat2 = (lat.sin() * angular.cos() + lat.cos() * angular.sin() * bearing_rad.cos()).asin();
        let lon2 = lon
            + (bearing_rad.sin() * angular.sin() * lat.cos())
                .atan2(angular.cos() - lat.sin() * lat2.sin());
        self.coords = [wrap_lon(lon2), lat2];

        self.convert_unit(unit, false)
    }
}

/// Longitude in radians wrapped to `(-π, π]`.
fn wrap_lon(lon: f64) -> f64 {
    let wrapped = (lon + 3.0 * PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.coords[0], self.coords[1])
    }
}

/// Raw pairs become latlon points in radians, the default tags.
impl TryFrom<[f64; 2]> for Point {
    type Error = GeoError;

    fn try_from([x, y]: [f64; 2]) -> GeoResult<Self> {
        Self::new(x, y, GeoReferenceSystem::default(), CoordinatesUnit::default())
    }
}

impl TryFrom<&[f64]> for Point {
    type Error = GeoError;

    fn try_from(coords: &[f64]) -> GeoResult<Self> {
        Point::try_from(pair(coords)?)
    }
}

fn pair(coords: &[f64]) -> GeoResult<[f64; 2]> {
    <[f64; 2]>::try_from(coords).map_err(|_| {
        GeoError::InvalidArgument(format!(
            "coordinates need exactly two elements, got {}",
            coords.len()
        ))
    })
}
