//! Routing trait and the straight-line estimate.
//!
//! # Pluggability
//!
//! The mobility model calls routing through the [`Router`] trait, so an
//! application can plug in a road-network engine or a remote routing service
//! without touching the aggregator.  [`StraightLineRouter`] needs no network
//! and is what the aggregator falls back to when a router query fails.

use traj_core::{Point, get_distance};
use traj_route::Route;

use crate::{SpatialError, SpatialResult};

// ── ShortestRoute ─────────────────────────────────────────────────────────────

/// Result of a routing query.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestRoute {
    pub distance_m: f64,
    pub duration_s: f64,
    /// Path geometry, source first.
    pub geometry:   Route,
}

// ── Router trait ──────────────────────────────────────────────────────────────

/// Pluggable routing collaborator.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync` so they can be shared across Rayon
/// worker threads during partitioned ingestion.
pub trait Router: Send + Sync {
    /// Shortest route from `from` to `to` (latlon, degrees).
    ///
    /// Per-query failures should be [`SpatialError::NoRoute`] or
    /// [`SpatialError::Unavailable`]; callers treat those as recoverable.
    fn shortest_route(&self, from: &Point, to: &Point) -> SpatialResult<ShortestRoute>;
}

impl<R: Router + ?Sized> Router for &R {
    fn shortest_route(&self, from: &Point, to: &Point) -> SpatialResult<ShortestRoute> {
        (**self).shortest_route(from, to)
    }
}

// ── Straight line ─────────────────────────────────────────────────────────────

/// Great-circle estimate: haversine distance, duration at `speed_kmh`, and a
/// two-point geometry.
///
/// # Errors
///
/// [`SpatialError::InvalidSpeed`] unless `speed_kmh` is positive and finite.
pub fn straight_line(from: &Point, to: &Point, speed_kmh: f64) -> SpatialResult<ShortestRoute> {
    check_speed(speed_kmh)?;
    let distance_m = get_distance(from, to)?;
    Ok(ShortestRoute {
        distance_m,
        duration_s: distance_m / (speed_kmh / 3.6),
        geometry:   Route::from_waypoints([*from, *to])?,
    })
}

fn check_speed(speed_kmh: f64) -> SpatialResult<()> {
    if speed_kmh > 0.0 && speed_kmh.is_finite() {
        Ok(())
    } else {
        Err(SpatialError::InvalidSpeed(speed_kmh))
    }
}

/// [`Router`] that never consults a network: every query is answered by
/// [`straight_line`] at a fixed speed.
#[derive(Debug, Clone, Copy)]
pub struct StraightLineRouter {
    speed_kmh: f64,
}

impl StraightLineRouter {
    pub fn new(speed_kmh: f64) -> SpatialResult<Self> {
        check_speed(speed_kmh)?;
        Ok(Self { speed_kmh })
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }
}

impl Router for StraightLineRouter {
    fn shortest_route(&self, from: &Point, to: &Point) -> SpatialResult<ShortestRoute> {
        straight_line(from, to, self.speed_kmh)
    }
}
