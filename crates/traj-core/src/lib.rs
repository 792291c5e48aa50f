//! `traj-core` — foundational geodata types for the trajectory workspace.
//!
//! This crate is a dependency of every other `traj-*` crate.  It has no
//! `traj-*` dependencies and few external ones (`chrono`, `log`,
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                                    |
//! |-----------------|-------------------------------------------------------------|
//! | [`point`]       | `Point`, `GeoReferenceSystem`, `CoordinatesUnit`            |
//! | [`geometry`]    | bearing, distance, destination, interpolation               |
//! | [`timed`]       | `TimedPoint`, `Timestamp`                                   |
//! | [`ids`]         | `SegmentId`, weekday index helpers                          |
//! | [`error`]       | `GeoError`, `GeoResult`                                     |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod error;
pub mod geometry;
pub mod ids;
pub mod point;
pub mod timed;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{GeoError, GeoResult};
pub use geometry::{
    get_bearing, get_distance, get_interpolated_point, get_interpolated_timed_point,
};
pub use ids::{SegmentId, weekday_from_index, weekday_index};
pub use point::{CoordinatesUnit, EARTH_RADIUS_M, GeoReferenceSystem, Point};
pub use timed::{TimedPoint, Timestamp};

/// Re-exported so downstream crates name the same weekday type.
pub use chrono::Weekday;
