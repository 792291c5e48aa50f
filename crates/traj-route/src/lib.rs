//! `traj-route` — ordered point sequences and their I/O.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                      |
//! |------------|---------------------------------------------------------------|
//! | [`route`]  | `Route`, `Waypoint`, `Bounds`                                 |
//! | [`codec`]  | `[[x, y], …]` text form used by persisted location tables     |
//! | [`loader`] | `Trip`, `load_trips_csv` / `load_trips_reader`                |
//! | [`error`]  | `RouteError`, `RouteResult<T>`                                |
//!
//! # Homogeneity
//!
//! Every element of a [`Route`] shares one reference system and one unit,
//! and either every element carries a timestamp or none does.  Timed routes
//! stay sorted by timestamp after every mutation.

pub mod codec;
pub mod error;
pub mod loader;
pub mod route;


pub use error::{RouteError, RouteResult};
pub use loader::{Trip, load_trips_csv, load_trips_reader};
pub use route::{Bounds, Route, Waypoint};
