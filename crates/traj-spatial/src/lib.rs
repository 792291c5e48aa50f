//! `traj-spatial` — the geocoding and routing collaborators of the mobility
//! model.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                   |
//! |--------------|------------------------------------------------------------|
//! | [`geocoder`] | `Geocoder` trait, `SegmentIndex` (R-tree), `SegmentIndexBuilder`, `load_segments_csv` |
//! | [`router`]   | `Router` trait, `ShortestRoute`, `StraightLineRouter`, `straight_line` |
//! | [`error`]    | `SpatialError`, `SpatialResult<T>`                         |
//!
//! Both traits are `Send + Sync` so a single instance can back several
//! ingestion workers.  Implementations backed by remote services belong to
//! the application; the types here are local and deterministic.

pub mod error;
pub mod geocoder;
pub mod router;


pub use error::{SpatialError, SpatialResult};
pub use geocoder::{Geocoder, SegmentIndex, SegmentIndexBuilder, load_segments_csv, load_segments_reader};
pub use router::{Router, ShortestRoute, StraightLineRouter, straight_line};
