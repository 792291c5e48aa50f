//! Geodata error type.
//!
//! Sub-crates define their own error enums and wrap `GeoError` as one
//! variant via `#[from]`, so a failed point operation surfaces unchanged
//! through `Route` and mobility-model calls.

use thiserror::Error;

/// Errors produced by point construction and geometry functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// Malformed input: wrong coordinate count, non-finite values, values
    /// outside the declared unit's range, unknown reference-system or unit
    /// names, out-of-range timestamps.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not valid for the point's current reference system
    /// (e.g. bearing between cartesian points).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The operation has no defined meaning for the given reference system
    /// (e.g. adding a geodesic vector to a cartesian point).
    #[error("not supported: {0}")]
    NotSupported(String),
}

/// Shorthand result type for geodata operations.
pub type GeoResult<T> = Result<T, GeoError>;
