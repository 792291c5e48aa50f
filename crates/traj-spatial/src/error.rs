//! Spatial-subsystem error type.

use thiserror::Error;

use traj_core::GeoError;
use traj_route::RouteError;

/// Errors produced by `traj-spatial` and by collaborator implementations.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The geocoder found no segment for the point.
    #[error("no segment matches {0}")]
    NoMatch(String),

    #[error("no route from {from} to {to}")]
    NoRoute { from: String, to: String },

    /// Remote service failure (timeout, HTTP error, malformed reply).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("speed must be positive and finite, got {0} km/h")]
    InvalidSpeed(f64),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("segment parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpatialError {
    /// `true` for per-query failures a caller may skip or replace with an
    /// estimate, including transport and reply-parsing failures inside a
    /// collaborator; `false` for errors in the caller's own input or setup.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SpatialError::NoMatch(_)
                | SpatialError::NoRoute { .. }
                | SpatialError::Unavailable(_)
                | SpatialError::Parse(_)
                | SpatialError::Io(_)
        )
    }
}

pub type SpatialResult<T> = Result<T, SpatialError>;
