//! Route error type.

use thiserror::Error;

use traj_core::GeoError;

/// Errors produced by `traj-route`.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Reference-system or timestamp mismatch on insertion.
    #[error("incompatible append: {0}")]
    IncompatibleAppend(String),

    /// Operation not defined for the route's composition.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("index {index} out of range for route of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error("coordinate codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("trip parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RouteResult<T> = Result<T, RouteError>;
