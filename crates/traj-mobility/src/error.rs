//! Error types for traj-mobility.

use thiserror::Error;

use traj_core::GeoError;
use traj_route::RouteError;
use traj_spatial::SpatialError;

/// Errors produced by the mobility model and its stores.
#[derive(Debug, Error)]
pub enum MobilityError {
    /// `ingest_timed_route` on a route without timestamps.
    #[error("route has no timestamps to derive a weekday from")]
    MissingTimestamps,

    /// A persisted row could not be turned back into a record.
    #[error("corrupt {table} row: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Route(#[from] RouteError),

    /// Collaborator failure that is not a per-pair miss.
    #[error("collaborator failed: {0}")]
    Spatial(#[from] SpatialError),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Alias for `Result<T, MobilityError>`.
pub type MobilityResult<T> = Result<T, MobilityError>;
