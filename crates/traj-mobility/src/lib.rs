//! `traj-mobility` — segment-to-segment mobility model built from routes.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                         |
//! |--------------|------------------------------------------------------------------|
//! | [`record`]   | `TransitionKey`, `TransitionRecord`, `Transition`, `LocationRecord` |
//! | [`store`]    | `ModelStore` trait, `MemoryStore`                                |
//! | [`sqlite`]   | `SqliteStore` (feature = `"sqlite"`)                             |
//! | [`model`]    | `MobilityModel<G, R, S>`, `IngestReport`                         |
//! | [`config`]   | `ModelConfig` (TOML)                                             |
//! | [`export`]   | `export_csv` / `import_csv`                                      |
//! | [`parallel`] | `ingest_partitioned` (feature = `"parallel"`)                    |
//! | [`error`]    | `MobilityError`, `MobilityResult<T>`                             |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                        |
//! |------------|---------------------------------------------------------------|
//! | `sqlite`   | Durable store via `rusqlite` (default).                       |
//! | `parallel` | Weekday-partitioned ingestion on the Rayon pool.              |
//! | `serde`    | Derives `Serialize`/`Deserialize` on the geometry types.      |
//!
//! # Model
//!
//! For every `(segment_from, weekday)` the outgoing transition probabilities
//! are `count / Σcount`.  Probabilities are rebuilt wholesale by
//! [`MobilityModel::finalize_probabilities`], never updated incrementally.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod record;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "parallel")]
pub mod parallel;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_FALLBACK_SPEED_KMH, ModelConfig};
pub use error::{MobilityError, MobilityResult};
pub use export::{export_csv, import_csv};
pub use model::{IngestReport, MobilityModel};
pub use record::{LocationRecord, Transition, TransitionKey, TransitionRecord, transition_probabilities};
pub use store::{MemoryStore, ModelStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "parallel")]
pub use parallel::ingest_partitioned;
