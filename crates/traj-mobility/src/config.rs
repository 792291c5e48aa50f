//! Model configuration.
//!
//! ```toml
//! fallback_speed_kmh  = 45.0
//! database            = "model.db"
//! export_dir          = "out"
//! max_snap_distance_m = 150.0
//! ```
//!
//! Every key is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{MobilityError, MobilityResult};

/// Speed assumed for a leg whose router query failed.
pub const DEFAULT_FALLBACK_SPEED_KMH: f64 = 45.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Average speed used to derive a duration from the straight-line
    /// distance when routing fails.
    pub fallback_speed_kmh: f64,

    /// SQLite database file.  `None` keeps the model in memory.
    pub database: Option<PathBuf>,

    /// Directory that receives `transitions.csv` and `locations.csv`.
    pub export_dir: Option<PathBuf>,

    /// Geocoder matches farther than this are treated as misses.
    pub max_snap_distance_m: Option<f64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            fallback_speed_kmh:  DEFAULT_FALLBACK_SPEED_KMH,
            database:            None,
            export_dir:          None,
            max_snap_distance_m: None,
        }
    }
}

impl ModelConfig {
    pub fn from_toml_str(text: &str) -> MobilityResult<Self> {
        let config: ModelConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> MobilityResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject speeds and distances that are not positive and finite.
    pub fn validate(&self) -> MobilityResult<()> {
        if !(self.fallback_speed_kmh > 0.0 && self.fallback_speed_kmh.is_finite()) {
            return Err(MobilityError::Config(format!(
                "fallback_speed_kmh must be positive, got {}",
                self.fallback_speed_kmh
            )));
        }
        if let Some(d) = self.max_snap_distance_m {
            if !(d > 0.0 && d.is_finite()) {
                return Err(MobilityError::Config(format!(
                    "max_snap_distance_m must be positive, got {d}"
                )));
            }
        }
        Ok(())
    }
}
