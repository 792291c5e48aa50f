//! `traj-ingest` — build a mobility model from GPS trips.
//!
//! ```text
//! traj-ingest --trips trips.csv --segments segments.csv --db model.db --export-dir out/
//! ```
//!
//! Each trip is ingested on the weekday it started.  Legs are timed with a
//! straight-line router at the configured fallback speed.  Log level comes
//! from `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use traj_mobility::{
    IngestReport, MemoryStore, MobilityModel, ModelConfig, ModelStore, SqliteStore, export_csv,
};
use traj_route::{Trip, load_trips_csv};
use traj_spatial::{SegmentIndex, StraightLineRouter, load_segments_csv};

#[derive(Parser, Debug)]
#[command(name = "traj-ingest", version, about = "Build a segment mobility model from GPS trips")]
struct Args {
    /// Trip fixes: `trip_id,timestamp,lon,lat` (Unix seconds, degrees).
    #[arg(long)]
    trips: PathBuf,

    /// Segment anchors: `segment_id,lon,lat` (degrees).
    #[arg(long)]
    segments: PathBuf,

    /// SQLite database to create or extend.  Overrides the config file.
    #[arg(long)]
    db: Option<PathBuf>,

    /// TOML model configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write `transitions.csv` and `locations.csv` here.  Overrides the config file.
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Drop trips whose fastest leg exceeds this speed.
    #[arg(long)]
    max_speed_kmh: Option<f64>,

    /// Geocoder snap radius in metres.  Overrides the config file.
    #[arg(long)]
    max_snap_m: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ModelConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ModelConfig::default(),
    };
    if args.db.is_some() {
        config.database = args.db.clone();
    }
    if args.export_dir.is_some() {
        config.export_dir = args.export_dir.clone();
    }
    if args.max_snap_m.is_some() {
        config.max_snap_distance_m = args.max_snap_m;
    }
    config.validate()?;

    let index = load_segments_csv(&args.segments)
        .with_context(|| format!("loading segments from {}", args.segments.display()))?
        .with_max_snap_m(config.max_snap_distance_m);
    log::info!("segment index: {} anchors", index.len());

    let mut trips = load_trips_csv(&args.trips)
        .with_context(|| format!("loading trips from {}", args.trips.display()))?;
    log::info!("loaded {} trips", trips.len());
    if let Some(limit) = args.max_speed_kmh {
        if !(limit > 0.0) {
            bail!("--max-speed-kmh must be positive, got {limit}");
        }
        let before = trips.len();
        trips = filter_by_speed(trips, limit)?;
        log::info!("dropped {} trips faster than {limit} km/h", before - trips.len());
    }

    let router = StraightLineRouter::new(config.fallback_speed_kmh)?;
    match config.database.clone() {
        Some(path) => {
            let store = SqliteStore::open(&path)
                .with_context(|| format!("opening database {}", path.display()))?;
            let store = build(store, &index, router, &config, &trips)?;
            store.checkpoint()?;
        }
        None => {
            build(MemoryStore::new(), &index, router, &config, &trips)?;
        }
    }
    Ok(())
}

/// Ingest every trip into `store`, finalize, and export if configured.
fn build<S: ModelStore>(
    store:  S,
    index:  &SegmentIndex,
    router: StraightLineRouter,
    config: &ModelConfig,
    trips:  &[Trip],
) -> Result<S> {
    let mut model = MobilityModel::new(index, router, store).with_config(config.clone());
    let mut total = IngestReport::default();

    for trip in trips {
        let report = model
            .ingest_timed_route(&trip.route)
            .with_context(|| format!("ingesting trip {}", trip.trip_id))?;
        if report.pairs_skipped > 0 {
            log::debug!("trip {}: {} pairs skipped", trip.trip_id, report.pairs_skipped);
        }
        total += report;
    }
    model.finalize_probabilities()?;

    log::info!(
        "{} trips: {} pairs ingested, {} skipped, {} router fallbacks",
        model.routes_ingested(),
        total.pairs_ingested,
        total.pairs_skipped,
        total.fallbacks
    );

    if let Some(dir) = &config.export_dir {
        export_csv(model.store(), dir).with_context(|| format!("exporting to {}", dir.display()))?;
    }
    Ok(model.into_store())
}

/// Keep trips whose top speed, at the trip's mean fix interval, is within
/// `limit_kmh`.  Trips with fewer than two fixes or no elapsed time are kept.
fn filter_by_speed(trips: Vec<Trip>, limit_kmh: f64) -> Result<Vec<Trip>> {
    let mut kept = Vec::with_capacity(trips.len());
    for trip in trips {
        let Some(interval) = mean_interval(&trip) else {
            kept.push(trip);
            continue;
        };
        let speed = trip.route.max_speed(interval)?;
        if speed <= limit_kmh {
            kept.push(trip);
        } else {
            log::debug!("trip {} dropped: {speed:.1} km/h", trip.trip_id);
        }
    }
    Ok(kept)
}

fn mean_interval(trip: &Trip) -> Option<Duration> {
    let times = trip.route.timestamps()?;
    let (first, last) = (times.first()?, times.last()?);
    let gaps = times.len().checked_sub(1).filter(|&n| n > 0)?;
    let secs = (*last - *first).num_milliseconds() as f64 / 1000.0 / gaps as f64;
    (secs > 0.0).then(|| Duration::from_secs_f64(secs))
}
