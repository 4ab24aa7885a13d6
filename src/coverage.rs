//! One coverage run: a footprint dataset against the tile grid.
//!
//! Geometry input is validated before the artifact directory or the summary
//! table is touched, so a rejected dataset leaves no output behind.

use anyhow::{Context, Result};
use orbit_coverage_core::engine::{CoverageEngine, RunReport};
use orbit_coverage_core::models::{SatelliteId, TileGrid};
use orbit_coverage_core::naming::{summary_file_name, RunLabel};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::artifacts::FsArtifactStore;
use crate::config::Config;
use crate::footprints::load_footprints;
use crate::progress::{EngineProgress, ProgressReporter};
use crate::summary::CsvSummaryWriter;
use crate::tiles::load_tile_grid;

/// Result of a completed run.
#[derive(Debug)]
pub struct ComputeOutcome {
    pub run_label: RunLabel,
    pub summary_path: PathBuf,
    pub footprints: usize,
    pub skipped_non_nominal: usize,
    pub report: RunReport,
}

/// Runs the engine on one dataset and writes its artifacts and summary.
///
/// `run_label` overrides the label derived from the dataset.
pub fn compute_dataset(
    config: &Config,
    grid: &TileGrid,
    dataset: &Path,
    satellite: &SatelliteId,
    run_label: Option<RunLabel>,
    reporter: &dyn ProgressReporter,
) -> Result<ComputeOutcome> {
    let loaded = load_footprints(dataset, satellite)?;
    let run_label = run_label.or(loaded.run_label).ok_or_else(|| {
        anyhow::anyhow!(
            "Cannot derive a run label for {}; pass --run-label",
            dataset.display()
        )
    })?;

    let engine = CoverageEngine::new(grid, config.engine_options()?);
    let prepared = engine
        .prepare(&loaded.set)
        .with_context(|| format!("Rejected footprint dataset {}", dataset.display()))?;

    let store = FsArtifactStore::from_config(config)?;
    let summary_path = config
        .output
        .dir
        .join(summary_file_name(satellite, &run_label));
    let mut writer = CsvSummaryWriter::create(&summary_path)?;
    let progress = EngineProgress {
        reporter,
        satellite: satellite.to_string(),
    };

    let result = with_thread_pool(config.engine.threads, || {
        prepared.execute(&store, &mut writer, &progress)
    })?;
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            writer.abort();
            return Err(e).with_context(|| format!("Coverage run failed for {}", dataset.display()));
        }
    };
    let summary_path = writer.finish()?;

    if !report.failed_artifacts.is_empty() {
        warn!(
            failed = report.failed_artifacts.len(),
            "some artifacts could not be written; their rows are missing from the summary"
        );
    }
    info!(
        satellite = %satellite,
        run_label = %run_label,
        records = report.records,
        summary = %summary_path.display(),
        "coverage run complete"
    );

    Ok(ComputeOutcome {
        run_label,
        summary_path,
        footprints: loaded.set.len(),
        skipped_non_nominal: loaded.skipped_non_nominal,
        report,
    })
}

/// Runs `f` on a dedicated pool of `threads` workers, or the global pool
/// when `threads` is 0.
fn with_thread_pool<R, F>(threads: usize, f: F) -> Result<R>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    if threads == 0 {
        return Ok(f());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to build overlay thread pool")?;
    Ok(pool.install(f))
}

/// Entry point for `cov compute`.
pub fn run_compute(
    config: &Config,
    dataset: &Path,
    satellite: &str,
    run_label: Option<&str>,
    reporter: &dyn ProgressReporter,
) -> Result<()> {
    let satellite = SatelliteId::new(satellite)?;
    let run_label = run_label.map(RunLabel::parse).transpose()?;
    let grid = load_tile_grid(&config.grid)?;

    let outcome = compute_dataset(config, &grid, dataset, &satellite, run_label, reporter)?;
    print_outcome(&satellite, &grid, &outcome);
    println!("ok");
    Ok(())
}

pub fn print_outcome(satellite: &SatelliteId, grid: &TileGrid, outcome: &ComputeOutcome) {
    let report = &outcome.report;
    println!("compute {} {}", satellite, outcome.run_label);
    println!(
        "  footprints: {} (non-nominal skipped: {})",
        outcome.footprints, outcome.skipped_non_nominal
    );
    println!("  tiles: {}", grid.len());
    println!("  pairs evaluated: {}", report.pairs_evaluated);
    println!("  overlaps written: {}", report.records);
    println!("  degenerate contacts skipped: {}", report.degenerate_skipped);
    if !report.failed_artifacts.is_empty() {
        println!("  artifact failures: {}", report.failed_artifacts.len());
        for key in &report.failed_artifacts {
            println!("    {}", key);
        }
    }
    println!("  summary: {}", outcome.summary_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use orbit_coverage_core::error::GeometryInputError;
    use std::fs;
    use tempfile::TempDir;

    const GRID: &str = r#"{"type":"FeatureCollection",
        "crs":{"type":"name","properties":{"name":"EPSG:32631"}},
        "features":[
          {"type":"Feature","properties":{"Name":"T1"},
           "geometry":{"type":"Polygon","coordinates":[[[0,0],[10000,0],[10000,10000],[0,10000],[0,0]]]}}
        ]}"#;

    fn footprints(crs: &str) -> String {
        format!(
            r#"{{"type":"FeatureCollection",
            "crs":{{"type":"name","properties":{{"name":"{}"}}}},
            "features":[
              {{"type":"Feature","properties":{{"mode":"NOMINAL","relative_orbit":"022","begin":"2024-01-01","end":"2024-01-01"}},
               "geometry":{{"type":"Polygon","coordinates":[[[5000,-5000],[15000,-5000],[15000,15000],[5000,15000],[5000,-5000]]]}}}}
            ]}}"#,
            crs
        )
    }

    fn setup(tmp: &TempDir, footprint_crs: &str) -> (Config, PathBuf) {
        let grid_path = tmp.path().join("tiles.geojson");
        fs::write(&grid_path, GRID).unwrap();
        let dataset = tmp.path().join("plan.geojson");
        fs::write(&dataset, footprints(footprint_crs)).unwrap();
        (Config::minimal(&grid_path, &tmp.path().join("out")), dataset)
    }

    #[test]
    fn half_covered_tile() {
        let tmp = TempDir::new().unwrap();
        let (config, dataset) = setup(&tmp, "EPSG:32631");
        let grid = load_tile_grid(&config.grid).unwrap();
        let satellite = SatelliteId::new("S2A").unwrap();

        let outcome =
            compute_dataset(&config, &grid, &dataset, &satellite, None, &NoProgress).unwrap();
        assert_eq!(outcome.report.records, 1);
        assert_eq!(outcome.run_label.as_str(), "20240101_20240101");
        assert!(config
            .artifact_root()
            .join("T1_022_2024-01-01_S2A.geojson")
            .exists());

        let summary = fs::read_to_string(&outcome.summary_path).unwrap();
        let row = summary.lines().nth(1).unwrap();
        assert!(row.starts_with("T1,022,50.000000,100.000000,50.000000,"), "{}", row);
    }

    #[test]
    fn crs_mismatch_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let (config, dataset) = setup(&tmp, "EPSG:32632");
        let grid = load_tile_grid(&config.grid).unwrap();
        let satellite = SatelliteId::new("S2A").unwrap();

        let err = compute_dataset(&config, &grid, &dataset, &satellite, None, &NoProgress)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GeometryInputError>(),
            Some(GeometryInputError::CrsMismatch { .. })
        ));
        assert!(!config.output.dir.exists());
    }

    #[test]
    fn explicit_label_and_thread_pool() {
        let tmp = TempDir::new().unwrap();
        let (mut config, dataset) = setup(&tmp, "EPSG:32631");
        config.engine.threads = 2;
        let grid = load_tile_grid(&config.grid).unwrap();
        let satellite = SatelliteId::new("S2A").unwrap();
        let label = RunLabel::parse("20240101_20240131").unwrap();

        let outcome =
            compute_dataset(&config, &grid, &dataset, &satellite, Some(label), &NoProgress)
                .unwrap();
        assert_eq!(
            outcome.summary_path,
            config.output.dir.join("results_S2A_20240101_20240131.csv")
        );
    }
}
