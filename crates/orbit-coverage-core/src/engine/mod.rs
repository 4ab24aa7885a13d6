//! The coverage engine.
//!
//! A run is split in two steps. [`CoverageEngine::prepare`] checks the
//! footprint set against the grid and fails with a
//! [`GeometryInputError`] before any output exists. [`PreparedRun::execute`]
//! then performs the cross join, persisting one artifact per overlap through
//! an [`ArtifactStore`] and streaming one row per overlap into a
//! [`RecordSink`].
//!
//! Output order is deterministic: tiles in grid order, and for each tile the
//! footprints in input order. Tiles are overlaid in parallel one batch at a
//! time, so memory is bounded by the batch size rather than the grid.
//!
//! An artifact that cannot be written is logged and counted; its record is
//! left out of the summary and the run continues.

pub mod memory;

use geo::MultiPolygon;
use tracing::{debug, warn};

use crate::crs::{AreaUnit, Crs};
use crate::error::{ArtifactWriteError, CoverageError, GeometryInputError};
use crate::models::{FootprintSet, OrbitFootprint, OverlapRecord, TileGrid};
use crate::naming::ArtifactNaming;
use crate::overlay::Overlay;

pub use memory::{MemoryArtifactStore, VecSink};

/// Default number of tiles overlaid per parallel batch.
pub const DEFAULT_BATCH_TILES: usize = 256;

/// Everything an [`ArtifactStore`] needs to persist one overlap.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactRequest<'a> {
    pub key: &'a str,
    pub crs: Crs,
    pub tile_id: &'a str,
    pub footprint: &'a OrbitFootprint,
    pub geometry: &'a MultiPolygon<f64>,
}

/// Destination for intersection geometries.
///
/// Writes must overwrite any artifact previously stored under the same key
/// so that re-running a computation is idempotent.
pub trait ArtifactStore: Send + Sync {
    /// Persists one artifact and returns its reference (path or URL).
    fn put(&self, artifact: &ArtifactRequest<'_>) -> Result<String, ArtifactWriteError>;
}

/// Destination for summary rows, appended in processing order.
pub trait RecordSink {
    fn append(&mut self, record: &OverlapRecord) -> std::io::Result<()>;
}

/// Progress callback, invoked after each batch of tiles.
pub trait RunProgress {
    fn tiles_done(&self, done: u64, total: u64);
}

/// Progress sink that ignores every update.
pub struct Silent;

impl RunProgress for Silent {
    fn tiles_done(&self, _done: u64, _total: u64) {}
}

/// Engine settings that are fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub naming: ArtifactNaming,
    pub area_unit: AreaUnit,
    pub batch_tiles: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            naming: ArtifactNaming::default(),
            area_unit: AreaUnit::default(),
            batch_tiles: DEFAULT_BATCH_TILES,
        }
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Tile × footprint pairs considered.
    pub pairs_evaluated: u64,
    /// Rows appended to the summary.
    pub records: u64,
    /// Pairs that touched without overlapping.
    pub degenerate_skipped: u64,
    /// Keys of artifacts that could not be written.
    pub failed_artifacts: Vec<String>,
}

/// Coverage engine bound to a tile grid.
pub struct CoverageEngine<'g> {
    grid: &'g TileGrid,
    options: EngineOptions,
}

impl<'g> CoverageEngine<'g> {
    pub fn new(grid: &'g TileGrid, options: EngineOptions) -> Self {
        Self { grid, options }
    }

    pub fn grid(&self) -> &TileGrid {
        self.grid
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Validates a footprint set against the grid.
    pub fn prepare<'a>(
        &'a self,
        footprints: &'a FootprintSet,
    ) -> Result<PreparedRun<'a>, GeometryInputError> {
        let overlay = Overlay::new(self.grid, footprints)?;
        if footprints.is_empty() {
            warn!("no footprints supplied; the summary table will have no rows");
        }
        Ok(PreparedRun {
            engine: self,
            overlay,
        })
    }
}

/// A validated run, ready to execute.
pub struct PreparedRun<'a> {
    engine: &'a CoverageEngine<'a>,
    overlay: Overlay<'a>,
}

impl PreparedRun<'_> {
    /// Performs the full cross join.
    pub fn execute(
        &self,
        store: &dyn ArtifactStore,
        sink: &mut dyn RecordSink,
        progress: &dyn RunProgress,
    ) -> Result<RunReport, CoverageError> {
        let options = &self.engine.options;
        let tiles = self.engine.grid.tiles();
        let total = tiles.len() as u64;
        let footprint_count = self.overlay.footprint_count() as u64;
        let crs = self.overlay.crs();

        let mut report = RunReport::default();
        let mut done = 0u64;

        for batch in tiles.chunks(options.batch_tiles.max(1)) {
            for result in self.overlay.batch(batch) {
                report.pairs_evaluated += footprint_count;
                report.degenerate_skipped += result.degenerate;

                for overlap in &result.overlaps {
                    let tile = overlap.tile;
                    let footprint = overlap.footprint;
                    let key = options.naming.key(&tile.id, footprint);
                    let request = ArtifactRequest {
                        key: &key,
                        crs,
                        tile_id: &tile.id,
                        footprint,
                        geometry: &overlap.geometry,
                    };
                    let reference = match store.put(&request) {
                        Ok(reference) => reference,
                        Err(e) => {
                            warn!(
                                key = %e.key,
                                error = %e.source,
                                "artifact write failed; record omitted from summary"
                            );
                            report.failed_artifacts.push(e.key);
                            continue;
                        }
                    };

                    let record = OverlapRecord {
                        tile_id: tile.id.clone(),
                        relative_orbit_id: footprint.relative_orbit_id.clone(),
                        satellite_id: footprint.satellite_id.clone(),
                        intersection_geometry: overlap.geometry.clone(),
                        intersection_area: options.area_unit.from_square_metres(overlap.area),
                        tile_area: options.area_unit.from_square_metres(tile.area),
                        coverage_percentage: overlap.percentage(),
                        begin: footprint.begin,
                        end: footprint.end,
                        artifact_reference: reference,
                    };
                    sink.append(&record).map_err(CoverageError::Summary)?;
                    report.records += 1;
                }
                done += 1;
            }
            debug!(done, total, "tile batch complete");
            progress.tiles_done(done, total);
        }

        Ok(report)
    }
}

/// Runs the engine end to end and returns every record it produced.
///
/// Convenience wrapper over [`CoverageEngine::prepare`] and
/// [`PreparedRun::execute`] that collects the summary in memory.
pub fn compute_coverage(
    grid: &TileGrid,
    footprints: &FootprintSet,
    options: EngineOptions,
    store: &dyn ArtifactStore,
) -> Result<(Vec<OverlapRecord>, RunReport), CoverageError> {
    let engine = CoverageEngine::new(grid, options);
    let run = engine.prepare(footprints)?;
    let mut sink = VecSink::default();
    let report = run.execute(store, &mut sink, &Silent)?;
    Ok((sink.into_records(), report))
}
