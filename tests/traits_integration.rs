//! Integration tests for the extension traits.
//!
//! A custom `FootprintSource` and a custom `ArtifactStore` are driven
//! through the same loading, overlay and summary code the CLI uses.

use anyhow::Result;
use async_trait::async_trait;
use orbit_coverage::artifacts::FsArtifactStore;
use orbit_coverage::config::Config;
use orbit_coverage::coverage::compute_dataset;
use orbit_coverage::footprints::load_footprints;
use orbit_coverage::ingest::run_sync_with_source;
use orbit_coverage::ledger::Ledger;
use orbit_coverage::progress::NoProgress;
use orbit_coverage::summary::CsvSummaryWriter;
use orbit_coverage::tiles::load_tile_grid;
use orbit_coverage::traits::{DatasetHandle, FootprintSource};
use orbit_coverage_core::engine::{ArtifactRequest, ArtifactStore, CoverageEngine, Silent};
use orbit_coverage_core::error::ArtifactWriteError;
use orbit_coverage_core::models::SatelliteId;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const GRID: &str = r#"{"type":"FeatureCollection",
"crs":{"type":"name","properties":{"name":"EPSG:32631"}},
"features":[
  {"type":"Feature","properties":{"Name":"T1"},
   "geometry":{"type":"Polygon","coordinates":[[[0,0],[10000,0],[10000,10000],[0,10000],[0,0]]]}},
  {"type":"Feature","properties":{"Name":"T2"},
   "geometry":{"type":"Polygon","coordinates":[[[10000,0],[20000,0],[20000,10000],[10000,10000],[10000,0]]]}}
]}"#;

/// Covers the right half of T1 and the left half of T2.
const PLAN: &str = r#"{"type":"FeatureCollection",
"crs":{"type":"name","properties":{"name":"EPSG:32631"}},
"features":[
  {"type":"Feature","properties":{"mode":"NOMINAL","relative_orbit":"051","begin":"2024-02-01T10:00:00","end":"2024-02-01T10:05:00"},
   "geometry":{"type":"Polygon","coordinates":[[[5000,0],[15000,0],[15000,10000],[5000,10000],[5000,0]]]}}
]}"#;

fn setup(tmp: &TempDir) -> Config {
    let grid = tmp.path().join("tiles.geojson");
    fs::write(&grid, GRID).unwrap();
    Config::minimal(&grid, &tmp.path().join("out"))
}

// ─── Test ArtifactStore ─────────────────────────────────────────────

/// Writes through to the filesystem store except for one tile.
struct FlakyStore {
    inner: FsArtifactStore,
    broken_tile: &'static str,
}

impl ArtifactStore for FlakyStore {
    fn put(&self, artifact: &ArtifactRequest<'_>) -> Result<String, ArtifactWriteError> {
        if artifact.tile_id == self.broken_tile {
            return Err(ArtifactWriteError {
                key: artifact.key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.inner.put(artifact)
    }
}

#[test]
fn failed_artifact_drops_only_its_summary_row() {
    let tmp = TempDir::new().unwrap();
    let config = setup(&tmp);
    let dataset = tmp.path().join("plan.geojson");
    fs::write(&dataset, PLAN).unwrap();

    let grid = load_tile_grid(&config.grid).unwrap();
    let satellite = SatelliteId::new("S2B").unwrap();
    let loaded = load_footprints(&dataset, &satellite).unwrap();

    let engine = CoverageEngine::new(&grid, config.engine_options().unwrap());
    let run = engine.prepare(&loaded.set).unwrap();
    let store = FlakyStore {
        inner: FsArtifactStore::from_config(&config).unwrap(),
        broken_tile: "T2",
    };
    let summary_path = config.output.dir.join("summary.csv");
    let mut writer = CsvSummaryWriter::create(&summary_path).unwrap();
    let report = run.execute(&store, &mut writer, &Silent).unwrap();
    writer.finish().unwrap();

    assert_eq!(report.records, 1);
    assert_eq!(
        report.failed_artifacts,
        vec!["T2_051_20240201T100000_S2B".to_string()]
    );

    let summary = fs::read_to_string(&summary_path).unwrap();
    let rows: Vec<&str> = summary.lines().skip(1).collect();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("T1,051,50.000000,100.000000,50.000000,"), "{}", rows[0]);

    let artifacts = config.artifact_root();
    assert!(artifacts.join("T1_051_20240201T100000_S2B.geojson").exists());
    assert!(!artifacts.join("T2_051_20240201T100000_S2B.geojson").exists());
}

// ─── Test FootprintSource ───────────────────────────────────────────

/// Serves plans held in memory. `unreachable` plans are listed but fail to fetch.
struct InMemorySource {
    plans: Vec<(SatelliteId, String, String)>, // (satellite, file name, body)
    unreachable: Vec<(SatelliteId, String)>,
}

#[async_trait]
impl FootprintSource for InMemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn location(&self) -> String {
        "memory://plans".to_string()
    }

    async fn list_available(&self) -> Result<Vec<DatasetHandle>> {
        let listed = self
            .plans
            .iter()
            .map(|(satellite, file_name, _)| (satellite, file_name))
            .chain(self.unreachable.iter().map(|(satellite, file_name)| (satellite, file_name)));
        let mut handles: Vec<DatasetHandle> = listed
            .map(|(satellite, file_name)| DatasetHandle {
                satellite: satellite.clone(),
                file_name: file_name.clone(),
                locator: format!("memory://plans/{}", file_name),
            })
            .collect();
        handles.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(handles)
    }

    async fn fetch(&self, handle: &DatasetHandle, download_dir: &Path) -> Result<PathBuf> {
        let (_, _, body) = self
            .plans
            .iter()
            .find(|(_, name, _)| *name == handle.file_name)
            .ok_or_else(|| anyhow::anyhow!("no plan named {}", handle.file_name))?;
        tokio::fs::create_dir_all(download_dir).await?;
        let path = download_dir.join(&handle.file_name);
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

#[tokio::test]
async fn custom_source_feeds_a_coverage_run() {
    let tmp = TempDir::new().unwrap();
    let config = setup(&tmp);
    let satellite = SatelliteId::new("S2B").unwrap();
    let source = InMemorySource {
        plans: vec![(
            satellite.clone(),
            "S2B_MP_ACQ__KML_20240201T120000_20240219T150000.geojson".to_string(),
            PLAN.to_string(),
        )],
        unreachable: vec![],
    };

    assert!(source.health().await.is_ok());
    let handles = source.list_available().await.unwrap();
    assert_eq!(handles.len(), 1);

    let path = source
        .fetch(&handles[0], &tmp.path().join("downloads"))
        .await
        .unwrap();
    let grid = load_tile_grid(&config.grid).unwrap();
    let outcome =
        compute_dataset(&config, &grid, &path, &handles[0].satellite, None, &NoProgress).unwrap();

    assert_eq!(outcome.run_label.as_str(), "20240201_20240219");
    assert_eq!(outcome.report.records, 2);
    assert_eq!(
        outcome.summary_path,
        config.output.dir.join("results_S2B_20240201_20240219.csv")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_continues_past_a_dataset_that_cannot_be_fetched() {
    let tmp = TempDir::new().unwrap();
    let mut config = setup(&tmp);
    config.ledger.path = tmp.path().join("data").join("cov.sqlite");
    config.ingest.download_dir = tmp.path().join("downloads");

    let satellite = SatelliteId::new("S2B").unwrap();
    let good = "S2B_MP_ACQ__KML_20240201T120000_20240219T150000.geojson";
    // Sorts before the good plan, so it is attempted first.
    let gone = "S2B_MP_ACQ__KML_20240115T120000_20240201T150000.geojson";
    let source = InMemorySource {
        plans: vec![(satellite.clone(), good.to_string(), PLAN.to_string())],
        unreachable: vec![(satellite, gone.to_string())],
    };

    let err = run_sync_with_source(&config, &source, None, false, false, &NoProgress)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains(gone), "{:#}", err);

    assert!(config
        .output
        .dir
        .join("results_S2B_20240201_20240219.csv")
        .exists());
    let ledger = Ledger::open(&config).await.unwrap();
    assert!(ledger.entry(good).await.unwrap().unwrap().is_processed());
    assert!(ledger.entry(gone).await.unwrap().is_none());
    ledger.close().await;

    // The good plan is done; only the unreachable one is retried.
    let err = run_sync_with_source(&config, &source, None, false, false, &NoProgress)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("1 dataset(s) failed"), "{:#}", err);
}
