//! TOML configuration.
//!
//! ```toml
//! [grid]
//! path = "data/tiles_s2.geojson"
//! id_property = "Name"
//!
//! [output]
//! dir = "out"
//! artifact_naming = "{tile}_{orbit}_{begin}_{satellite}"
//! # base_url = "https://example.org/getCoverage/intersections"
//! area_unit = "km2"
//!
//! [ledger]
//! path = "data/cov.sqlite"
//!
//! [ingest]
//! source = "web"
//! download_dir = "data/acquisition_plans"
//! change_detection = "file-name"
//!
//! [[ingest.satellites]]
//! id = "S2A"
//! section_class = "sentinel-2a"
//! include_glob = "S2A_*.kml"
//! ```

use anyhow::{bail, Context, Result};
use globset::Glob;
use orbit_coverage_core::crs::{AreaUnit, Crs};
use orbit_coverage_core::engine::{EngineOptions, DEFAULT_BATCH_TILES};
use orbit_coverage_core::models::SatelliteId;
use orbit_coverage_core::naming::{ArtifactNaming, DEFAULT_ARTIFACT_TEMPLATE};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub grid: GridConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GridConfig {
    pub path: PathBuf,
    #[serde(default = "default_id_property")]
    pub id_property: String,
    /// Overrides the CRS read from the grid file. A file that declares a
    /// different CRS is rejected.
    #[serde(default)]
    pub crs: Option<Crs>,
}

fn default_id_property() -> String {
    "Name".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,
    #[serde(default = "default_artifact_naming")]
    pub artifact_naming: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub area_unit: AreaUnit,
}

fn default_artifact_dir() -> String {
    "intersections".to_string()
}
fn default_artifact_naming() -> String {
    DEFAULT_ARTIFACT_TEMPLATE.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Worker threads for the overlay; 0 uses every core.
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "default_batch_tiles")]
    pub batch_tiles: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            batch_tiles: DEFAULT_BATCH_TILES,
        }
    }
}

fn default_batch_tiles() -> usize {
    DEFAULT_BATCH_TILES
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/cov.sqlite"),
        }
    }
}

/// Where acquisition plans come from.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[default]
    Web,
    Directory,
}

/// How a dataset is recognised as already processed.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeDetection {
    /// A dataset whose file name was seen before is skipped without downloading.
    #[default]
    FileName,
    /// Every dataset is fetched and compared by SHA-256 with the ledger.
    ContentHash,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default)]
    pub change_detection: ChangeDetection,
    #[serde(default)]
    pub web: WebSourceConfig,
    #[serde(default)]
    pub directory: Option<DirectorySourceConfig>,
    #[serde(default = "default_satellites")]
    pub satellites: Vec<SatelliteConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            download_dir: default_download_dir(),
            change_detection: ChangeDetection::default(),
            web: WebSourceConfig::default(),
            directory: None,
            satellites: default_satellites(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("data/acquisition_plans")
}

fn default_satellites() -> Vec<SatelliteConfig> {
    ["A", "B"]
        .iter()
        .map(|unit| SatelliteConfig {
            id: format!("S2{}", unit),
            section_class: Some(format!("sentinel-2{}", unit.to_ascii_lowercase())),
            include_glob: Some(format!("S2{}_*.kml", unit)),
        })
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSourceConfig {
    #[serde(default = "default_page_url")]
    pub page_url: String,
    #[serde(default = "default_link_base")]
    pub link_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebSourceConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            link_base: default_link_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_page_url() -> String {
    "https://sentinels.copernicus.eu/web/sentinel/missions/sentinel-2/acquisition-plans"
        .to_string()
}
fn default_link_base() -> String {
    "https://sentinels.copernicus.eu".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectorySourceConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SatelliteConfig {
    pub id: String,
    /// CSS class of the satellite's section on the acquisition-plan page.
    #[serde(default)]
    pub section_class: Option<String>,
    /// File-name glob selecting this satellite's datasets in a directory source.
    #[serde(default)]
    pub include_glob: Option<String>,
}

impl SatelliteConfig {
    pub fn satellite_id(&self) -> Result<SatelliteId> {
        Ok(SatelliteId::new(&self.id)?)
    }
}

impl Config {
    /// Configuration for one-off runs given entirely on the command line.
    pub fn minimal(grid_path: &Path, output_dir: &Path) -> Self {
        Self {
            grid: GridConfig {
                path: grid_path.to_path_buf(),
                id_property: default_id_property(),
                crs: None,
            },
            output: OutputConfig {
                dir: output_dir.to_path_buf(),
                artifact_dir: default_artifact_dir(),
                artifact_naming: default_artifact_naming(),
                base_url: None,
                area_unit: AreaUnit::default(),
            },
            engine: EngineConfig::default(),
            ledger: LedgerConfig::default(),
            ingest: IngestConfig::default(),
        }
    }

    pub fn engine_options(&self) -> Result<EngineOptions> {
        Ok(EngineOptions {
            naming: ArtifactNaming::parse(&self.output.artifact_naming)?,
            area_unit: self.output.area_unit,
            batch_tiles: self.engine.batch_tiles,
        })
    }

    pub fn artifact_root(&self) -> PathBuf {
        self.output.dir.join(&self.output.artifact_dir)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.grid.id_property.trim().is_empty() {
        bail!("grid.id_property must not be empty");
    }

    ArtifactNaming::parse(&config.output.artifact_naming)
        .with_context(|| "output.artifact_naming is invalid")?;

    let artifact_dir = Path::new(&config.output.artifact_dir);
    if artifact_dir.is_absolute() || artifact_dir.components().any(|c| c.as_os_str() == "..") {
        bail!("output.artifact_dir must be a relative path inside output.dir");
    }

    if config.engine.batch_tiles == 0 {
        bail!("engine.batch_tiles must be > 0");
    }

    if config.ingest.web.timeout_secs == 0 {
        bail!("ingest.web.timeout_secs must be > 0");
    }

    let mut seen = HashSet::new();
    for sat in &config.ingest.satellites {
        sat.satellite_id()
            .with_context(|| format!("ingest.satellites: invalid id '{}'", sat.id))?;
        if !seen.insert(sat.id.clone()) {
            bail!("ingest.satellites: duplicate id '{}'", sat.id);
        }
        if let Some(glob) = &sat.include_glob {
            Glob::new(glob)
                .with_context(|| format!("ingest.satellites.{}: invalid include_glob", sat.id))?;
        }
    }

    match config.ingest.source {
        SourceKind::Web => {
            if config
                .ingest
                .satellites
                .iter()
                .any(|s| s.section_class.is_none())
            {
                bail!("ingest.satellites: section_class is required for the web source");
            }
        }
        SourceKind::Directory => {
            if config.ingest.directory.is_none() {
                bail!("ingest.directory must be configured when ingest.source = \"directory\"");
            }
            if config
                .ingest
                .satellites
                .iter()
                .any(|s| s.include_glob.is_none())
            {
                bail!("ingest.satellites: include_glob is required for the directory source");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        validate(&config)?;
        Ok(config)
    }

    const BASE: &str = r#"
[grid]
path = "tiles.geojson"

[output]
dir = "out"
"#;

    #[test]
    fn defaults_apply() {
        let config = parse(BASE).unwrap();
        assert_eq!(config.grid.id_property, "Name");
        assert_eq!(config.output.artifact_dir, "intersections");
        assert_eq!(config.output.area_unit, AreaUnit::SquareKilometres);
        assert_eq!(config.ingest.source, SourceKind::Web);
        assert_eq!(config.ingest.change_detection, ChangeDetection::FileName);
        assert_eq!(config.ingest.satellites.len(), 2);
        assert_eq!(config.ingest.satellites[1].id, "S2B");
        assert_eq!(
            config.ingest.satellites[1].section_class.as_deref(),
            Some("sentinel-2b")
        );
        assert_eq!(config.artifact_root(), PathBuf::from("out/intersections"));
    }

    #[test]
    fn full_config_parses() {
        let text = format!(
            "{}{}",
            BASE,
            r#"
[engine]
threads = 4
batch_tiles = 32

[ingest]
source = "directory"
change_detection = "content-hash"

[ingest.directory]
root = "plans"

[[ingest.satellites]]
id = "S2C"
include_glob = "S2C_*.kml"
"#
        );
        let config = parse(&text).unwrap();
        assert_eq!(config.engine.threads, 4);
        assert_eq!(config.ingest.change_detection, ChangeDetection::ContentHash);
        assert_eq!(config.ingest.satellites.len(), 1);
    }

    #[test]
    fn example_config_parses() {
        let config = parse(include_str!("../config/cov.example.toml")).unwrap();
        assert_eq!(config.ingest.source, SourceKind::Web);
        assert_eq!(config.engine.batch_tiles, DEFAULT_BATCH_TILES);
    }

    #[test]
    fn rejects_bad_naming_template() {
        let text = BASE.replace(
            "dir = \"out\"",
            "dir = \"out\"\nartifact_naming = \"{tile}_{satellite}\"",
        );
        assert!(parse(&text).is_err());
    }

    #[test]
    fn directory_source_requires_root() {
        let text = format!("{}\n[ingest]\nsource = \"directory\"\n", BASE);
        assert!(parse(&text).is_err());
    }

    #[test]
    fn rejects_escaping_artifact_dir() {
        let text = BASE.replace("dir = \"out\"", "dir = \"out\"\nartifact_dir = \"../elsewhere\"");
        assert!(parse(&text).is_err());
    }
}
