//! Acquisition plans dropped into a local directory.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use orbit_coverage_core::models::SatelliteId;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::traits::{DatasetHandle, FootprintSource};

pub struct DirectorySource {
    root: PathBuf,
    follow_symlinks: bool,
    /// Satellite id and the file-name glob selecting its datasets.
    satellites: Vec<(SatelliteId, GlobMatcher)>,
}

impl DirectorySource {
    pub fn new(config: &Config) -> Result<Self> {
        let dir = config
            .ingest
            .directory
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Directory source not configured"))?;

        let mut satellites = Vec::new();
        for sat in &config.ingest.satellites {
            let glob = sat.include_glob.as_deref().ok_or_else(|| {
                anyhow::anyhow!("ingest.satellites.{}: include_glob is not set", sat.id)
            })?;
            satellites.push((sat.satellite_id()?, Glob::new(glob)?.compile_matcher()));
        }

        Ok(Self {
            root: dir.root.clone(),
            follow_symlinks: dir.follow_symlinks,
            satellites,
        })
    }
}

#[async_trait]
impl FootprintSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn list_available(&self) -> Result<Vec<DatasetHandle>> {
        if !self.root.exists() {
            bail!("Directory source root does not exist: {}", self.root.display());
        }

        let mut handles = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(self.follow_symlinks) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            // First matching satellite wins.
            let Some((satellite, _)) = self
                .satellites
                .iter()
                .find(|(_, glob)| glob.is_match(&file_name))
            else {
                continue;
            };
            handles.push(DatasetHandle {
                satellite: satellite.clone(),
                file_name,
                locator: entry.path().display().to_string(),
            });
        }

        handles.sort_by(|a, b| {
            (a.satellite.as_str(), &a.file_name).cmp(&(b.satellite.as_str(), &b.file_name))
        });
        Ok(handles)
    }

    async fn fetch(&self, handle: &DatasetHandle, download_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(download_dir).await?;
        let path = download_dir.join(&handle.file_name);
        tokio::fs::copy(&handle.locator, &path)
            .await
            .with_context(|| format!("Failed to copy {} to {}", handle.locator, path.display()))?;
        Ok(path)
    }
}
