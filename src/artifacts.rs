//! Filesystem artifact store.
//!
//! Each overlap is written as `{root}/{key}.geojson`, replacing any earlier
//! file with the same key.

use anyhow::{Context, Result};
use orbit_coverage_core::engine::{ArtifactRequest, ArtifactStore};
use orbit_coverage_core::error::ArtifactWriteError;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::geojson_io::artifact_document;

pub struct FsArtifactStore {
    root: PathBuf,
    /// Prepended to the file name to form the artifact reference.
    reference_prefix: String,
}

impl FsArtifactStore {
    /// Creates the artifact directory if needed.
    pub fn new(root: &Path, reference_prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(root).with_context(|| {
            format!("Failed to create artifact directory: {}", root.display())
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            reference_prefix: reference_prefix.trim_end_matches('/').to_string(),
        })
    }

    /// References are `{output.base_url}/{file}` when a base URL is set,
    /// otherwise paths relative to `output.dir`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let prefix = match &config.output.base_url {
            Some(url) => url.clone(),
            None => config.output.artifact_dir.replace('\\', "/"),
        };
        Self::new(&config.artifact_root(), &prefix)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name(key: &str) -> String {
        format!("{}.geojson", key)
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, artifact: &ArtifactRequest<'_>) -> Result<String, ArtifactWriteError> {
        let file = Self::file_name(artifact.key);
        std::fs::write(self.root.join(&file), artifact_document(artifact)).map_err(|source| {
            ArtifactWriteError {
                key: artifact.key.to_string(),
                source,
            }
        })?;
        if self.reference_prefix.is_empty() {
            Ok(file)
        } else {
            Ok(format!("{}/{}", self.reference_prefix, file))
        }
    }
}
