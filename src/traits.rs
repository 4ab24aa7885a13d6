//! Source trait for acquisition-plan datasets.
//!
//! A [`FootprintSource`] lists the datasets it currently offers and fetches
//! them into the download directory. Whether a dataset is new is decided by
//! the ledger, not by the source, and turning a fetched file into footprints
//! is [`crate::footprints::load_footprints`].
//!
//! ```text
//!   WebSource / DirectorySource
//!          │ list_available()
//!          ▼
//!   ingest::known_processed() ──► fetch() ──► load_footprints() ──► coverage run
//! ```

use anyhow::Result;
use async_trait::async_trait;
use orbit_coverage_core::models::SatelliteId;
use std::path::{Path, PathBuf};

/// One dataset offered by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle {
    pub satellite: SatelliteId,
    /// File name the dataset is stored under; the ledger key.
    pub file_name: String,
    /// URL or absolute path the dataset is fetched from.
    pub locator: String,
}

#[async_trait]
pub trait FootprintSource: Send + Sync {
    /// Short identifier, e.g. `"web"`.
    fn name(&self) -> &str;

    /// Where datasets are listed from, for `cov sources`.
    fn location(&self) -> String;

    /// Every dataset currently offered, in a stable order.
    async fn list_available(&self) -> Result<Vec<DatasetHandle>>;

    /// Copies or downloads the dataset into `download_dir`, replacing any
    /// earlier copy, and returns the local path.
    async fn fetch(&self, handle: &DatasetHandle, download_dir: &Path) -> Result<PathBuf>;

    /// Whether the source is reachable. Defaults to listing it.
    async fn health(&self) -> Result<()> {
        self.list_available().await.map(|_| ())
    }
}
