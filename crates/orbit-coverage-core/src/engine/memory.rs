//! In-memory [`ArtifactStore`] and [`RecordSink`] implementations for tests
//! and library callers that want the records rather than files.

use std::collections::BTreeMap;
use std::sync::RwLock;

use geo::MultiPolygon;

use crate::error::ArtifactWriteError;
use crate::models::OverlapRecord;

use super::{ArtifactRequest, ArtifactStore, RecordSink};

/// Keeps artifacts in a map keyed by artifact key. The reference returned
/// for each artifact is its key.
pub struct MemoryArtifactStore {
    artifacts: RwLock<BTreeMap<String, MultiPolygon<f64>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            artifacts: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<MultiPolygon<f64>> {
        self.artifacts
            .read()
            .ok()
            .and_then(|artifacts| artifacts.get(key).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        self.artifacts
            .read()
            .map(|artifacts| artifacts.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, artifact: &ArtifactRequest<'_>) -> Result<String, ArtifactWriteError> {
        let mut artifacts = self.artifacts.write().map_err(|_| ArtifactWriteError {
            key: artifact.key.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "artifact map poisoned"),
        })?;
        artifacts.insert(artifact.key.to_string(), artifact.geometry.clone());
        Ok(artifact.key.to_string())
    }
}

/// Collects records in processing order.
#[derive(Debug, Default)]
pub struct VecSink {
    records: Vec<OverlapRecord>,
}

impl VecSink {
    pub fn records(&self) -> &[OverlapRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<OverlapRecord> {
        self.records
    }
}

impl RecordSink for VecSink {
    fn append(&mut self, record: &OverlapRecord) -> std::io::Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}
