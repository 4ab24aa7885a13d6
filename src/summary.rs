//! CSV summary table.
//!
//! Rows are streamed into `{name}.partial` and the file is renamed into
//! place by [`CsvSummaryWriter::finish`], so an aborted run never leaves a
//! summary that looks complete.

use anyhow::{Context, Result};
use orbit_coverage_core::engine::RecordSink;
use orbit_coverage_core::models::OverlapRecord;
use orbit_coverage_core::time::format_summary;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const SUMMARY_HEADER: [&str; 9] = [
    "Tile",
    "Orbit",
    "IntersectionArea",
    "TileArea",
    "Percentage",
    "BeginTime",
    "EndTime",
    "Satellite",
    "ArtifactReference",
];

pub struct CsvSummaryWriter {
    writer: csv::Writer<BufWriter<File>>,
    partial: PathBuf,
    target: PathBuf,
}

impl CsvSummaryWriter {
    pub fn create(target: &Path) -> Result<Self> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let partial = partial_path(target);
        let file = File::create(&partial)
            .with_context(|| format!("Failed to create summary: {}", partial.display()))?;
        let mut writer = csv::Writer::from_writer(BufWriter::new(file));
        writer.write_record(SUMMARY_HEADER)?;
        Ok(Self {
            writer,
            partial,
            target: target.to_path_buf(),
        })
    }

    /// Flushes and moves the table to its final name.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        drop(self.writer);
        std::fs::rename(&self.partial, &self.target).with_context(|| {
            format!("Failed to move summary into place: {}", self.target.display())
        })?;
        Ok(self.target)
    }

    /// Discards the partial table.
    pub fn abort(self) {
        drop(self.writer);
        let _ = std::fs::remove_file(&self.partial);
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

impl RecordSink for CsvSummaryWriter {
    fn append(&mut self, record: &OverlapRecord) -> std::io::Result<()> {
        let intersection_area = format_measure(record.intersection_area);
        let tile_area = format_measure(record.tile_area);
        let percentage = format_measure(record.coverage_percentage);
        let begin = format_summary(&record.begin);
        let end = format_summary(&record.end);
        self.writer
            .write_record([
                record.tile_id.as_str(),
                record.relative_orbit_id.as_str(),
                intersection_area.as_str(),
                tile_area.as_str(),
                percentage.as_str(),
                begin.as_str(),
                end.as_str(),
                record.satellite_id.as_str(),
                record.artifact_reference.as_str(),
            ])
            .map_err(std::io::Error::from)
    }
}

/// Six decimals, or scientific notation when a positive value would
/// otherwise print as zero.
fn format_measure(value: f64) -> String {
    let fixed = format!("{:.6}", value);
    if value > 0.0 && fixed.bytes().all(|b| b == b'0' || b == b'.') {
        format!("{:e}", value)
    } else {
        fixed
    }
}
