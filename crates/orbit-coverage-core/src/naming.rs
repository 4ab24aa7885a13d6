//! Deterministic names for run outputs.
//!
//! Artifact keys are built from a template so that re-running a computation
//! overwrites exactly the files it wrote before. Run labels namespace the
//! summary table by the validity window of the footprint dataset.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::NamingError;
use crate::models::{OrbitFootprint, SatelliteId};
use crate::time::format_key;

/// Default artifact key template.
pub const DEFAULT_ARTIFACT_TEMPLATE: &str = "{tile}_{orbit}_{begin}_{satellite}";

const REQUIRED_PLACEHOLDERS: &[&str] = &["tile", "orbit", "begin", "satellite"];
const OPTIONAL_PLACEHOLDERS: &[&str] = &["end"];

/// Template for artifact keys, e.g. `{tile}_{orbit}_{begin}_{satellite}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    template: String,
}

impl ArtifactNaming {
    /// Parses a template. All of `{tile}`, `{orbit}`, `{begin}` and
    /// `{satellite}` must appear so keys stay unique within a run.
    pub fn parse(template: &str) -> Result<Self, NamingError> {
        if template.contains('/') || template.contains('\\') {
            return Err(NamingError::PathSeparator);
        }
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| NamingError::UnknownPlaceholder(after.to_string()))?;
            let name = &after[..close];
            if !REQUIRED_PLACEHOLDERS.contains(&name) && !OPTIONAL_PLACEHOLDERS.contains(&name) {
                return Err(NamingError::UnknownPlaceholder(name.to_string()));
            }
            rest = &after[close + 1..];
        }
        for required in REQUIRED_PLACEHOLDERS {
            if !template.contains(&format!("{{{}}}", required)) {
                return Err(NamingError::MissingPlaceholder(required));
            }
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Artifact key for one (tile, footprint) pair.
    pub fn key(&self, tile_id: &str, footprint: &OrbitFootprint) -> String {
        self.template
            .replace("{tile}", &sanitize(tile_id))
            .replace("{orbit}", &sanitize(&footprint.relative_orbit_id))
            .replace("{begin}", &format_key(&footprint.begin))
            .replace("{end}", &format_key(&footprint.end))
            .replace("{satellite}", &sanitize(footprint.satellite_id.as_str()))
    }
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self {
            template: DEFAULT_ARTIFACT_TEMPLATE.to_string(),
        }
    }
}

/// Replaces characters that are unsafe in file names.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect()
}

/// Label of a run: `<startDate>_<endDate>` as `YYYYMMDD_YYYYMMDD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunLabel(String);

impl RunLabel {
    pub fn parse(label: &str) -> Result<Self, NamingError> {
        let invalid = || NamingError::InvalidRunLabel(label.to_string());
        let (start, end) = label.split_once('_').ok_or_else(invalid)?;
        let start = NaiveDate::parse_from_str(start, "%Y%m%d").map_err(|_| invalid())?;
        let end = NaiveDate::parse_from_str(end, "%Y%m%d").map_err(|_| invalid())?;
        Ok(Self::from_dates(start, end))
    }

    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self(format!("{}_{}", start.format("%Y%m%d"), end.format("%Y%m%d")))
    }

    /// Extracts the validity window from a dataset file name such as
    /// `S2A_MP_ACQ__KML_20240104T120000_20240122T150000.kml`: the first two
    /// `_`-separated tokens that begin with a `YYYYMMDD` date.
    pub fn from_dataset_name(file_name: &str) -> Option<Self> {
        let stem = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name);
        let mut dates = stem.split('_').filter_map(|token| {
            let prefix = token.get(..8)?;
            if !prefix.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            NaiveDate::parse_from_str(prefix, "%Y%m%d").ok()
        });
        let start = dates.next()?;
        let end = dates.next()?;
        Some(Self::from_dates(start, end))
    }

    /// Label spanning the earliest `begin` and latest `end` of a footprint
    /// collection, or `None` when it is empty.
    pub fn from_footprints(footprints: &[OrbitFootprint]) -> Option<Self> {
        let start: NaiveDateTime = footprints.iter().map(|f| f.begin).min()?;
        let end: NaiveDateTime = footprints.iter().map(|f| f.end).max()?;
        Some(Self::from_dates(start.date(), end.date()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File name of the summary table for one run.
pub fn summary_file_name(satellite: &SatelliteId, label: &RunLabel) -> String {
    format!("results_{}_{}.csv", sanitize(satellite.as_str()), label)
}
