//! Loading orbit footprints from an acquisition-plan dataset.
//!
//! Supports ESA KML acquisition plans and GeoJSON feature collections.
//! Only nominal-mode passes become footprints; everything else is counted
//! and dropped here, so the coverage engine never sees it.

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use orbit_coverage_core::crs::Crs;
use orbit_coverage_core::error::{GeometryInputError, InputKind};
use orbit_coverage_core::models::{AcquisitionMode, FootprintSet, OrbitFootprint, SatelliteId};
use orbit_coverage_core::naming::RunLabel;
use orbit_coverage_core::time::parse_timestamp;
use std::path::Path;
use tracing::debug;

use crate::geojson_io::{first_property, read_features};
use crate::kml::parse_kml;

const ORBIT_KEYS: &[&str] = &["OrbitRelative", "relative_orbit", "RelativeOrbit", "OrbitRelat"];
const BEGIN_KEYS: &[&str] = &["begin", "ObservationTimeStart"];
const END_KEYS: &[&str] = &["end", "ObservationTimeStop"];
const MODE_KEYS: &[&str] = &["Mode", "mode"];

/// Supported dataset formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Kml,
    GeoJson,
}

impl DatasetFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "kml" => Some(DatasetFormat::Kml),
            "geojson" | "json" => Some(DatasetFormat::GeoJson),
            _ => None,
        }
    }
}

/// Footprints of one dataset, ready for the engine.
#[derive(Debug)]
pub struct LoadedFootprints {
    pub set: FootprintSet,
    /// Passes dropped because they were not in nominal mode.
    pub skipped_non_nominal: usize,
    /// Label derived from the file name, else from the footprints' bounds.
    pub run_label: Option<RunLabel>,
}

pub fn load_footprints(path: &Path, satellite: &SatelliteId) -> Result<LoadedFootprints> {
    let format = DatasetFormat::from_path(path).ok_or_else(|| {
        anyhow::anyhow!(
            "Unsupported footprint dataset '{}': expected .kml, .geojson or .json",
            path.display()
        )
    })?;
    let (crs, footprints, skipped_non_nominal) = match format {
        DatasetFormat::Kml => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read KML file: {}", path.display()))?;
            let (footprints, skipped) = kml_footprints(&text, satellite)
                .with_context(|| format!("Invalid acquisition plan {}", path.display()))?;
            (Crs::WGS84, footprints, skipped)
        }
        DatasetFormat::GeoJson => {
            let (crs, footprints, skipped) = geojson_footprints(path, satellite)
                .with_context(|| format!("Invalid footprint dataset {}", path.display()))?;
            (crs, footprints, skipped)
        }
    };

    let run_label = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(RunLabel::from_dataset_name)
        .or_else(|| RunLabel::from_footprints(&footprints));

    debug!(
        path = %path.display(),
        footprints = footprints.len(),
        skipped_non_nominal,
        "loaded footprint dataset"
    );

    Ok(LoadedFootprints {
        set: FootprintSet::new(crs, footprints)?,
        skipped_non_nominal,
        run_label,
    })
}

/// Footprints of a KML acquisition plan. KML is always WGS84.
pub fn kml_footprints(
    text: &str,
    satellite: &SatelliteId,
) -> Result<(Vec<OrbitFootprint>, usize)> {
    let mut footprints = Vec::new();
    let mut skipped = 0;
    for (index, pm) in parse_kml(text)?.iter().enumerate() {
        let label = pm.label(index);
        let mode = MODE_KEYS
            .iter()
            .find_map(|k| pm.data(k))
            .or(pm.folder.as_deref());
        if !mode.map(AcquisitionMode::parse).is_some_and(|m| m.is_nominal()) {
            skipped += 1;
            continue;
        }

        let orbit = ORBIT_KEYS
            .iter()
            .find_map(|k| pm.data(k))
            .ok_or_else(|| anyhow::anyhow!("{}: no relative orbit", label))?;
        let begin = pm
            .begin
            .as_deref()
            .or_else(|| BEGIN_KEYS.iter().find_map(|k| pm.data(k)));
        let end = pm
            .end
            .as_deref()
            .or_else(|| END_KEYS.iter().find_map(|k| pm.data(k)));
        let (begin, end) = validity(&label, begin, end)?;

        if pm.polygons.is_empty() {
            return Err(GeometryInputError::NonPolygonal {
                kind: InputKind::Footprint,
                id: label,
                found: pm
                    .other_geometry
                    .clone()
                    .unwrap_or_else(|| "no geometry".to_string()),
            }
            .into());
        }

        footprints.push(OrbitFootprint {
            satellite_id: satellite.clone(),
            relative_orbit_id: orbit.to_string(),
            begin,
            end,
            geometry: pm.geometry(),
        });
    }
    Ok((footprints, skipped))
}

fn geojson_footprints(
    path: &Path,
    satellite: &SatelliteId,
) -> Result<(Crs, Vec<OrbitFootprint>, usize)> {
    let doc = read_features(path)?;
    let crs = doc.crs();
    let mut footprints = Vec::new();
    let mut skipped = 0;
    for (index, feature) in doc.features.into_iter().enumerate() {
        let label = format!("feature #{}", index + 1);
        let nominal = first_property(&feature, MODE_KEYS)
            .map(|m| AcquisitionMode::parse(&m).is_nominal())
            .unwrap_or(false);
        if !nominal {
            skipped += 1;
            continue;
        }

        let orbit = first_property(&feature, ORBIT_KEYS)
            .ok_or_else(|| anyhow::anyhow!("{}: no relative orbit", label))?;
        let begin = first_property(&feature, BEGIN_KEYS);
        let end = first_property(&feature, END_KEYS);
        let (begin, end) = validity(&label, begin.as_deref(), end.as_deref())?;

        let Some(geometry) = feature.geometry else {
            return Err(GeometryInputError::NonPolygonal {
                kind: InputKind::Footprint,
                id: label,
                found: "null".to_string(),
            }
            .into());
        };
        let geometry = geo::Geometry::<f64>::try_from(geometry)
            .with_context(|| format!("{}: unreadable geometry", label))?;

        footprints.push(OrbitFootprint {
            satellite_id: satellite.clone(),
            relative_orbit_id: orbit,
            begin,
            end,
            geometry: FootprintSet::polygonal(&label, geometry)?,
        });
    }
    Ok((crs, footprints, skipped))
}

fn validity(
    label: &str,
    begin: Option<&str>,
    end: Option<&str>,
) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let (Some(begin), Some(end)) = (begin, end) else {
        bail!("{}: missing begin or end time", label);
    };
    let begin = parse_timestamp(begin).with_context(|| format!("{}: bad begin time", label))?;
    let end = parse_timestamp(end).with_context(|| format!("{}: bad end time", label))?;
    if end < begin {
        bail!("{}: end time precedes begin time", label);
    }
    Ok((begin, end))
}
