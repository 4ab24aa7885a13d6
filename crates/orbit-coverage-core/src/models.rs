//! Core data models: tiles, orbit footprints, and overlap records.
//!
//! Tiles are validated and measured once when the grid is built. Footprints
//! are validated when a [`FootprintSet`] is assembled. Both checks happen
//! before any output is produced.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use geo::{Area, BoundingRect, Geometry, MultiPolygon, Rect};

use crate::crs::Crs;
use crate::error::{GeometryInputError, InputKind, NamingError};
use crate::geometry::{to_multipolygon, validate};
use crate::time::format_summary;

/// Satellite identifier, e.g. `S2A` or `Sentinel-2B`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SatelliteId(String);

impl SatelliteId {
    pub fn new(id: &str) -> Result<Self, NamingError> {
        let id = id.trim();
        let ok = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if ok {
            Ok(Self(id.to_string()))
        } else {
            Err(NamingError::InvalidSatellite(id.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SatelliteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Acquisition mode of a planned pass. Only nominal passes are distributed
/// to users and only those become [`OrbitFootprint`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionMode {
    Nominal,
    Other(String),
}

impl AcquisitionMode {
    /// Exact match on `NOMINAL`; anything else is another mode.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "NOMINAL" => AcquisitionMode::Nominal,
            other => AcquisitionMode::Other(other.to_string()),
        }
    }

    pub fn is_nominal(&self) -> bool {
        matches!(self, AcquisitionMode::Nominal)
    }
}

/// A cell of the tiling grid.
#[derive(Debug, Clone)]
pub struct Tile {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    /// Area measured in the grid's CRS: geodesic square metres for
    /// geographic systems, squared CRS units for projected ones.
    pub area: f64,
    planar_area: f64,
    bbox: Rect<f64>,
}

impl Tile {
    /// Area in the raw coordinate units, used as the degeneracy reference.
    pub fn planar_area(&self) -> f64 {
        self.planar_area
    }

    pub fn bbox(&self) -> Rect<f64> {
        self.bbox
    }
}

/// The static tile grid, loaded once per process.
#[derive(Debug, Clone)]
pub struct TileGrid {
    crs: Crs,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Validates and measures every tile.
    ///
    /// Fails on an empty grid, duplicate ids, non-polygonal or invalid
    /// geometries, and coordinates outside the CRS domain.
    pub fn new(
        crs: Crs,
        tiles: impl IntoIterator<Item = (String, Geometry<f64>)>,
    ) -> Result<Self, GeometryInputError> {
        let mut seen = HashSet::new();
        let mut built = Vec::new();
        for (id, geometry) in tiles {
            if !seen.insert(id.clone()) {
                return Err(GeometryInputError::DuplicateTileId { id });
            }
            let geometry = checked_geometry(crs, InputKind::Tile, &id, geometry)?;
            let bbox = geometry
                .bounding_rect()
                .ok_or_else(|| GeometryInputError::InvalidGeometry {
                    kind: InputKind::Tile,
                    id: id.clone(),
                    reason: "geometry has no extent".to_string(),
                })?;
            built.push(Tile {
                area: crs.area(&geometry),
                planar_area: geometry.unsigned_area(),
                bbox,
                id,
                geometry,
            });
        }
        if built.is_empty() {
            return Err(GeometryInputError::EmptyTileGrid);
        }
        Ok(Self { crs, tiles: built })
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Ground-track footprint of one nominal-mode pass.
#[derive(Debug, Clone)]
pub struct OrbitFootprint {
    pub satellite_id: SatelliteId,
    pub relative_orbit_id: String,
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
    pub geometry: MultiPolygon<f64>,
}

impl OrbitFootprint {
    /// Identifier used in error messages.
    pub fn label(&self) -> String {
        format!(
            "orbit {} at {}",
            self.relative_orbit_id,
            format_summary(&self.begin)
        )
    }
}

/// Validated footprints of one run, all in one CRS.
#[derive(Debug, Clone)]
pub struct FootprintSet {
    crs: Crs,
    footprints: Vec<OrbitFootprint>,
}

impl FootprintSet {
    pub fn new(crs: Crs, footprints: Vec<OrbitFootprint>) -> Result<Self, GeometryInputError> {
        for footprint in &footprints {
            let label = footprint.label();
            validate(&footprint.geometry).map_err(|reason| {
                GeometryInputError::InvalidGeometry {
                    kind: InputKind::Footprint,
                    id: label.clone(),
                    reason,
                }
            })?;
            crs.check_coordinates(&footprint.geometry)
                .map_err(|reason| GeometryInputError::UnverifiableCrs {
                    kind: InputKind::Footprint,
                    id: label,
                    crs,
                    reason,
                })?;
        }
        Ok(Self { crs, footprints })
    }

    /// Converts a raw geometry into a footprint geometry, rejecting
    /// non-polygonal input.
    pub fn polygonal(id: &str, geometry: Geometry<f64>) -> Result<MultiPolygon<f64>, GeometryInputError> {
        to_multipolygon(geometry).map_err(|found| GeometryInputError::NonPolygonal {
            kind: InputKind::Footprint,
            id: id.to_string(),
            found: found.to_string(),
        })
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn footprints(&self) -> &[OrbitFootprint] {
        &self.footprints
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }
}

fn checked_geometry(
    crs: Crs,
    kind: InputKind,
    id: &str,
    geometry: Geometry<f64>,
) -> Result<MultiPolygon<f64>, GeometryInputError> {
    let geometry = to_multipolygon(geometry).map_err(|found| GeometryInputError::NonPolygonal {
        kind,
        id: id.to_string(),
        found: found.to_string(),
    })?;
    validate(&geometry).map_err(|reason| GeometryInputError::InvalidGeometry {
        kind,
        id: id.to_string(),
        reason,
    })?;
    crs.check_coordinates(&geometry)
        .map_err(|reason| GeometryInputError::UnverifiableCrs {
            kind,
            id: id.to_string(),
            crs,
            reason,
        })?;
    Ok(geometry)
}

/// One genuine area overlap between a tile and a footprint.
#[derive(Debug, Clone)]
pub struct OverlapRecord {
    pub tile_id: String,
    pub relative_orbit_id: String,
    pub satellite_id: SatelliteId,
    pub intersection_geometry: MultiPolygon<f64>,
    /// Intersection area in the run's reporting unit.
    pub intersection_area: f64,
    /// Tile area in the run's reporting unit.
    pub tile_area: f64,
    pub coverage_percentage: f64,
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
    pub artifact_reference: String,
}
