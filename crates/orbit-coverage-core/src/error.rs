//! Error taxonomy for a coverage run.
//!
//! Geometry problems are fatal to the run they occur in and surface before
//! anything is written. Artifact problems are isolated to a single record.

use thiserror::Error;

use crate::crs::Crs;

/// Which input collection a geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Tile,
    Footprint,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::Tile => write!(f, "tile"),
            InputKind::Footprint => write!(f, "footprint"),
        }
    }
}

/// Malformed input geometry or an unusable coordinate reference system.
#[derive(Debug, Error)]
pub enum GeometryInputError {
    /// The tile grid has no tiles.
    #[error("tile grid is empty")]
    EmptyTileGrid,

    /// Two tiles share an id.
    #[error("duplicate tile id: {id}")]
    DuplicateTileId { id: String },

    /// Geometry is not a polygon or multipolygon.
    #[error("{kind} {id}: expected Polygon or MultiPolygon, found {found}")]
    NonPolygonal {
        kind: InputKind,
        id: String,
        found: String,
    },

    /// Geometry is polygonal but not valid.
    #[error("{kind} {id}: invalid geometry: {reason}")]
    InvalidGeometry {
        kind: InputKind,
        id: String,
        reason: String,
    },

    /// Tiles and footprints are in different reference systems.
    #[error("CRS mismatch: tiles are in {tiles}, footprints are in {footprints}")]
    CrsMismatch { tiles: Crs, footprints: Crs },

    /// Coordinates are inconsistent with the declared reference system.
    #[error("{kind} {id}: coordinates cannot be in {crs}: {reason}")]
    UnverifiableCrs {
        kind: InputKind,
        id: String,
        crs: Crs,
        reason: String,
    },

    /// A CRS identifier could not be parsed.
    #[error("unrecognised CRS identifier: {0}")]
    UnknownCrs(String),
}

/// Failure to persist one overlap artifact. The record is dropped from the
/// summary table and the run continues.
#[derive(Debug, Error)]
#[error("failed to write artifact {key}")]
pub struct ArtifactWriteError {
    pub key: String,
    #[source]
    pub source: std::io::Error,
}

/// Invalid artifact naming template, satellite id or run label.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("artifact naming template is missing placeholder {{{0}}}")]
    MissingPlaceholder(&'static str),

    #[error("artifact naming template has unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("artifact naming template must not contain path separators")]
    PathSeparator,

    #[error("invalid satellite id '{0}'")]
    InvalidSatellite(String),

    #[error("invalid run label '{0}': expected YYYYMMDD_YYYYMMDD")]
    InvalidRunLabel(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
}

/// Fatal failure of a coverage run.
#[derive(Debug, Error)]
pub enum CoverageError {
    #[error(transparent)]
    GeometryInput(#[from] GeometryInputError),

    /// The summary table could not be written.
    #[error("failed to write summary table")]
    Summary(#[source] std::io::Error),
}
