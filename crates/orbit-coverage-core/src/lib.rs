//! # orbit-coverage core
//!
//! I/O-free logic for computing how much of each tile of a fixed grid is
//! covered by each satellite ground-track footprint of an acquisition plan:
//! data model, CRS-aware area measurement, geometry validation, the
//! tile × footprint overlay, and deterministic output naming.
//!
//! File formats, the artifact store on disk, the summary table, and dataset
//! ingestion live in the `orbit-coverage` crate.

pub mod crs;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod models;
pub mod naming;
pub mod overlay;
pub mod time;
