//! # orbit-coverage
//!
//! Tile coverage of Sentinel-2 acquisition plans.
//!
//! For every tile of a fixed grid and every nominal-mode orbit footprint of
//! an acquisition plan, computes the overlap, writes the intersection as a
//! GeoJSON artifact, and records one row in a per-run CSV summary. New plans
//! are discovered on the ESA acquisition-plan page (or a local directory) and
//! tracked in a SQLite ledger so each is processed once.
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌────────────────┐   ┌─────────────┐
//! │ Web / Dir    │──▶│  Ledger  │──▶│  Footprints    │──▶│  Coverage   │
//! │ source       │   │ (SQLite) │   │  KML / GeoJSON │   │  engine     │
//! └──────────────┘   └──────────┘   └────────────────┘   └──────┬──────┘
//!                                                               ▼
//!                                            artifacts/*.geojson + results_*.csv
//! ```
//!
//! The geometry engine lives in [`orbit_coverage_core`]; this crate adds
//! file formats, persistence, ingestion and the `cov` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`tiles`] | Tile grid loading |
//! | [`footprints`] | Acquisition-plan footprint loading |
//! | [`kml`] / [`geojson_io`] | File formats |
//! | [`artifacts`] / [`summary`] | Run outputs |
//! | [`coverage`] | One coverage run |
//! | [`traits`] / [`source_web`] / [`source_dir`] | Dataset sources |
//! | [`ledger`] / [`db`] / [`migrate`] | Dataset ledger |
//! | [`ingest`] | `cov check` / `cov sync` |
//! | [`sources`] / [`status`] | `cov sources` / `cov status` |
//! | [`progress`] | Progress reporting on stderr |

pub mod artifacts;
pub mod config;
pub mod coverage;
pub mod db;
pub mod footprints;
pub mod geojson_io;
pub mod ingest;
pub mod kml;
pub mod ledger;
pub mod migrate;
pub mod progress;
pub mod source_dir;
pub mod source_web;
pub mod sources;
pub mod status;
pub mod summary;
pub mod tiles;
pub mod traits;
