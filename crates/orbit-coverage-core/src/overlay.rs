//! Tile × footprint overlay.
//!
//! Every tile is intersected with every footprint. Pairs whose bounding
//! boxes are disjoint are skipped without a boolean operation. Each tile's
//! inner loop is independent, so a batch of tiles is overlaid in parallel
//! and the per-tile results are returned in grid order.

use geo::{BooleanOps, BoundingRect, Intersects, MultiPolygon, Rect};
use rayon::prelude::*;

use crate::crs::Crs;
use crate::error::GeometryInputError;
use crate::geometry::{classify_intersection, IntersectionKind};
use crate::models::{FootprintSet, OrbitFootprint, Tile, TileGrid};

/// A genuine area overlap found for one pair.
#[derive(Debug, Clone)]
pub struct Overlap<'a> {
    pub tile: &'a Tile,
    pub footprint: &'a OrbitFootprint,
    pub geometry: MultiPolygon<f64>,
    /// Intersection area in square metres.
    pub area: f64,
}

impl Overlap<'_> {
    pub fn percentage(&self) -> f64 {
        self.area / self.tile.area * 100.0
    }
}

/// Overlaps of one tile against all footprints, in footprint order.
#[derive(Debug, Clone)]
pub struct TileOverlay<'a> {
    pub tile: &'a Tile,
    pub overlaps: Vec<Overlap<'a>>,
    /// Pairs that touched only along an edge or at a vertex.
    pub degenerate: u64,
}

/// Prepared overlay of one footprint set against a grid.
pub struct Overlay<'a> {
    grid: &'a TileGrid,
    footprints: Vec<(Option<Rect<f64>>, &'a OrbitFootprint)>,
}

impl<'a> Overlay<'a> {
    /// Fails with [`GeometryInputError::CrsMismatch`] unless grid and
    /// footprints share a CRS.
    pub fn new(grid: &'a TileGrid, set: &'a FootprintSet) -> Result<Self, GeometryInputError> {
        if grid.crs() != set.crs() {
            return Err(GeometryInputError::CrsMismatch {
                tiles: grid.crs(),
                footprints: set.crs(),
            });
        }
        let footprints = set
            .footprints()
            .iter()
            .map(|f| (f.geometry.bounding_rect(), f))
            .collect();
        Ok(Self { grid, footprints })
    }

    pub fn crs(&self) -> Crs {
        self.grid.crs()
    }

    pub fn footprint_count(&self) -> usize {
        self.footprints.len()
    }

    /// Intersects one tile with every footprint.
    pub fn tile(&self, tile: &'a Tile) -> TileOverlay<'a> {
        let crs = self.grid.crs();
        let mut overlaps = Vec::new();
        let mut degenerate = 0;
        for (rect, footprint) in &self.footprints {
            match rect {
                Some(rect) if rect.intersects(&tile.bbox()) => {}
                _ => continue,
            }
            let raw = tile.geometry.intersection(&footprint.geometry);
            match classify_intersection(raw, tile.planar_area()) {
                IntersectionKind::Empty => {}
                IntersectionKind::Degenerate => degenerate += 1,
                IntersectionKind::Polygonal(geometry) => {
                    let area = crs.area(&geometry);
                    overlaps.push(Overlap {
                        tile,
                        footprint,
                        geometry,
                        area,
                    });
                }
            }
        }
        TileOverlay {
            tile,
            overlaps,
            degenerate,
        }
    }

    /// Overlays a batch of tiles in parallel, preserving input order.
    pub fn batch(&self, tiles: &'a [Tile]) -> Vec<TileOverlay<'a>> {
        tiles.par_iter().map(|tile| self.tile(tile)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SatelliteId;
    use crate::time::parse_timestamp;
    use geo::{polygon, Geometry};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
        ]])
    }

    fn footprint(orbit: &str, geometry: MultiPolygon<f64>) -> OrbitFootprint {
        OrbitFootprint {
            satellite_id: SatelliteId::new("S2A").unwrap(),
            relative_orbit_id: orbit.to_string(),
            begin: parse_timestamp("2024-01-01").unwrap(),
            end: parse_timestamp("2024-01-02").unwrap(),
            geometry,
        }
    }

    fn grid(crs: Crs, tiles: Vec<(&str, MultiPolygon<f64>)>) -> TileGrid {
        TileGrid::new(
            crs,
            tiles
                .into_iter()
                .map(|(id, g)| (id.to_string(), Geometry::MultiPolygon(g))),
        )
        .unwrap()
    }

    #[test]
    fn half_overlap() {
        let crs = Crs::from_epsg(32631);
        let grid = grid(crs, vec![("T1", rect(0.0, 0.0, 10_000.0, 10_000.0))]);
        let set = FootprintSet::new(
            crs,
            vec![footprint("022", rect(5_000.0, -5_000.0, 20_000.0, 15_000.0))],
        )
        .unwrap();
        let overlay = Overlay::new(&grid, &set).unwrap();
        let result = overlay.tile(&grid.tiles()[0]);
        assert_eq!(result.overlaps.len(), 1);
        assert!((result.overlaps[0].area - 5.0e7).abs() < 1e-3);
        assert!((result.overlaps[0].percentage() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn edge_touch_is_degenerate_or_empty() {
        let crs = Crs::from_epsg(32631);
        let grid = grid(crs, vec![("T2", rect(0.0, 0.0, 10.0, 10.0))]);
        let set = FootprintSet::new(crs, vec![footprint("1", rect(10.0, 0.0, 20.0, 10.0))]).unwrap();
        let overlay = Overlay::new(&grid, &set).unwrap();
        let result = overlay.tile(&grid.tiles()[0]);
        assert!(result.overlaps.is_empty());
    }

    #[test]
    fn crs_mismatch_is_rejected() {
        let grid = grid(Crs::WGS84, vec![("T1", rect(0.0, 0.0, 1.0, 1.0))]);
        let set = FootprintSet::new(Crs::from_epsg(32631), vec![]).unwrap();
        assert!(matches!(
            Overlay::new(&grid, &set),
            Err(GeometryInputError::CrsMismatch { .. })
        ));
    }

    #[test]
    fn batch_preserves_order_and_conserves_area() {
        let crs = Crs::from_epsg(32631);
        let tiles: Vec<(String, MultiPolygon<f64>)> = (0..8)
            .map(|i| {
                let x = i as f64 * 100.0;
                (format!("T{}", i), rect(x, 0.0, x + 100.0, 100.0))
            })
            .collect();
        let grid = TileGrid::new(
            crs,
            tiles
                .into_iter()
                .map(|(id, g)| (id, Geometry::MultiPolygon(g))),
        )
        .unwrap();
        // Two disjoint strips covering the bottom and top quarter of every tile.
        let set = FootprintSet::new(
            crs,
            vec![
                footprint("1", rect(-50.0, 0.0, 1000.0, 25.0)),
                footprint("2", rect(-50.0, 75.0, 1000.0, 100.0)),
            ],
        )
        .unwrap();
        let overlay = Overlay::new(&grid, &set).unwrap();
        let results = overlay.batch(grid.tiles());
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.tile.id, format!("T{}", i));
            let covered: f64 = result.overlaps.iter().map(|o| o.area).sum();
            assert!(covered <= result.tile.area + 1e-6);
            for o in &result.overlaps {
                assert!(o.percentage() > 0.0 && o.percentage() <= 100.0 + 1e-9);
            }
        }
    }
}
