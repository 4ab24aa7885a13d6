//! Loading the static tile grid.
//!
//! The grid is read once per process from GeoJSON (tile id in a configured
//! property, falling back to the feature id) or KML (tile id is the
//! placemark name).

use anyhow::{bail, Context, Result};
use geo::Geometry;
use geojson::feature::Id;
use orbit_coverage_core::crs::Crs;
use orbit_coverage_core::error::{GeometryInputError, InputKind};
use orbit_coverage_core::models::TileGrid;
use tracing::info;

use crate::config::GridConfig;
use crate::footprints::DatasetFormat;
use crate::geojson_io::{property_string, read_features};
use crate::kml::parse_kml;

pub fn load_tile_grid(config: &GridConfig) -> Result<TileGrid> {
    let path = &config.path;
    let format = DatasetFormat::from_path(path).ok_or_else(|| {
        anyhow::anyhow!(
            "Unsupported tile grid '{}': expected .geojson, .json or .kml",
            path.display()
        )
    })?;

    let (crs, tiles) = match format {
        DatasetFormat::GeoJson => geojson_tiles(config)?,
        DatasetFormat::Kml => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read KML file: {}", path.display()))?;
            let crs = resolve_crs(Some(Crs::WGS84), config.crs)?;
            (crs, kml_tiles(&text)?)
        }
    };

    let grid = TileGrid::new(crs, tiles)
        .with_context(|| format!("Invalid tile grid {}", path.display()))?;
    info!(path = %path.display(), tiles = grid.len(), crs = %grid.crs(), "loaded tile grid");
    Ok(grid)
}

/// A configured CRS must agree with the one the file declares.
fn resolve_crs(declared: Option<Crs>, configured: Option<Crs>) -> Result<Crs> {
    match (declared, configured) {
        (Some(d), Some(c)) if d != c => {
            bail!("tile grid declares {} but grid.crs is {}", d, c)
        }
        (_, Some(c)) => Ok(c),
        (Some(d), None) => Ok(d),
        (None, None) => Ok(Crs::WGS84),
    }
}

fn geojson_tiles(config: &GridConfig) -> Result<(Crs, Vec<(String, Geometry<f64>)>)> {
    let doc = read_features(&config.path)?;
    let crs = resolve_crs(doc.declared_crs, config.crs)?;
    let mut tiles = Vec::with_capacity(doc.features.len());
    for (index, feature) in doc.features.into_iter().enumerate() {
        let id = property_string(&feature, &config.id_property)
            .or_else(|| match &feature.id {
                Some(Id::String(s)) => Some(s.clone()),
                Some(Id::Number(n)) => Some(n.to_string()),
                None => None,
            })
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "tile feature #{} has no '{}' property",
                    index + 1,
                    config.id_property
                )
            })?;
        let Some(geometry) = feature.geometry else {
            return Err(GeometryInputError::NonPolygonal {
                kind: InputKind::Tile,
                id,
                found: "null".to_string(),
            }
            .into());
        };
        let geometry = Geometry::<f64>::try_from(geometry)
            .with_context(|| format!("tile {}: unreadable geometry", id))?;
        tiles.push((id, geometry));
    }
    Ok((crs, tiles))
}

fn kml_tiles(text: &str) -> Result<Vec<(String, Geometry<f64>)>> {
    let mut tiles = Vec::new();
    for (index, pm) in parse_kml(text)?.into_iter().enumerate() {
        let id = pm.label(index);
        if pm.polygons.is_empty() {
            return Err(GeometryInputError::NonPolygonal {
                kind: InputKind::Tile,
                id,
                found: pm
                    .other_geometry
                    .unwrap_or_else(|| "no geometry".to_string()),
            }
            .into());
        }
        let geometry = Geometry::MultiPolygon(pm.geometry());
        tiles.push((id, geometry));
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn grid_config(path: PathBuf) -> GridConfig {
        GridConfig {
            path,
            id_property: "Name".to_string(),
            crs: None,
        }
    }

    const GRID: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"Name":"31TCJ"},
         "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
        {"type":"Feature","id":"31TDJ","properties":{},
         "geometry":{"type":"Polygon","coordinates":[[[1,0],[2,0],[2,1],[1,1],[1,0]]]}}
    ]}"#;

    #[test]
    fn loads_geojson_grid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tiles.geojson");
        fs::write(&path, GRID).unwrap();
        let grid = load_tile_grid(&grid_config(path)).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.crs(), Crs::WGS84);
        assert_eq!(grid.tiles()[0].id, "31TCJ");
        assert_eq!(grid.tiles()[1].id, "31TDJ");
    }

    #[test]
    fn configured_crs_must_match_declared() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tiles.geojson");
        fs::write(&path, GRID).unwrap();
        let mut config = grid_config(path);
        config.crs = Some(Crs::from_epsg(32631));
        // The file declares nothing, so the configured CRS applies and the
        // degree coordinates are accepted as metres.
        let grid = load_tile_grid(&config).unwrap();
        assert_eq!(grid.crs().code(), 32631);

        assert!(resolve_crs(Some(Crs::WGS84), Some(Crs::from_epsg(32631))).is_err());
    }

    #[test]
    fn loads_kml_grid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tiles.kml");
        fs::write(
            &path,
            r#"<kml><Document><Placemark><name>31TCJ</name><MultiGeometry>
                <Polygon><outerBoundaryIs><LinearRing><coordinates>0,0,0 1,0,0 1,1,0 0,1,0 0,0,0</coordinates></LinearRing></outerBoundaryIs></Polygon>
                <Point><coordinates>0.5,0.5,0</coordinates></Point>
            </MultiGeometry></Placemark></Document></kml>"#,
        )
        .unwrap();
        let grid = load_tile_grid(&grid_config(path)).unwrap();
        assert_eq!(grid.tiles()[0].id, "31TCJ");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tiles.geojson");
        fs::write(&path, GRID.replace("\"id\":\"31TDJ\",\"properties\":{}", "\"properties\":{\"Name\":\"31TCJ\"}")).unwrap();
        let err = load_tile_grid(&grid_config(path)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GeometryInputError>(),
            Some(GeometryInputError::DuplicateTileId { .. })
        ));
    }

    #[test]
    fn missing_id_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tiles.geojson");
        fs::write(&path, GRID.replace("\"id\":\"31TDJ\",", "")).unwrap();
        assert!(load_tile_grid(&grid_config(path)).is_err());
    }
}
