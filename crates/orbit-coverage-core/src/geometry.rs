//! Geometry normalisation, validation, and intersection classification.

use geo::algorithm::line_intersection::line_intersection;
use geo::{Area, Coord, Geometry, Line, LineString, MultiPolygon, Polygon};

/// Intersections whose parts are smaller than this fraction of the tile's
/// planar area are treated as edge or vertex contacts.
const DEGENERATE_RATIO: f64 = 1e-12;

/// Outcome of intersecting a tile with a footprint.
#[derive(Debug, Clone, PartialEq)]
pub enum IntersectionKind {
    /// The geometries do not meet.
    Empty,
    /// The geometries only share edges or vertices (a line or point contact).
    Degenerate,
    /// A genuine area overlap.
    Polygonal(MultiPolygon<f64>),
}

/// Human readable name of a geometry variant, for error messages.
pub fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Converts any polygonal geometry to a `MultiPolygon`.
///
/// Geometry collections are accepted when every member is polygonal. On
/// failure the name of the offending geometry type is returned.
pub fn to_multipolygon(geometry: Geometry<f64>) -> Result<MultiPolygon<f64>, &'static str> {
    match geometry {
        Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
        Geometry::MultiPolygon(mp) => Ok(mp),
        Geometry::Rect(r) => Ok(MultiPolygon(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Ok(MultiPolygon(vec![t.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let mut polygons = Vec::new();
            for member in gc.0 {
                polygons.extend(to_multipolygon(member)?.0);
            }
            Ok(MultiPolygon(polygons))
        }
        other => Err(geometry_type_name(&other)),
    }
}

/// Validates a polygonal geometry.
///
/// Every ring must be closed, have at least three distinct vertices, and not
/// cross or touch itself; every exterior ring must enclose a positive area.
pub fn validate(geometry: &MultiPolygon<f64>) -> Result<(), String> {
    if geometry.0.is_empty() {
        return Err("geometry has no polygons".to_string());
    }
    for (i, polygon) in geometry.0.iter().enumerate() {
        validate_ring(polygon.exterior())
            .map_err(|e| format!("polygon {} exterior: {}", i, e))?;
        for (j, interior) in polygon.interiors().iter().enumerate() {
            validate_ring(interior).map_err(|e| format!("polygon {} hole {}: {}", i, j, e))?;
        }
        if Polygon::new(polygon.exterior().clone(), vec![]).unsigned_area() <= 0.0 {
            return Err(format!("polygon {} has zero area", i));
        }
    }
    Ok(())
}

fn validate_ring(ring: &LineString<f64>) -> Result<(), String> {
    let coords = &ring.0;
    if coords.len() < 4 {
        return Err(format!("ring has {} coordinates, need at least 4", coords.len()));
    }
    if coords.first() != coords.last() {
        return Err("ring is not closed".to_string());
    }

    // Consecutive duplicates produce zero-length edges, skip them.
    let mut vertices: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
    for c in coords {
        if vertices.last() != Some(c) {
            vertices.push(*c);
        }
    }
    if vertices.len() < 4 {
        return Err("ring has fewer than 3 distinct vertices".to_string());
    }

    let edges: Vec<Line<f64>> = vertices.windows(2).map(|w| Line::new(w[0], w[1])).collect();
    let n = edges.len();
    for i in 0..n {
        for j in (i + 2)..n {
            // The first and last edges share the closing vertex.
            if i == 0 && j == n - 1 {
                continue;
            }
            if line_intersection(edges[i], edges[j]).is_some() {
                return Err(format!(
                    "ring self-intersects near ({}, {})",
                    edges[j].start.x, edges[j].start.y
                ));
            }
        }
    }
    Ok(())
}

/// Classifies a raw intersection result.
///
/// `reference_area` is the planar area of the tile, in the same coordinate
/// units as the intersection. Parts below the degeneracy threshold are
/// dropped; if nothing with area remains the contact is degenerate.
pub fn classify_intersection(
    intersection: MultiPolygon<f64>,
    reference_area: f64,
) -> IntersectionKind {
    if intersection.0.is_empty() {
        return IntersectionKind::Empty;
    }
    let threshold = reference_area * DEGENERATE_RATIO;
    let parts: Vec<Polygon<f64>> = intersection
        .0
        .into_iter()
        .filter(|p| p.unsigned_area() > threshold)
        .collect();
    if parts.is_empty() {
        IntersectionKind::Degenerate
    } else {
        IntersectionKind::Polygonal(MultiPolygon(parts))
    }
}
