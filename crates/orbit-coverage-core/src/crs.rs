//! Coordinate reference systems and area measurement.
//!
//! For geographic reference systems (coordinates in degrees) the area is
//! the geodesic area on the WGS84 ellipsoid, in square metres. For
//! projected systems it is the planar area in squared CRS units, which is
//! square metres only when the projection's unit is the metre (UTM, LV95,
//! Lambert-93). Feet-based systems report square feet.
//!
//! ```rust
//! use orbit_coverage_core::crs::Crs;
//!
//! let crs: Crs = "urn:ogc:def:crs:EPSG::32631".parse().unwrap();
//! assert_eq!(crs.code(), 32631);
//! assert!(!crs.is_geographic());
//! assert!(Crs::WGS84.is_geographic());
//! ```

use std::fmt;
use std::str::FromStr;

use geo::orient::{Direction, Orient};
use geo::{Area, CoordsIter, GeodesicArea, MultiPolygon};
use serde::Deserialize;

use crate::error::GeometryInputError;

/// EPSG codes whose coordinates are longitude/latitude in degrees.
const GEOGRAPHIC_CODES: &[u32] = &[4326, 4258, 4269, 4979];

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs {
    code: u32,
}

impl Crs {
    /// WGS84 longitude/latitude, the GeoJSON and KML default.
    pub const WGS84: Crs = Crs { code: 4326 };

    pub fn from_epsg(code: u32) -> Self {
        Self { code }
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn is_geographic(&self) -> bool {
        GEOGRAPHIC_CODES.contains(&self.code)
    }

    /// OGC URN form, as used in legacy GeoJSON `crs` members.
    pub fn urn(&self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.code)
    }

    /// Area of `geometry`: geodesic square metres for geographic systems,
    /// squared CRS units otherwise.
    ///
    /// Geodesic area reads a clockwise exterior as the complement on the
    /// ellipsoid, so rings are oriented counter-clockwise first.
    pub fn area(&self, geometry: &MultiPolygon<f64>) -> f64 {
        if self.is_geographic() {
            geometry.orient(Direction::Default).geodesic_area_unsigned()
        } else {
            geometry.unsigned_area()
        }
    }

    /// Checks that every coordinate can be expressed in this CRS.
    ///
    /// Only geographic systems have a checkable domain; projected
    /// coordinates just need to be finite.
    pub fn check_coordinates(&self, geometry: &MultiPolygon<f64>) -> Result<(), String> {
        for coord in geometry.coords_iter() {
            if !coord.x.is_finite() || !coord.y.is_finite() {
                return Err(format!("non-finite coordinate ({}, {})", coord.x, coord.y));
            }
            if self.is_geographic()
                && (!(-180.0..=180.0).contains(&coord.x) || !(-90.0..=90.0).contains(&coord.y))
            {
                return Err(format!(
                    "coordinate ({}, {}) is outside longitude/latitude bounds",
                    coord.x, coord.y
                ));
            }
        }
        Ok(())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::WGS84
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.code)
    }
}

impl FromStr for Crs {
    type Err = GeometryInputError;

    /// Accepts `EPSG:4326`, `4326`, `urn:ogc:def:crs:EPSG::4326` and the
    /// OGC CRS84 URN.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower == "urn:ogc:def:crs:ogc:1.3:crs84" || lower == "crs84" {
            return Ok(Crs::WGS84);
        }
        let code = if let Some(rest) = lower.strip_prefix("urn:ogc:def:crs:epsg:") {
            // Version segment may be empty (`EPSG::4326`) or present (`EPSG:6.6:4326`).
            rest.rsplit(':').next().unwrap_or(rest)
        } else if let Some(rest) = lower.strip_prefix("epsg:") {
            rest
        } else {
            lower.as_str()
        };
        code.parse::<u32>()
            .map(Crs::from_epsg)
            .map_err(|_| GeometryInputError::UnknownCrs(trimmed.to_string()))
    }
}

impl<'de> Deserialize<'de> for Crs {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Unit for areas reported in the summary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum AreaUnit {
    #[serde(rename = "m2")]
    SquareMetres,
    #[default]
    #[serde(rename = "km2")]
    SquareKilometres,
}

impl AreaUnit {
    /// Converts an area in square metres to this unit.
    pub fn from_square_metres(&self, area: f64) -> f64 {
        match self {
            AreaUnit::SquareMetres => area,
            AreaUnit::SquareKilometres => area / 1_000_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    #[test]
    fn parses_common_forms() {
        assert_eq!("EPSG:4326".parse::<Crs>().unwrap(), Crs::WGS84);
        assert_eq!("epsg:32631".parse::<Crs>().unwrap().code(), 32631);
        assert_eq!("2056".parse::<Crs>().unwrap().code(), 2056);
        assert_eq!(
            "urn:ogc:def:crs:EPSG::32631".parse::<Crs>().unwrap().code(),
            32631
        );
        assert_eq!(
            "urn:ogc:def:crs:OGC:1.3:CRS84".parse::<Crs>().unwrap(),
            Crs::WGS84
        );
        assert!("web mercator".parse::<Crs>().is_err());
    }

    #[test]
    fn planar_area_for_projected() {
        let square = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 10_000.0, y: 0.0),
            (x: 10_000.0, y: 10_000.0),
            (x: 0.0, y: 10_000.0),
        ]]);
        let crs = Crs::from_epsg(32631);
        assert!((crs.area(&square) - 1.0e8).abs() < 1e-6);
    }

    #[test]
    fn geodesic_area_for_geographic() {
        // One degree square at the equator is roughly 12,300 km².
        let square = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]]);
        let km2 = AreaUnit::SquareKilometres.from_square_metres(Crs::WGS84.area(&square));
        assert!((12_200.0..12_400.0).contains(&km2), "got {}", km2);
    }

    fn degree_square(clockwise: bool) -> MultiPolygon<f64> {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        if clockwise {
            MultiPolygon(vec![poly.orient(Direction::Reversed)])
        } else {
            MultiPolygon(vec![poly])
        }
    }

    #[test]
    fn geodesic_area_ignores_winding() {
        let ccw = Crs::WGS84.area(&degree_square(false));
        let cw = Crs::WGS84.area(&degree_square(true));
        assert!((ccw - cw).abs() < 1.0, "ccw {} cw {}", ccw, cw);
        assert!(cw < 1.3e10, "clockwise ring measured as {}", cw);
    }

    #[test]
    fn rejects_out_of_range_degrees() {
        let projected_looking = MultiPolygon(vec![polygon![
            (x: 500_000.0, y: 0.0),
            (x: 510_000.0, y: 0.0),
            (x: 510_000.0, y: 10_000.0),
        ]]);
        assert!(Crs::WGS84.check_coordinates(&projected_looking).is_err());
        assert!(Crs::from_epsg(32631)
            .check_coordinates(&projected_looking)
            .is_ok());
    }
}
