//! Minimal KML reader for acquisition plans and tiling grids.
//!
//! Extracts each `Placemark` with its name, the name of its enclosing
//! `Folder`, `ExtendedData` values (`Data`/`value` and `SimpleData`), a
//! `TimeSpan`, and its polygons (directly or inside `MultiGeometry`).
//! Other geometry types are noted but not converted.

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;

/// One KML placemark.
#[derive(Debug, Clone, Default)]
pub struct Placemark {
    pub name: Option<String>,
    /// Name of the innermost enclosing folder.
    pub folder: Option<String>,
    pub data: BTreeMap<String, String>,
    pub begin: Option<String>,
    pub end: Option<String>,
    pub polygons: Vec<Polygon<f64>>,
    /// First non-polygon geometry element seen, e.g. `LineString`. Only
    /// meaningful when `polygons` is empty.
    pub other_geometry: Option<String>,
}

impl Placemark {
    pub fn data(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn geometry(&self) -> MultiPolygon<f64> {
        MultiPolygon(self.polygons.clone())
    }

    /// Name, or a positional fallback, for messages.
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("placemark #{}", index + 1))
    }
}

#[derive(Default)]
struct PolygonBuilder {
    exterior: Option<LineString<f64>>,
    interiors: Vec<LineString<f64>>,
}

pub fn parse_kml(text: &str) -> Result<Vec<Placemark>> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut folders: Vec<Option<String>> = Vec::new();
    let mut placemarks = Vec::new();
    let mut current: Option<Placemark> = None;
    let mut polygon: Option<PolygonBuilder> = None;
    let mut data_name: Option<String> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                text_buf.clear();
                match name.as_str() {
                    "Folder" => folders.push(None),
                    "Placemark" => {
                        current = Some(Placemark {
                            folder: folders.iter().rev().find_map(|f| f.clone()),
                            ..Placemark::default()
                        });
                    }
                    "Polygon" => polygon = Some(PolygonBuilder::default()),
                    "Data" | "SimpleData" => {
                        data_name = match e.try_get_attribute("name")? {
                            Some(attr) => Some(attr.unescape_value()?.into_owned()),
                            None => None,
                        };
                    }
                    "Point" | "LineString" | "Model" | "Track" => {
                        if let Some(pm) = current.as_mut() {
                            if polygon.is_none() && pm.other_geometry.is_none() {
                                pm.other_geometry = Some(name.clone());
                            }
                        }
                    }
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::Text(t)) => {
                text_buf.push_str(&t.unescape()?);
            }
            Ok(Event::CData(c)) => {
                text_buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                path.pop();
                let parent = path.last().map(String::as_str);
                let value = text_buf.trim().to_string();
                match (name.as_str(), parent) {
                    ("name", Some("Folder")) => {
                        if let Some(top) = folders.last_mut() {
                            *top = Some(value);
                        }
                    }
                    ("name", Some("Placemark")) => {
                        if let Some(pm) = current.as_mut() {
                            pm.name = Some(value);
                        }
                    }
                    ("value", Some("Data")) | ("SimpleData", _) => {
                        if let (Some(pm), Some(key)) = (current.as_mut(), data_name.as_ref()) {
                            pm.data.insert(key.clone(), value);
                        }
                    }
                    ("begin", Some("TimeSpan")) => {
                        if let Some(pm) = current.as_mut() {
                            pm.begin = Some(value);
                        }
                    }
                    ("end", Some("TimeSpan")) => {
                        if let Some(pm) = current.as_mut() {
                            pm.end = Some(value);
                        }
                    }
                    ("coordinates", _) => {
                        if let Some(builder) = polygon.as_mut() {
                            let ring = parse_coordinates(&value).with_context(|| {
                                format!("bad coordinates near byte {}", reader.buffer_position())
                            })?;
                            if path.iter().any(|p| p == "innerBoundaryIs") {
                                builder.interiors.push(ring);
                            } else if path.iter().any(|p| p == "outerBoundaryIs") {
                                builder.exterior = Some(ring);
                            }
                        }
                    }
                    ("Polygon", _) => {
                        if let Some(builder) = polygon.take() {
                            let Some(exterior) = builder.exterior else {
                                bail!("Polygon without outerBoundaryIs");
                            };
                            if let Some(pm) = current.as_mut() {
                                pm.polygons.push(Polygon::new(exterior, builder.interiors));
                            }
                        }
                    }
                    ("Data", _) => data_name = None,
                    ("Placemark", _) => {
                        if let Some(pm) = current.take() {
                            placemarks.push(pm);
                        }
                    }
                    ("Folder", _) => {
                        folders.pop();
                    }
                    _ => {}
                }
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!(
                "KML parse error at byte {}: {}",
                reader.buffer_position(),
                e
            ),
            _ => {}
        }
    }

    Ok(placemarks)
}

/// Parses a KML coordinate list: whitespace-separated `lon,lat[,alt]` tuples.
pub fn parse_coordinates(text: &str) -> Result<LineString<f64>> {
    let mut coords = Vec::new();
    for tuple in text.split_whitespace() {
        let mut parts = tuple.split(',');
        let (Some(x), Some(y)) = (parts.next(), parts.next()) else {
            bail!("coordinate tuple '{}' needs at least lon,lat", tuple);
        };
        let x: f64 = x
            .parse()
            .with_context(|| format!("invalid longitude in '{}'", tuple))?;
        let y: f64 = y
            .parse()
            .with_context(|| format!("invalid latitude in '{}'", tuple))?;
        coords.push(Coord { x, y });
    }
    Ok(LineString::new(coords))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
<Document>
  <Folder>
    <name>NOMINAL</name>
    <Placemark>
      <name>DT 1</name>
      <TimeSpan><begin>2024-01-04T10:20:00.000</begin><end>2024-01-04T10:25:00.000</end></TimeSpan>
      <ExtendedData>
        <Data name="Mode"><value>NOMINAL</value></Data>
        <Data name="OrbitRelative"><value>22</value></Data>
      </ExtendedData>
      <Polygon><outerBoundaryIs><LinearRing>
        <coordinates>0,0,0 1,0,0 1,1,0 0,1,0 0,0,0</coordinates>
      </LinearRing></outerBoundaryIs></Polygon>
    </Placemark>
  </Folder>
  <Folder>
    <name>CALIBRATION</name>
    <Placemark>
      <name>CAL 1</name>
      <ExtendedData><SchemaData><SimpleData name="OrbitRelative">7</SimpleData></SchemaData></ExtendedData>
      <MultiGeometry>
        <Polygon><outerBoundaryIs><LinearRing><coordinates>2,0 3,0 3,1 2,0</coordinates></LinearRing></outerBoundaryIs>
          <innerBoundaryIs><LinearRing><coordinates>2.5,0.1 2.6,0.1 2.6,0.2 2.5,0.1</coordinates></LinearRing></innerBoundaryIs>
        </Polygon>
        <Point><coordinates>2.5,0.5</coordinates></Point>
      </MultiGeometry>
    </Placemark>
  </Folder>
  <Placemark><name>track</name><LineString><coordinates>0,0 1,1</coordinates></LineString></Placemark>
</Document>
</kml>"#;

    #[test]
    fn extracts_placemarks() {
        let placemarks = parse_kml(PLAN).unwrap();
        assert_eq!(placemarks.len(), 3);

        let first = &placemarks[0];
        assert_eq!(first.name.as_deref(), Some("DT 1"));
        assert_eq!(first.folder.as_deref(), Some("NOMINAL"));
        assert_eq!(first.data("Mode"), Some("NOMINAL"));
        assert_eq!(first.data("OrbitRelative"), Some("22"));
        assert_eq!(first.begin.as_deref(), Some("2024-01-04T10:20:00.000"));
        assert_eq!(first.polygons.len(), 1);
        assert_eq!(first.polygons[0].exterior().0.len(), 5);

        let second = &placemarks[1];
        assert_eq!(second.folder.as_deref(), Some("CALIBRATION"));
        assert_eq!(second.data("OrbitRelative"), Some("7"));
        assert_eq!(second.polygons.len(), 1);
        assert_eq!(second.polygons[0].interiors().len(), 1);
        assert_eq!(second.other_geometry.as_deref(), Some("Point"));

        let third = &placemarks[2];
        assert!(third.polygons.is_empty());
        assert_eq!(third.other_geometry.as_deref(), Some("LineString"));
        assert!(third.folder.is_none());
    }

    #[test]
    fn coordinates_need_two_values() {
        assert!(parse_coordinates("1.0").is_err());
        assert!(parse_coordinates("a,b").is_err());
        let ring = parse_coordinates(" 1,2,3\n 4,5 ").unwrap();
        assert_eq!(ring.0.len(), 2);
        assert_eq!(ring.0[1], Coord { x: 4.0, y: 5.0 });
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_kml("<kml><Placemark></kml>").is_err());
    }
}
