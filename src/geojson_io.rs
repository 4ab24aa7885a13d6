//! GeoJSON reading and writing.
//!
//! RFC 7946 documents are WGS84. Older documents may carry a `crs` member
//! naming an EPSG code; it is honoured on read and written back for
//! artifacts in projected systems.

use anyhow::{bail, Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use orbit_coverage_core::crs::Crs;
use orbit_coverage_core::engine::ArtifactRequest;
use orbit_coverage_core::time::format_summary;
use std::path::Path;

/// A parsed feature collection and the CRS it declares, if any.
pub struct FeatureDocument {
    pub features: Vec<Feature>,
    pub declared_crs: Option<Crs>,
}

impl FeatureDocument {
    /// CRS of the document: the declared one, otherwise WGS84.
    pub fn crs(&self) -> Crs {
        self.declared_crs.unwrap_or(Crs::WGS84)
    }
}

pub fn read_features(path: &Path) -> Result<FeatureDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read GeoJSON file: {}", path.display()))?;
    parse_features(&text).with_context(|| format!("Invalid GeoJSON in {}", path.display()))
}

pub fn parse_features(text: &str) -> Result<FeatureDocument> {
    let geojson: GeoJson = text.parse()?;
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            let declared_crs = match &fc.foreign_members {
                Some(members) => crs_from_members(members)?,
                None => None,
            };
            Ok(FeatureDocument {
                features: fc.features,
                declared_crs,
            })
        }
        GeoJson::Feature(feature) => {
            let declared_crs = match &feature.foreign_members {
                Some(members) => crs_from_members(members)?,
                None => None,
            };
            Ok(FeatureDocument {
                features: vec![feature],
                declared_crs,
            })
        }
        GeoJson::Geometry(_) => bail!("expected a FeatureCollection, found a bare Geometry"),
    }
}

fn crs_from_members(members: &JsonObject) -> Result<Option<Crs>> {
    let Some(crs) = members.get("crs") else {
        return Ok(None);
    };
    let name = crs
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| anyhow::anyhow!("unsupported crs member: {}", crs))?;
    Ok(Some(name.parse()?))
}

fn crs_members(crs: Crs) -> Option<JsonObject> {
    if crs == Crs::WGS84 {
        return None;
    }
    let mut members = JsonObject::new();
    members.insert(
        "crs".to_string(),
        serde_json::json!({ "type": "name", "properties": { "name": crs.urn() } }),
    );
    Some(members)
}

/// String form of a feature property. Numbers are printed as-is.
pub fn property_string(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First present property among `keys`.
pub fn first_property(feature: &Feature, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| property_string(feature, key))
}

/// Serialises one overlap artifact as a single-feature collection.
pub fn artifact_document(artifact: &ArtifactRequest<'_>) -> String {
    let footprint = artifact.footprint;
    let mut properties = JsonObject::new();
    properties.insert("tile".to_string(), JsonValue::from(artifact.tile_id));
    properties.insert(
        "orbit".to_string(),
        JsonValue::from(footprint.relative_orbit_id.as_str()),
    );
    properties.insert(
        "satellite".to_string(),
        JsonValue::from(footprint.satellite_id.as_str()),
    );
    properties.insert(
        "begin".to_string(),
        JsonValue::from(format_summary(&footprint.begin)),
    );
    properties.insert(
        "end".to_string(),
        JsonValue::from(format_summary(&footprint.end)),
    );

    let feature = Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(
            artifact.geometry,
        ))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    };
    FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: crs_members(artifact.crs),
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crs_member_is_read() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::32631" } },
            "features": []
        }"#;
        let doc = parse_features(text).unwrap();
        assert_eq!(doc.crs().code(), 32631);
    }

    #[test]
    fn missing_crs_is_wgs84() {
        let doc = parse_features(r#"{"type":"FeatureCollection","features":[]}"#).unwrap();
        assert!(doc.declared_crs.is_none());
        assert_eq!(doc.crs(), Crs::WGS84);
    }

    #[test]
    fn numeric_properties_become_strings() {
        let doc = parse_features(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":null,"properties":{"OrbitRelative":22,"Name":"31TCJ"}}
            ]}"#,
        )
        .unwrap();
        let f = &doc.features[0];
        assert_eq!(
            first_property(f, &["relative_orbit", "OrbitRelative"]).as_deref(),
            Some("22")
        );
        assert_eq!(property_string(f, "Name").as_deref(), Some("31TCJ"));
        assert!(property_string(f, "missing").is_none());
    }

    #[test]
    fn bare_geometry_is_rejected() {
        assert!(parse_features(r#"{"type":"Point","coordinates":[0,0]}"#).is_err());
    }
}
