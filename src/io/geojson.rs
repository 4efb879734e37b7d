//! GeoJSON FeatureCollection reading and writing.

use std::fs;
use std::path::Path;

use geo::Geometry;
use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue};
use tracing::{debug, info, warn};

use super::path::require_exists;
use super::wkt::to_wkt;
use crate::crs::Crs;
use crate::error::{GeoError, Result};
use crate::models::{columns, AttributeValue, Feature, FeatureLayer};

fn property_value(value: &JsonValue) -> AttributeValue {
    // Nested arrays and objects are kept as their JSON text
    serde_json::from_value(value.clone())
        .unwrap_or_else(|_| AttributeValue::Text(value.to_string()))
}

fn json_value(value: &AttributeValue) -> JsonValue {
    // Non-finite reals become null
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}

/// EPSG code from a legacy `"crs": {"type": "name", ...}` member
fn declared_crs(members: Option<&JsonObject>) -> Option<u32> {
    let name = members?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    if name.ends_with("CRS84") {
        return Some(4326);
    }
    name.rsplit(':').find(|s| !s.is_empty())?.parse().ok()
}

/// Read a GeoJSON file.
///
/// `forced` overrides any declared reference system. Otherwise a legacy `crs`
/// member is honoured and everything else is EPSG:4326 (RFC 7946).
pub fn read_geojson(path: &Path, forced: Option<Crs>) -> Result<FeatureLayer> {
    require_exists(path)?;
    info!("Reading GeoJSON from {}", path.display());

    let text = fs::read_to_string(path).map_err(|e| GeoError::parse(path, "open", e))?;
    let geojson = text
        .parse::<GeoJson>()
        .map_err(|e| GeoError::parse(path, "parse", e))?;

    let (features, members) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(f) => (vec![f], None),
        GeoJson::Geometry(g) => (
            vec![geojson::Feature {
                bbox: None,
                geometry: Some(g),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            None,
        ),
    };

    let crs = match forced {
        Some(crs) => crs,
        None => match declared_crs(members.as_ref()) {
            Some(epsg) => Crs::from_epsg(epsg)?,
            None => Crs::WGS84,
        },
    };

    // Property keys in first-seen order
    let mut names: Vec<String> = Vec::new();
    for feature in &features {
        if let Some(properties) = &feature.properties {
            for key in properties.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
    }

    let mut layer =
        FeatureLayer::new(path.display().to_string(), names.clone()).with_crs(Some(crs));
    for (row, feature) in features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(g) => Some(Geometry::<f64>::try_from(g).map_err(|e| {
                GeoError::parse(path, "convert", format!("feature {}: {}", row, e))
            })?),
            None => None,
        };
        let attributes = names
            .iter()
            .map(|name| {
                feature
                    .properties
                    .as_ref()
                    .and_then(|p| p.get(name))
                    .map(property_value)
                    .unwrap_or_default()
            })
            .collect();
        layer.push(Feature::new(geometry, attributes));
    }

    if layer.is_empty() {
        warn!("{} contains no features", path.display());
    }
    debug!("{} declares {}", path.display(), crs);
    info!("Loaded {} features from {}", layer.len(), path.display());
    Ok(layer)
}

/// Write a layer as a FeatureCollection; the centroid is a WKT property
pub fn write_geojson(layer: &FeatureLayer, path: &Path) -> Result<()> {
    let (has_area, has_centroid) = layer.has_derived();

    let features = layer
        .features()
        .iter()
        .map(|feature| {
            let mut properties = JsonObject::new();
            for (name, value) in layer.columns().iter().zip(&feature.attributes) {
                properties.insert(name.clone(), json_value(value));
            }
            if has_area {
                properties.insert(
                    columns::AREA_KM2.to_string(),
                    json_value(&feature.area_km2.map(AttributeValue::Real).unwrap_or_default()),
                );
            }
            if has_centroid {
                properties.insert(
                    columns::CENTROID.to_string(),
                    feature
                        .centroid
                        .map(|p| JsonValue::String(to_wkt(&p.into())))
                        .unwrap_or(JsonValue::Null),
                );
            }
            geojson::Feature {
                bbox: None,
                geometry: feature
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = match layer.crs() {
        Some(crs) if crs != Crs::WGS84 => {
            let mut members = JsonObject::new();
            members.insert(
                "crs".to_string(),
                serde_json::json!({
                    "type": "name",
                    "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", crs.epsg()) }
                }),
            );
            Some(members)
        }
        _ => None,
    };

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };
    fs::write(path, collection.to_string()).map_err(|e| GeoError::write(path, e))?;
    info!("Wrote {} features to {}", layer.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [151.2, -33.8]},
                "properties": {"TA2024_NAM": "Far North District", "code": 1}
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": {"TA2024_NAM": "Whangarei District", "extra": true}
            }
        ]
    }"#;

    #[test]
    fn test_property_conversion() {
        assert_eq!(property_value(&serde_json::json!(7)), AttributeValue::Integer(7));
        assert_eq!(property_value(&serde_json::json!(2.5)), AttributeValue::Real(2.5));
        assert_eq!(property_value(&JsonValue::Null), AttributeValue::Null);
        assert_eq!(
            property_value(&serde_json::json!([1, 2])),
            AttributeValue::Text("[1,2]".into())
        );
        assert_eq!(json_value(&AttributeValue::Real(f64::NAN)), JsonValue::Null);
        assert_eq!(json_value(&"Hobart".into()), serde_json::json!("Hobart"));
    }

    #[test]
    fn test_read_defaults_to_wgs84() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ta.geojson");
        fs::write(&path, COLLECTION).unwrap();

        let layer = read_geojson(&path, None).unwrap();
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.crs(), Some(Crs::WGS84));
        assert_eq!(layer.columns().len(), 3);
        assert_eq!(layer.get(0, "code"), Some(&AttributeValue::Integer(1)));
        assert!(layer.get(0, "extra").unwrap().is_null());
        assert!(layer.features()[1].geometry.is_none());
    }

    #[test]
    fn test_forced_crs_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ta.geojson");
        fs::write(&path, COLLECTION).unwrap();
        let layer = read_geojson(&path, Some(Crs::GDA2020)).unwrap();
        assert_eq!(layer.crs(), Some(Crs::GDA2020));
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.geojson");

        let mut layer = FeatureLayer::new("t", vec!["region_name".into()])
            .with_crs(Some(Crs::WEB_MERCATOR));
        let mut feature = Feature::new(
            Some(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)].into()),
            vec!["Hobart".into()],
        );
        feature.area_km2 = Some(0.5);
        layer.push(feature);

        write_geojson(&layer, &path).unwrap();
        let back = read_geojson(&path, None).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.crs(), Some(Crs::WEB_MERCATOR));
        assert_eq!(back.text(0, "region_name").as_deref(), Some("Hobart"));
        assert_eq!(back.get(0, "area_km2"), Some(&AttributeValue::Real(0.5)));
        assert!(matches!(back.features()[0].geometry, Some(Geometry::Polygon(_))));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.geojson");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            read_geojson(&path, None),
            Err(GeoError::ParseFailure { .. })
        ));
    }
}
