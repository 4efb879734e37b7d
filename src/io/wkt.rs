//! Well-Known-Text interchange for geometry columns.

use geo::Geometry;
use wkt::{ToWkt, TryFromWkt};

use crate::error::{GeoError, Result};
use crate::models::{AttributeValue, FeatureLayer};

pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

pub fn from_wkt(text: &str) -> Result<Geometry<f64>> {
    Geometry::try_from_wkt_str(text.trim())
        .map_err(|e| GeoError::parse(format!("'{}'", text), "parse WKT", e))
}

/// Move geometries into a text column holding their WKT (nulls stay null)
pub fn geometry_to_wkt_column(layer: &mut FeatureLayer, column: &str) {
    let idx = layer.add_column(column);
    for feature in layer.features_mut() {
        feature.attributes[idx] = match feature.geometry.take() {
            Some(geometry) => AttributeValue::Text(to_wkt(&geometry)),
            None => AttributeValue::Null,
        };
    }
}

/// Parse a WKT text column into feature geometries, leaving the column intact
pub fn wkt_column_to_geometry(layer: &mut FeatureLayer, column: &str) -> Result<()> {
    let idx = layer.column_index(column).ok_or_else(|| {
        GeoError::parse(
            &layer.name,
            "read WKT column",
            format!("column '{}' not found", column),
        )
    })?;

    let name = layer.name.clone();
    for (row, feature) in layer.features_mut().iter_mut().enumerate() {
        feature.geometry = match &feature.attributes[idx] {
            AttributeValue::Null => None,
            AttributeValue::Text(text) if text.trim().is_empty() => None,
            AttributeValue::Text(text) => Some(from_wkt(text).map_err(|e| {
                GeoError::parse(&name, "parse WKT", format!("row {}: {}", row + 1, e))
            })?),
            other => {
                return Err(GeoError::parse(
                    &name,
                    "parse WKT",
                    format!("row {}: expected text, found {:?}", row + 1, other),
                ))
            }
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feature;
    use geo::{polygon, Coord, CoordsIter};

    fn assert_same(a: &Geometry<f64>, b: &Geometry<f64>) {
        assert_eq!(std::mem::discriminant(a), std::mem::discriminant(b));
        let ca: Vec<Coord<f64>> = a.coords_iter().collect();
        let cb: Vec<Coord<f64>> = b.coords_iter().collect();
        assert_eq!(ca.len(), cb.len());
        for (p, q) in ca.iter().zip(&cb) {
            assert!((p.x - q.x).abs() < 1e-12 && (p.y - q.y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_polygon_round_trip() {
        let original: Geometry<f64> = polygon![
            (x: 151.1, y: -33.9),
            (x: 151.3, y: -33.9),
            (x: 151.3, y: -33.7),
            (x: 151.1, y: -33.9),
        ]
        .into();
        let parsed = from_wkt(&to_wkt(&original)).unwrap();
        assert_same(&original, &parsed);
    }

    #[test]
    fn test_invalid_wkt() {
        assert!(matches!(
            from_wkt("POLYGON((1 2, 3"),
            Err(GeoError::ParseFailure { .. })
        ));
    }

    #[test]
    fn test_column_conversion_both_ways() {
        let mut layer = FeatureLayer::new("t", vec!["name".into()]);
        layer.push(Feature::new(
            Some(geo::point!(x: 1.5, y: -2.5).into()),
            vec!["a".into()],
        ));
        layer.push(Feature::new(None, vec!["b".into()]));

        geometry_to_wkt_column(&mut layer, "geometry");
        assert!(layer.features()[0].geometry.is_none());
        let text = layer.text(0, "geometry").unwrap();
        assert!(text.starts_with("POINT") && text.contains("1.5 -2.5"), "{}", text);
        assert!(layer.get(1, "geometry").unwrap().is_null());

        wkt_column_to_geometry(&mut layer, "geometry").unwrap();
        assert!(layer.features()[0].geometry.is_some());
        assert!(layer.features()[1].geometry.is_none());
    }
}
