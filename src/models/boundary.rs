//! Named boundary polygons used as join targets.

use geo::{BoundingRect, Geometry, MultiPolygon};
use tracing::{debug, info};

use crate::error::{GeoError, Result};
use crate::models::FeatureLayer;

/// A single boundary polygon with its code and name
#[derive(Debug, Clone)]
pub struct BoundaryRecord {
    pub code: String,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

impl BoundaryRecord {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            geometry,
        }
    }

    /// Get the bounding box of this boundary
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

/// Only areal geometry can serve as a boundary
pub fn as_multipolygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        _ => None,
    }
}

/// Build boundary records from a layer.
///
/// Keeps rows whose `code_column` value is in `codes`, or every row when
/// `codes` is empty. Rows without areal geometry are skipped.
pub fn boundaries_from_layer(
    layer: &FeatureLayer,
    code_column: &str,
    name_column: &str,
    codes: &[String],
) -> Result<Vec<BoundaryRecord>> {
    for column in [code_column, name_column] {
        if !layer.has_column(column) {
            return Err(GeoError::parse(
                &layer.name,
                "read boundaries",
                format!("column '{}' not found", column),
            ));
        }
    }

    let mut boundaries = Vec::new();

    for (row, feature) in layer.features().iter().enumerate() {
        let Some(code) = layer.text(row, code_column) else {
            continue;
        };
        if !codes.is_empty() && !codes.iter().any(|c| c == &code) {
            continue;
        }

        let Some(geometry) = feature.geometry.as_ref().and_then(as_multipolygon) else {
            debug!("Boundary {} has no areal geometry, skipping", code);
            continue;
        };

        let name = layer.text(row, name_column).unwrap_or_default();
        boundaries.push(BoundaryRecord::new(code, name, geometry));
    }

    if boundaries.is_empty() {
        return Err(GeoError::EmptyData(format!(
            "no boundaries in {} matched {:?}",
            layer.name, codes
        )));
    }

    info!("Loaded {} boundaries from {}", boundaries.len(), layer.name);
    Ok(boundaries)
}
