//! Restrict a fine-grained layer to the rows inside named boundaries.

use std::str::FromStr;

use geo::{Geometry, InteriorPoint, Relate};
use hashbrown::HashMap;
use tracing::{debug, info};

use super::index::BoundaryIndex;
use crate::error::{GeoError, Result};
use crate::io::reproject;
use crate::models::{columns, AttributeValue, Feature, FeatureLayer};

/// Spatial relation a feature must have with a boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Predicate {
    /// Feature lies in the boundary's interior (touching the edge is not enough)
    #[default]
    Within,
    /// Feature shares at least one point with the boundary
    Intersects,
}

/// Which part of the feature is tested against the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    #[default]
    Geometry,
    /// Test only the feature's interior point
    RepresentativePoint,
}

impl FromStr for Predicate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "within" => Ok(Predicate::Within),
            "intersects" => Ok(Predicate::Intersects),
            other => Err(format!("unknown predicate '{}'", other)),
        }
    }
}

impl FromStr for JoinMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "geometry" | "polygon" => Ok(JoinMode::Geometry),
            "point" | "centroid" | "representative" => Ok(JoinMode::RepresentativePoint),
            other => Err(format!("unknown join mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FilterOptions {
    pub predicate: Predicate,
    pub mode: JoinMode,
}

fn probe(geometry: &Geometry<f64>, mode: JoinMode) -> Option<Geometry<f64>> {
    match mode {
        JoinMode::Geometry => Some(geometry.clone()),
        JoinMode::RepresentativePoint => geometry.interior_point().map(Geometry::Point),
    }
}

/// Join `layer` against the indexed boundaries.
///
/// Emits one row per (feature, boundary) match, in feature order, with
/// `boundary_code` and `boundary_name` appended. The result is in the
/// boundaries' reference system.
pub fn spatial_filter(
    layer: &FeatureLayer,
    index: &BoundaryIndex,
    options: &FilterOptions,
) -> Result<FeatureLayer> {
    let layer_crs = layer
        .crs()
        .ok_or_else(|| GeoError::MissingReferenceSystem(layer.name.clone()))?;
    let index_crs = index
        .crs()
        .ok_or_else(|| GeoError::MissingReferenceSystem("boundary layer".to_string()))?;

    let reprojected;
    let source = if layer_crs != index_crs {
        let mut copy = layer.clone();
        reproject(&mut copy, index_crs)?;
        reprojected = copy;
        &reprojected
    } else {
        layer
    };

    let mut out = source.empty_like();
    let code_idx = out.add_column(columns::BOUNDARY_CODE);
    let name_idx = out.add_column(columns::BOUNDARY_NAME);

    for feature in source.features() {
        let Some(test) = feature.geometry.as_ref().and_then(|g| probe(g, options.mode)) else {
            continue;
        };
        for candidate in index.candidates(&test) {
            let boundary = &candidate.boundary;
            let matrix = test.relate(&boundary.geometry);
            let hit = match options.predicate {
                Predicate::Within => matrix.is_within(),
                Predicate::Intersects => matrix.is_intersects(),
            };
            if !hit {
                continue;
            }
            let mut joined: Feature = feature.clone();
            joined.attributes.resize(out.columns().len(), AttributeValue::Null);
            joined.attributes[code_idx] = AttributeValue::Text(boundary.code.clone());
            joined.attributes[name_idx] = AttributeValue::Text(boundary.name.clone());
            out.push(joined);
        }
    }

    info!(
        "{:?} {:?} join kept {} rows of {} against {} boundaries",
        options.predicate,
        options.mode,
        out.len(),
        layer.len(),
        index.len()
    );
    Ok(out)
}

/// Carry forward a subset of columns, renaming each `(from, to)` pair
pub fn select_columns(layer: &FeatureLayer, selection: &[(&str, &str)]) -> Result<FeatureLayer> {
    let indices = selection
        .iter()
        .map(|(from, _)| {
            layer.column_index(from).ok_or_else(|| {
                GeoError::parse(
                    &layer.name,
                    "select columns of",
                    format!("column '{}' not found", from),
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let names = selection.iter().map(|(_, to)| to.to_string()).collect();
    let mut out = FeatureLayer::new(layer.name.clone(), names).with_crs(layer.crs());
    for feature in layer.features() {
        let mut selected = Feature::new(
            feature.geometry.clone(),
            indices.iter().map(|&i| feature.attributes[i].clone()).collect(),
        );
        selected.area_km2 = feature.area_km2;
        selected.centroid = feature.centroid;
        out.push(selected);
    }
    debug!("Selected {} columns from {}", selection.len(), layer.name);
    Ok(out)
}

/// Split a joined layer per `boundary_code`, in order of first appearance
pub fn partition_by_boundary(layer: &FeatureLayer) -> Result<Vec<(String, FeatureLayer)>> {
    let idx = layer.column_index(columns::BOUNDARY_CODE).ok_or_else(|| {
        GeoError::parse(
            &layer.name,
            "partition",
            format!("column '{}' not found", columns::BOUNDARY_CODE),
        )
    })?;

    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut parts: Vec<(String, FeatureLayer)> = Vec::new();
    for feature in layer.features() {
        let code = feature.attributes[idx].to_string();
        let pos = *positions.entry(code.clone()).or_insert_with(|| {
            let mut part = layer.empty_like();
            part.name = format!("{}:{}", layer.name, code);
            parts.push((code.clone(), part));
            parts.len() - 1
        });
        parts[pos].1.push(feature.clone());
    }
    Ok(parts)
}
