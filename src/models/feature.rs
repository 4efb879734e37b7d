//! Tabular feature layer: ordered columns, ordered rows, one geometry each.

use std::borrow::Cow;
use std::fmt;

use geo::{Geometry, Point};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;

/// Canonical column names shared by every national schema.
pub mod columns {
    pub const REGION_CODE: &str = "region_code";
    pub const REGION_NAME: &str = "region_name";
    pub const STATE_NAME: &str = "state_name";
    pub const AREA_KM2: &str = "area_km2";
    pub const CENTROID: &str = "centroid";
    pub const GEOMETRY: &str = "geometry";
    pub const BOUNDARY_CODE: &str = "boundary_code";
    pub const BOUNDARY_NAME: &str = "boundary_name";
}

/// A single attribute cell
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Infer a typed value from delimited-text input
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return AttributeValue::Null;
        }
        // Leading zeros are codes, not numbers
        let looks_like_code = trimmed.len() > 1
            && trimmed.starts_with('0')
            && !trimmed.starts_with("0.");
        if !looks_like_code {
            if let Ok(i) = trimmed.parse::<i64>() {
                return AttributeValue::Integer(i);
            }
            if let Ok(r) = trimmed.parse::<f64>() {
                if r.is_finite() {
                    return AttributeValue::Real(r);
                }
            }
        }
        AttributeValue::Text(raw.to_string())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Real(r) => write!(f, "{}", r),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Real(value)
    }
}

/// One row of a layer
#[derive(Debug, Clone, Default)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    /// Values aligned with the layer's columns
    pub attributes: Vec<AttributeValue>,
    /// Planar area in km², set by the calculator
    pub area_km2: Option<f64>,
    /// Representative point, in the layer CRS
    pub centroid: Option<Point<f64>>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry<f64>>, attributes: Vec<AttributeValue>) -> Self {
        Self {
            geometry,
            attributes,
            area_km2: None,
            centroid: None,
        }
    }
}

/// In-memory table of features sharing one schema and CRS.
#[derive(Debug, Clone, Default)]
pub struct FeatureLayer {
    /// Source name, used in error messages
    pub name: String,
    columns: Vec<String>,
    features: Vec<Feature>,
    crs: Option<Crs>,
}

impl FeatureLayer {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            features: Vec::new(),
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn set_crs(&mut self, crs: Option<Crs>) {
        self.crs = crs;
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut [Feature] {
        &mut self.features
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row; attributes are padded or truncated to the schema width
    pub fn push(&mut self, mut feature: Feature) {
        feature
            .attributes
            .resize(self.columns.len(), AttributeValue::Null);
        self.features.push(feature);
    }

    /// Add a column filled with nulls (no-op if present); returns its index
    pub fn add_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for feature in &mut self.features {
            feature.attributes.push(AttributeValue::Null);
        }
        self.columns.len() - 1
    }

    /// Drop a column and its values; returns false if it does not exist
    pub fn remove_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(idx);
        for feature in &mut self.features {
            feature.attributes.remove(idx);
        }
        true
    }

    /// Rename one column; returns false if it does not exist
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&AttributeValue> {
        let idx = self.column_index(column)?;
        self.features.get(row)?.attributes.get(idx)
    }

    /// Text value of a column, stringifying numbers
    pub fn text(&self, row: usize, column: &str) -> Option<String> {
        match self.get(row, column)? {
            AttributeValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn set(&mut self, row: usize, column: &str, value: AttributeValue) {
        let idx = self.add_column(column);
        if let Some(feature) = self.features.get_mut(row) {
            feature.attributes[idx] = value;
        }
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[String], &Feature) -> bool,
    {
        let columns = &self.columns;
        self.features.retain(|f| keep(columns, f));
    }

    /// An empty layer with the same name, schema and CRS
    pub fn empty_like(&self) -> Self {
        Self {
            name: self.name.clone(),
            columns: self.columns.clone(),
            features: Vec::new(),
            crs: self.crs,
        }
    }

    /// Whether any row carries a derived (area, centroid) value
    pub fn has_derived(&self) -> (bool, bool) {
        let area = self.features.iter().any(|f| f.area_km2.is_some());
        let centroid = self.features.iter().any(|f| f.centroid.is_some());
        (area, centroid)
    }

    /// Drop stored columns that a writer is about to refill from the derived
    /// values: `area_km2`, plus `centroid_columns` when any row has a centroid
    pub fn replacing_derived(&self, centroid_columns: &[&str]) -> Cow<'_, FeatureLayer> {
        let (has_area, has_centroid) = self.has_derived();
        let mut stale: Vec<&str> = Vec::new();
        if has_area {
            stale.push(columns::AREA_KM2);
        }
        if has_centroid {
            stale.extend_from_slice(centroid_columns);
        }
        if !stale.iter().any(|name| self.has_column(name)) {
            return Cow::Borrowed(self);
        }

        let mut layer = self.clone();
        for name in stale {
            layer.remove_column(name);
        }
        Cow::Owned(layer)
    }

    pub fn region_code(&self, row: usize) -> Option<String> {
        self.text(row, columns::REGION_CODE)
    }

    pub fn region_name(&self, row: usize) -> Option<String> {
        self.text(row, columns::REGION_NAME)
    }

    pub fn state_name(&self, row: usize) -> Option<String> {
        self.text(row, columns::STATE_NAME)
    }
}
