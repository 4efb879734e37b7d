//! GeoParquet output: WKB geometry columns plus `geo` file metadata.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use geo::{BoundingRect, Geometry, Rect};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::json;
use tracing::info;

use super::wkb::write_wkb;
use crate::crs::{projjson, Crs};
use crate::error::{GeoError, Result};
use crate::models::{columns, AttributeValue, FeatureLayer};

const GEOPARQUET_VERSION: &str = "1.0.0";

fn arrow_type(layer: &FeatureLayer, idx: usize) -> DataType {
    let mut kind = None;
    for value in layer.features().iter().map(|f| &f.attributes[idx]) {
        kind = match (&kind, value) {
            (_, AttributeValue::Null) => continue,
            (None | Some(DataType::Int64), AttributeValue::Integer(_)) => Some(DataType::Int64),
            (None | Some(DataType::Int64) | Some(DataType::Float64), AttributeValue::Real(_))
            | (Some(DataType::Float64), AttributeValue::Integer(_)) => Some(DataType::Float64),
            (None | Some(DataType::Boolean), AttributeValue::Bool(_)) => Some(DataType::Boolean),
            _ => Some(DataType::Utf8),
        };
    }
    kind.unwrap_or(DataType::Utf8)
}

fn attribute_array(layer: &FeatureLayer, idx: usize, kind: &DataType) -> ArrayRef {
    let values = layer.features().iter().map(|f| &f.attributes[idx]);
    match kind {
        DataType::Int64 => Arc::new(
            values
                .map(|v| match v {
                    AttributeValue::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(values.map(AttributeValue::as_f64).collect::<Float64Array>()),
        DataType::Boolean => Arc::new(
            values
                .map(|v| match v {
                    AttributeValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        _ => Arc::new(
            values
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect::<StringArray>(),
        ),
    }
}

fn geometry_type(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) | Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}

fn column_metadata<'a>(
    geometries: impl Iterator<Item = &'a Geometry<f64>>,
    crs: Option<Crs>,
) -> serde_json::Value {
    let mut types: Vec<&str> = Vec::new();
    let mut extent: Option<Rect<f64>> = None;
    for geometry in geometries {
        let name = geometry_type(geometry);
        if !types.contains(&name) {
            types.push(name);
        }
        if let Some(rect) = geometry.bounding_rect() {
            extent = Some(match extent {
                None => rect,
                Some(e) => Rect::new(
                    (e.min().x.min(rect.min().x), e.min().y.min(rect.min().y)),
                    (e.max().x.max(rect.max().x), e.max().y.max(rect.max().y)),
                ),
            });
        }
    }
    types.sort_unstable();

    let mut meta = json!({
        "encoding": "WKB",
        "geometry_types": types,
    });
    if let Some(rect) = extent {
        meta["bbox"] = json!([rect.min().x, rect.min().y, rect.max().x, rect.max().y]);
    }
    // Omitted crs means OGC:CRS84
    if let Some(crs) = crs.filter(|c| c.epsg() != 4326) {
        meta["crs"] = projjson(&crs);
    }
    meta
}

/// Write a layer as GeoParquet
pub fn write_parquet(layer: &FeatureLayer, path: &Path) -> Result<()> {
    let fail = |e: &dyn std::fmt::Display| GeoError::write(path, e);
    let prepared = layer.replacing_derived(&[columns::CENTROID]);
    let layer: &FeatureLayer = &prepared;
    let (has_area, has_centroid) = layer.has_derived();
    let crs = layer.crs();

    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();
    for (idx, name) in layer.columns().iter().enumerate() {
        let kind = arrow_type(layer, idx);
        arrays.push(attribute_array(layer, idx, &kind));
        fields.push(Field::new(name, kind, true));
    }

    if has_area {
        fields.push(Field::new(columns::AREA_KM2, DataType::Float64, true));
        arrays.push(Arc::new(
            layer
                .features()
                .iter()
                .map(|f| f.area_km2)
                .collect::<Float64Array>(),
        ));
    }

    let mut geo_columns = serde_json::Map::new();
    if has_centroid {
        let centroids: Vec<Option<Geometry<f64>>> = layer
            .features()
            .iter()
            .map(|f| f.centroid.map(Geometry::Point))
            .collect();
        fields.push(Field::new(columns::CENTROID, DataType::Binary, true));
        let encoded = centroids
            .iter()
            .map(|g| g.as_ref().map(write_wkb).transpose())
            .collect::<Result<Vec<_>>>()?;
        arrays.push(Arc::new(BinaryArray::from_iter(encoded)));
        geo_columns.insert(
            columns::CENTROID.to_string(),
            column_metadata(centroids.iter().flatten(), crs),
        );
    }

    fields.push(Field::new(columns::GEOMETRY, DataType::Binary, true));
    let encoded = layer
        .features()
        .iter()
        .map(|f| f.geometry.as_ref().map(write_wkb).transpose())
        .collect::<Result<Vec<_>>>()?;
    arrays.push(Arc::new(BinaryArray::from_iter(encoded)));
    geo_columns.insert(
        columns::GEOMETRY.to_string(),
        column_metadata(layer.features().iter().filter_map(|f| f.geometry.as_ref()), crs),
    );

    let geo = json!({
        "version": GEOPARQUET_VERSION,
        "primary_column": columns::GEOMETRY,
        "columns": geo_columns,
    });

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).map_err(|e| fail(&e))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![KeyValue::new("geo".to_string(), geo.to_string())]))
        .build();

    let file = File::create(path).map_err(|e| fail(&e))?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props)).map_err(|e| fail(&e))?;
    writer.write(&batch).map_err(|e| fail(&e))?;
    writer.close().map_err(|e| fail(&e))?;

    info!("Wrote {} rows to {}", layer.len(), path.display());
    Ok(())
}
