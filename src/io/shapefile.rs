//! ESRI Shapefile reading and writing (`.shp` + `.shx` + `.dbf`, optional `.prj`).

use std::fs;
use std::path::Path;

use geo::{Geometry, LineString, MultiLineString, MultiPolygon};
use shapefile::dbase::{self, FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::Shape;
use tracing::{debug, info, warn};

use super::path::{require_shapefile, shapefile_base, with_suffix};
use crate::crs::{detect_epsg, esri_wkt, Crs};
use crate::error::{GeoError, Result};
use crate::models::{columns, AttributeValue, Feature, FeatureLayer};

const DBF_NAME_LIMIT: usize = 10;
const CENTROID_X: &str = "centroid_x";
const CENTROID_Y: &str = "centroid_y";

fn field_value(value: &FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(s)) => {
            let trimmed = s.trim_end();
            if trimmed.is_empty() {
                AttributeValue::Null
            } else {
                AttributeValue::Text(trimmed.to_string())
            }
        }
        FieldValue::Numeric(Some(n)) if n.fract() == 0.0 && n.abs() < 1e15 => {
            AttributeValue::Integer(*n as i64)
        }
        FieldValue::Numeric(Some(n)) => AttributeValue::Real(*n),
        FieldValue::Float(Some(f)) => AttributeValue::Real(f64::from(*f)),
        FieldValue::Integer(i) => AttributeValue::Integer(i64::from(*i)),
        FieldValue::Double(d) | FieldValue::Currency(d) => AttributeValue::Real(*d),
        FieldValue::Logical(Some(b)) => AttributeValue::Bool(*b),
        FieldValue::Memo(s) => AttributeValue::Text(s.clone()),
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None)
        | FieldValue::Date(None) => AttributeValue::Null,
        other => AttributeValue::Text(format!("{:?}", other)),
    }
}

/// Reference system declared by the `.prj` sidecar, if any
pub fn read_prj(base: &Path) -> Option<Crs> {
    let prj = with_suffix(base, "prj");
    let text = fs::read_to_string(&prj).ok()?;
    match detect_epsg(&text).map(Crs::from_epsg) {
        Some(Ok(crs)) => {
            debug!("{} declares {}", prj.display(), crs);
            Some(crs)
        }
        Some(Err(e)) => {
            warn!("{}: {}", prj.display(), e);
            None
        }
        None => {
            warn!("Unrecognised reference system in {}", prj.display());
            None
        }
    }
}

pub fn read_shapefile(path: &Path) -> Result<FeatureLayer> {
    require_shapefile(path)?;
    let base = shapefile_base(path);
    let shp_path = if path.extension().is_some() {
        path.to_path_buf()
    } else {
        with_suffix(&base, "shp")
    };
    info!("Reading shapefile {}", shp_path.display());

    // Field order comes from the dbf header; records themselves are unordered
    let dbf_path = with_suffix(&base, "dbf");
    let dbf = dbase::Reader::from_path(&dbf_path)
        .map_err(|e| GeoError::parse(&dbf_path, "open", e))?;
    let names: Vec<String> = dbf.fields().iter().map(|f| f.name().to_string()).collect();
    drop(dbf);

    let mut reader = shapefile::Reader::from_path(&shp_path)
        .map_err(|e| GeoError::parse(&shp_path, "open", e))?;

    let mut layer = FeatureLayer::new(shp_path.display().to_string(), names.clone())
        .with_crs(read_prj(&base));

    for (row, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.map_err(|e| GeoError::parse(&shp_path, "read", e))?;

        let geometry = match shape {
            Shape::NullShape => None,
            shape => Some(Geometry::<f64>::try_from(shape).map_err(|e| {
                GeoError::parse(&shp_path, "convert", format!("record {}: {}", row, e))
            })?),
        };

        let attributes = names
            .iter()
            .map(|name| {
                record
                    .get(name)
                    .map(field_value)
                    .unwrap_or(AttributeValue::Null)
            })
            .collect();
        layer.push(Feature::new(geometry, attributes));
    }

    info!("Loaded {} features from {}", layer.len(), shp_path.display());
    Ok(layer)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ShapeFamily {
    Point,
    MultiPoint,
    Polyline,
    Polygon,
}

fn family_of(geometry: &Geometry<f64>) -> Option<ShapeFamily> {
    match geometry {
        Geometry::Point(_) => Some(ShapeFamily::Point),
        Geometry::MultiPoint(_) => Some(ShapeFamily::MultiPoint),
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
            Some(ShapeFamily::Polyline)
        }
        Geometry::Polygon(_)
        | Geometry::MultiPolygon(_)
        | Geometry::Rect(_)
        | Geometry::Triangle(_) => Some(ShapeFamily::Polygon),
        Geometry::GeometryCollection(_) => None,
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Character(u8),
    Integer,
    Real,
    Logical,
}

fn field_kind(layer: &FeatureLayer, idx: usize) -> FieldKind {
    let values = layer.features().iter().map(|f| &f.attributes[idx]);
    let mut kind: Option<FieldKind> = None;
    let mut width = 1usize;

    for value in values {
        width = width.max(value.to_string().len());
        kind = match (kind, value) {
            (_, AttributeValue::Null) => kind,
            (None | Some(FieldKind::Integer), AttributeValue::Integer(_)) => {
                Some(FieldKind::Integer)
            }
            (None | Some(FieldKind::Integer) | Some(FieldKind::Real), AttributeValue::Real(_))
            | (Some(FieldKind::Real), AttributeValue::Integer(_)) => Some(FieldKind::Real),
            (None | Some(FieldKind::Logical), AttributeValue::Bool(_)) => Some(FieldKind::Logical),
            _ => Some(FieldKind::Character(0)),
        };
    }

    match kind {
        Some(FieldKind::Character(_)) | None => FieldKind::Character(width.min(254) as u8),
        Some(other) => other,
    }
}

fn to_field_value(kind: FieldKind, value: &AttributeValue) -> FieldValue {
    match kind {
        FieldKind::Character(_) => FieldValue::Character(match value {
            AttributeValue::Null => None,
            other => Some(other.to_string()),
        }),
        FieldKind::Integer | FieldKind::Real => FieldValue::Numeric(value.as_f64()),
        FieldKind::Logical => FieldValue::Logical(match value {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }),
    }
}

fn dbf_name(name: &str) -> Result<FieldName, String> {
    let truncated: String = name.chars().take(DBF_NAME_LIMIT).collect();
    FieldName::try_from(truncated.as_str()).map_err(|e| format!("field '{}': {:?}", name, e))
}

/// Write a layer as a shapefile.
///
/// Attribute names are truncated to the 10-character DBF limit. Derived area is
/// written as `area_km2` and the centroid as `centroid_x`/`centroid_y`.
pub fn write_shapefile(layer: &FeatureLayer, path: &Path) -> Result<()> {
    let fail = |reason: String| GeoError::write(path, reason);
    let prepared = layer.replacing_derived(&[CENTROID_X, CENTROID_Y]);
    let layer: &FeatureLayer = &prepared;

    // Validate everything before touching the disk
    let mut family = None;
    for (row, feature) in layer.features().iter().enumerate() {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| fail(format!("row {} has no geometry", row)))?;
        let this = family_of(geometry)
            .ok_or_else(|| fail(format!("row {}: geometry collections are not supported", row)))?;
        match family {
            None => family = Some(this),
            Some(f) if f != this => {
                return Err(fail(format!(
                    "mixed geometry types ({:?} and {:?})",
                    f, this
                )))
            }
            _ => {}
        }
    }
    let family =
        family.ok_or_else(|| GeoError::EmptyData(format!("{} has no features", layer.name)))?;

    let kinds: Vec<FieldKind> = (0..layer.columns().len())
        .map(|idx| field_kind(layer, idx))
        .collect();

    let mut builder = TableWriterBuilder::new();
    let mut dbf_names: Vec<String> = Vec::new();
    let mut add_name = |name: &str| -> Result<FieldName> {
        let field = dbf_name(name).map_err(fail)?;
        let truncated: String = name.chars().take(DBF_NAME_LIMIT).collect();
        if dbf_names.iter().any(|n| n.eq_ignore_ascii_case(&truncated)) {
            return Err(fail(format!(
                "column '{}' collides with another after truncation to '{}'",
                name, truncated
            )));
        }
        if truncated != name {
            warn!("Truncating column '{}' to '{}'", name, truncated);
        }
        dbf_names.push(truncated);
        Ok(field)
    };

    for (name, kind) in layer.columns().iter().zip(&kinds) {
        let field = add_name(name)?;
        builder = match kind {
            FieldKind::Character(width) => builder.add_character_field(field, *width),
            FieldKind::Integer => builder.add_numeric_field(field, 18, 0),
            FieldKind::Real => builder.add_numeric_field(field, 24, 10),
            FieldKind::Logical => builder.add_logical_field(field),
        };
    }

    let (has_area, has_centroid) = layer.has_derived();
    if has_area {
        builder = builder.add_numeric_field(add_name(columns::AREA_KM2)?, 24, 10);
    }
    if has_centroid {
        builder = builder.add_numeric_field(add_name(CENTROID_X)?, 24, 10);
        builder = builder.add_numeric_field(add_name(CENTROID_Y)?, 24, 10);
    }
    let dbf_names = dbf_names;

    let records: Vec<Record> = layer
        .features()
        .iter()
        .map(|feature| {
            let mut record = Record::default();
            let mut names = dbf_names.iter();
            for (value, kind) in feature.attributes.iter().zip(&kinds) {
                if let Some(name) = names.next() {
                    record.insert(name.clone(), to_field_value(*kind, value));
                }
            }
            if has_area {
                if let Some(name) = names.next() {
                    record.insert(name.clone(), FieldValue::Numeric(feature.area_km2));
                }
            }
            if has_centroid {
                let centroid = feature.centroid;
                if let Some(name) = names.next() {
                    record.insert(name.clone(), FieldValue::Numeric(centroid.map(|p| p.x())));
                }
                if let Some(name) = names.next() {
                    record.insert(name.clone(), FieldValue::Numeric(centroid.map(|p| p.y())));
                }
            }
            record
        })
        .collect();

    let mut writer =
        shapefile::Writer::from_path(path, builder).map_err(|e| fail(e.to_string()))?;

    let geometries = layer.features().iter().filter_map(|f| f.geometry.as_ref());

    macro_rules! write_all {
        ($shapes:expr) => {
            for (shape, record) in $shapes.zip(&records) {
                writer
                    .write_shape_and_record(&shape, record)
                    .map_err(|e| fail(e.to_string()))?;
            }
        };
    }

    match family {
        ShapeFamily::Point => write_all!(geometries.filter_map(|g| match g {
            Geometry::Point(p) => Some(shapefile::Point::from(*p)),
            _ => None,
        })),
        ShapeFamily::MultiPoint => write_all!(geometries.filter_map(|g| match g {
            Geometry::MultiPoint(mp) => Some(shapefile::Multipoint::from(mp.clone())),
            _ => None,
        })),
        ShapeFamily::Polyline => write_all!(geometries.filter_map(|g| {
            let lines = match g {
                Geometry::Line(l) => {
                    MultiLineString::new(vec![LineString::new(vec![l.start, l.end])])
                }
                Geometry::LineString(ls) => MultiLineString::new(vec![ls.clone()]),
                Geometry::MultiLineString(mls) => mls.clone(),
                _ => return None,
            };
            Some(shapefile::Polyline::from(lines))
        })),
        ShapeFamily::Polygon => write_all!(geometries.filter_map(|g| {
            let polygons = match g {
                Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
                Geometry::MultiPolygon(mp) => mp.clone(),
                Geometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]),
                Geometry::Triangle(t) => MultiPolygon::new(vec![t.to_polygon()]),
                _ => return None,
            };
            Some(shapefile::Polygon::from(polygons))
        })),
    }
    drop(writer);

    if let Some(crs) = layer.crs() {
        let prj = with_suffix(&shapefile_base(path), "prj");
        fs::write(&prj, esri_wkt(&crs)).map_err(|e| GeoError::write(&prj, e))?;
    }

    info!("Wrote {} features to {}", layer.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{add_calculation, CalcOptions};
    use geo::{point, MultiPoint, Rect};

    fn multipoint(points: &[(f64, f64)]) -> Geometry<f64> {
        Geometry::MultiPoint(MultiPoint::from(points.to_vec()))
    }

    fn suburbs() -> FeatureLayer {
        let mut layer = FeatureLayer::new(
            "suburbs",
            vec!["SAL_CODE21".into(), "SAL_NAME21".into(), "AREASQKM21".into()],
        )
        .with_crs(Some(Crs::GDA2020));
        for (i, name) in ["Abbotsford", "Annandale"].iter().enumerate() {
            let x = i as f64;
            let square = Rect::new((x, 0.0), (x + 1.0, 1.0)).to_polygon();
            let mut feature = Feature::new(
                Some(square.into()),
                vec![format!("1000{}", i).into(), (*name).into(), 1.25f64.into()],
            );
            feature.area_km2 = Some(12.0);
            layer.push(feature);
        }
        layer
    }

    #[test]
    fn test_write_and_read_polygons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suburbs.shp");
        write_shapefile(&suburbs(), &path).unwrap();

        assert!(dir.path().join("suburbs.shx").exists());
        assert!(dir.path().join("suburbs.prj").exists());

        let back = read_shapefile(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.crs(), Some(Crs::GDA2020));
        assert_eq!(
            back.columns(),
            &["SAL_CODE21", "SAL_NAME21", "AREASQKM21", "area_km2"]
        );
        assert_eq!(back.text(1, "SAL_NAME21").as_deref(), Some("Annandale"));
        assert!(matches!(
            back.features()[0].geometry,
            Some(Geometry::MultiPolygon(_))
        ));
    }

    #[test]
    fn test_recalculated_layer_writes_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suburbs.shp");
        let mut layer = suburbs();
        layer.features_mut()[0].centroid = Some(point!(x: 0.5, y: 0.5));
        write_shapefile(&layer, &path).unwrap();

        let mut back = read_shapefile(&path).unwrap();
        assert!(back.has_column(CENTROID_X));
        let options = CalcOptions {
            output_crs: Crs::GDA2020,
            ..Default::default()
        };
        add_calculation(&mut back, &options).unwrap();
        let area = back.features()[1].area_km2.unwrap();
        write_shapefile(&back, &path).unwrap();

        let again = read_shapefile(&path).unwrap();
        assert_eq!(
            again.columns(),
            &["SAL_CODE21", "SAL_NAME21", "AREASQKM21", "area_km2", "centroid_x", "centroid_y"]
        );
        let stored = again.get(1, "area_km2").and_then(AttributeValue::as_f64).unwrap();
        assert!((stored - area).abs() < 1e-6 * area);
        assert!(stored > 12.0);
    }

    #[test]
    fn test_long_names_truncated_and_collisions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut layer = FeatureLayer::new("t", vec!["region_name".into(), "region_nam".into()]);
        layer.push(Feature::new(
            Some(point!(x: 0.0, y: 0.0).into()),
            vec!["a".into(), "b".into()],
        ));
        let err = write_shapefile(&layer, &dir.path().join("t.shp")).unwrap_err();
        assert!(matches!(err, GeoError::Write { .. }));
        assert!(!dir.path().join("t.shp").exists());
    }

    #[test]
    fn test_mixed_geometry_rejected_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut layer = FeatureLayer::new("t", vec![]);
        layer.push(Feature::new(Some(point!(x: 0.0, y: 0.0).into()), vec![]));
        layer.push(Feature::new(Some(multipoint(&[(1.0, 1.0)])), vec![]));
        assert!(write_shapefile(&layer, &dir.path().join("t.shp")).is_err());
        assert!(!dir.path().join("t.shp").exists());
    }

    #[test]
    fn test_missing_sibling_on_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.shp"), b"").unwrap();
        assert!(matches!(
            read_shapefile(&dir.path().join("x.shp")),
            Err(GeoError::MissingSibling { .. })
        ));
    }
}
