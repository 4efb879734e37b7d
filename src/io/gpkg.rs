//! OGC GeoPackage (SQLite) feature tables.
//!
//! One feature table per file. Geometry is stored as standard GeoPackage
//! binary (`GP` header, little-endian, XY envelope, ISO WKB body). The
//! centroid, when present, is an unregistered second blob column.

use std::fs;
use std::path::Path;

use chrono::Utc;
use geo::{BoundingRect, Geometry, Point, Rect};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use super::path::require_exists;
use super::wkb::{read_wkb, write_wkb};
use crate::crs::{esri_wkt, Crs};
use crate::error::{GeoError, Result};
use crate::models::{columns, AttributeValue, Feature, FeatureLayer};

const APPLICATION_ID: i32 = 0x4750_4B47; // "GPKG"
const USER_VERSION: i32 = 10300;
const GEOMETRY_COLUMN: &str = "geom";
const FID_COLUMN: &str = "fid";

const CREATE_METADATA: &str = "
CREATE TABLE gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
);
CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL,
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
INSERT INTO gpkg_spatial_ref_sys VALUES
    ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', 'undefined cartesian coordinate reference system'),
    ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', 'undefined geographic coordinate reference system');
";

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Encode a geometry as a GeoPackage binary blob
pub fn encode_blob(geometry: &Geometry<f64>, srs_id: i32) -> Result<Vec<u8>> {
    let envelope = geometry.bounding_rect();
    let mut out = Vec::with_capacity(40);
    out.extend_from_slice(b"GP");
    out.push(0);
    // little-endian header, XY envelope when non-empty, empty flag otherwise
    out.push(if envelope.is_some() { 0b0000_0011 } else { 0b0001_0001 });
    out.extend_from_slice(&srs_id.to_le_bytes());
    if let Some(rect) = envelope {
        for v in [rect.min().x, rect.max().x, rect.min().y, rect.max().y] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out.extend_from_slice(&write_wkb(geometry)?);
    Ok(out)
}

/// Decode a GeoPackage binary blob; `None` for the empty-geometry flag
pub fn decode_blob(bytes: &[u8], source: &str) -> Result<Option<Geometry<f64>>> {
    let invalid = |reason: &str| GeoError::parse(source, "decode geometry blob", reason);
    if bytes.len() < 8 || &bytes[0..2] != b"GP" {
        return Err(invalid("missing GP header"));
    }
    let flags = bytes[3];
    if flags & 0b0001_0000 != 0 {
        return Ok(None);
    }
    let envelope = match (flags >> 1) & 0b111 {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        _ => return Err(invalid("invalid envelope code")),
    };
    let start = 8 + envelope;
    if bytes.len() <= start {
        return Err(invalid("truncated blob"));
    }
    read_wkb(&bytes[start..], source).map(Some)
}

fn geometry_type_name(layer: &FeatureLayer) -> &'static str {
    let mut names = layer.features().iter().filter_map(|f| {
        f.geometry.as_ref().map(|g| match g {
            Geometry::Point(_) => "POINT",
            Geometry::Line(_) | Geometry::LineString(_) => "LINESTRING",
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "POLYGON",
            Geometry::MultiPoint(_) => "MULTIPOINT",
            Geometry::MultiLineString(_) => "MULTILINESTRING",
            Geometry::MultiPolygon(_) => "MULTIPOLYGON",
            Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        })
    });
    let Some(first) = names.next() else {
        return "GEOMETRY";
    };
    let mut promoted = first;
    for name in names {
        promoted = match (promoted, name) {
            (a, b) if a == b => a,
            ("POLYGON" | "MULTIPOLYGON", "POLYGON" | "MULTIPOLYGON") => "MULTIPOLYGON",
            ("LINESTRING" | "MULTILINESTRING", "LINESTRING" | "MULTILINESTRING") => {
                "MULTILINESTRING"
            }
            ("POINT" | "MULTIPOINT", "POINT" | "MULTIPOINT") => "MULTIPOINT",
            _ => return "GEOMETRY",
        };
    }
    promoted
}

fn column_type(layer: &FeatureLayer, idx: usize) -> &'static str {
    let mut sql_type = None;
    for value in layer.features().iter().map(|f| &f.attributes[idx]) {
        sql_type = match (sql_type, value) {
            (_, AttributeValue::Null) => sql_type,
            (None | Some("INTEGER"), AttributeValue::Integer(_)) => Some("INTEGER"),
            (None | Some("INTEGER") | Some("REAL"), AttributeValue::Real(_))
            | (Some("REAL"), AttributeValue::Integer(_)) => Some("REAL"),
            (None | Some("BOOLEAN"), AttributeValue::Bool(_)) => Some("BOOLEAN"),
            _ => Some("TEXT"),
        };
    }
    sql_type.unwrap_or("TEXT")
}

fn sql_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Integer(i64::from(*b)),
        AttributeValue::Integer(i) => Value::Integer(*i),
        AttributeValue::Real(r) => Value::Real(*r),
        AttributeValue::Text(s) => Value::Text(s.clone()),
    }
}

fn layer_extent(layer: &FeatureLayer) -> Option<Rect<f64>> {
    layer
        .features()
        .iter()
        .filter_map(|f| f.geometry.as_ref()?.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            )
        })
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("features")
        .to_string()
}

/// Write a layer as a GeoPackage, replacing any existing file
pub fn write_gpkg(layer: &FeatureLayer, path: &Path) -> Result<()> {
    let fail = |e: rusqlite::Error| GeoError::write(path, e);
    let prepared = layer.replacing_derived(&[columns::CENTROID]);
    let layer: &FeatureLayer = &prepared;

    if path.exists() {
        fs::remove_file(path).map_err(|e| GeoError::write(path, e))?;
    }
    let mut conn = Connection::open(path).map_err(fail)?;
    conn.pragma_update(None, "application_id", APPLICATION_ID)
        .map_err(fail)?;
    conn.pragma_update(None, "user_version", USER_VERSION)
        .map_err(fail)?;

    let table = table_name(path);
    let srs_id = layer.crs().map(|c| c.epsg() as i32).unwrap_or(-1);
    let (has_area, has_centroid) = layer.has_derived();

    let tx = conn.transaction().map_err(fail)?;
    tx.execute_batch(CREATE_METADATA).map_err(fail)?;

    if let Some(crs) = layer.crs() {
        tx.execute(
            "INSERT INTO gpkg_spatial_ref_sys VALUES (?1, ?2, 'EPSG', ?2, ?3, NULL)",
            params![crs.name(), srs_id, esri_wkt(&crs)],
        )
        .map_err(fail)?;
    }

    let extent = layer_extent(layer);
    tx.execute(
        "INSERT INTO gpkg_contents VALUES (?1, 'features', ?1, '', ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            table,
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            extent.map(|r| r.min().x),
            extent.map(|r| r.min().y),
            extent.map(|r| r.max().x),
            extent.map(|r| r.max().y),
            srs_id,
        ],
    )
    .map_err(fail)?;
    tx.execute(
        "INSERT INTO gpkg_geometry_columns VALUES (?1, ?2, ?3, ?4, 0, 0)",
        params![table, GEOMETRY_COLUMN, geometry_type_name(layer), srs_id],
    )
    .map_err(fail)?;

    let mut definitions = vec![
        format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote(FID_COLUMN)),
        format!("{} {}", quote(GEOMETRY_COLUMN), geometry_type_name(layer)),
    ];
    let mut names = vec![quote(GEOMETRY_COLUMN)];
    for (idx, name) in layer.columns().iter().enumerate() {
        definitions.push(format!("{} {}", quote(name), column_type(layer, idx)));
        names.push(quote(name));
    }
    if has_area {
        definitions.push(format!("{} REAL", quote(columns::AREA_KM2)));
        names.push(quote(columns::AREA_KM2));
    }
    if has_centroid {
        definitions.push(format!("{} BLOB", quote(columns::CENTROID)));
        names.push(quote(columns::CENTROID));
    }

    tx.execute_batch(&format!(
        "CREATE TABLE {} ({});",
        quote(&table),
        definitions.join(", ")
    ))
    .map_err(fail)?;

    {
        let placeholders = vec!["?"; names.len()].join(", ");
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(&table),
                names.join(", "),
                placeholders
            ))
            .map_err(fail)?;

        for feature in layer.features() {
            let mut values = Vec::with_capacity(names.len());
            values.push(match &feature.geometry {
                Some(g) => Value::Blob(encode_blob(g, srs_id)?),
                None => Value::Null,
            });
            values.extend(feature.attributes.iter().map(sql_value));
            if has_area {
                values.push(feature.area_km2.map(Value::Real).unwrap_or(Value::Null));
            }
            if has_centroid {
                values.push(match feature.centroid {
                    Some(p) => Value::Blob(encode_blob(&p.into(), srs_id)?),
                    None => Value::Null,
                });
            }
            stmt.execute(params_from_iter(values.iter())).map_err(fail)?;
        }
    }
    tx.commit().map_err(fail)?;

    info!("Wrote {} features to {} (table {})", layer.len(), path.display(), table);
    Ok(())
}

fn resolve_srs(conn: &Connection, srs_id: i64, source: &str) -> Result<Option<Crs>> {
    if srs_id <= 0 {
        return Ok(None);
    }
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT organization, organization_coordsys_id FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
            params![srs_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| GeoError::parse(source, "read srs of", e))?;

    let epsg = match row {
        Some((org, code)) if org.eq_ignore_ascii_case("EPSG") => code,
        Some((org, _)) => {
            warn!("{}: non-EPSG organization '{}', using srs_id", source, org);
            srs_id
        }
        None => srs_id,
    };
    Crs::from_epsg(epsg as u32).map(Some)
}

/// Read the first feature table of a GeoPackage (or the named one)
pub fn read_gpkg(path: &Path, layer_name: Option<&str>) -> Result<FeatureLayer> {
    require_exists(path)?;
    info!("Reading GeoPackage {}", path.display());
    let source = path.display().to_string();
    let fail = |op: &'static str| move |e: rusqlite::Error| GeoError::parse(path, op, e);

    let conn = Connection::open(path).map_err(fail("open"))?;

    let (table, geometry_column, srs_id): (String, String, i64) = match layer_name {
        Some(name) => conn.query_row(
            "SELECT table_name, column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
            params![name],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        ),
        None => conn.query_row(
            "SELECT table_name, column_name, srs_id FROM gpkg_geometry_columns ORDER BY table_name LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        ),
    }
    .optional()
    .map_err(fail("read geometry columns of"))?
    .ok_or_else(|| GeoError::EmptyData(format!("{} has no feature tables", source)))?;

    let crs = resolve_srs(&conn, srs_id, &source)?;
    debug!("Table {} geometry {} srs {}", table, geometry_column, srs_id);

    let mut info = conn
        .prepare(&format!("PRAGMA table_info({})", quote(&table)))
        .map_err(fail("inspect"))?;
    let all_columns: Vec<(String, String, bool)> = info
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(5)? > 0,
            ))
        })
        .map_err(fail("inspect"))?
        .collect::<std::result::Result<_, _>>()
        .map_err(fail("inspect"))?;

    let mut geometry_idx = None;
    let mut centroid_idx = None;
    let mut attribute_idx = Vec::new();
    let mut names = Vec::new();
    for (idx, (name, declared, is_pk)) in all_columns.iter().enumerate() {
        if *is_pk {
            continue;
        }
        if name == &geometry_column {
            geometry_idx = Some(idx);
        } else if name == columns::CENTROID && declared.eq_ignore_ascii_case("BLOB") {
            centroid_idx = Some(idx);
        } else {
            attribute_idx.push(idx);
            names.push(name.clone());
        }
    }

    let mut layer = FeatureLayer::new(source.clone(), names).with_crs(crs);
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {}", quote(&table)))
        .map_err(fail("read"))?;
    let mut rows = stmt.query([]).map_err(fail("read"))?;

    while let Some(row) = rows.next().map_err(fail("read"))? {
        let blob_geometry = |idx: Option<usize>| -> Result<Option<Geometry<f64>>> {
            match idx.map(|i| row.get_ref(i)).transpose().map_err(fail("read"))? {
                Some(ValueRef::Blob(bytes)) => decode_blob(bytes, &source),
                _ => Ok(None),
            }
        };
        let geometry = blob_geometry(geometry_idx)?;
        let centroid = match blob_geometry(centroid_idx)? {
            Some(Geometry::Point(p)) => Some(p),
            _ => None::<Point<f64>>,
        };

        let mut attributes = Vec::with_capacity(attribute_idx.len());
        for &idx in &attribute_idx {
            let value = match row.get_ref(idx).map_err(fail("read"))? {
                ValueRef::Null => AttributeValue::Null,
                ValueRef::Integer(i) => AttributeValue::Integer(i),
                ValueRef::Real(r) => AttributeValue::Real(r),
                ValueRef::Text(t) => AttributeValue::Text(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Blob(b) => AttributeValue::Text(format!("<{} byte blob>", b.len())),
            };
            attributes.push(value);
        }

        let mut feature = Feature::new(geometry, attributes);
        feature.centroid = centroid;
        layer.push(feature);
    }

    info!("Loaded {} features from {}", layer.len(), source);
    Ok(layer)
}
