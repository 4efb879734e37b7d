//! Delimited text (CSV/TSV/TXT) reading and writing.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use flate2::read::GzDecoder;
use tracing::{debug, info};

use super::path::{require_exists, TextFormat};
use super::wkt::{to_wkt, wkt_column_to_geometry};
use crate::crs::Crs;
use crate::error::{GeoError, Result};
use crate::models::{columns, AttributeValue, Feature, FeatureLayer};

/// Options for loading a delimited file
#[derive(Debug, Clone)]
pub struct TextReadOptions {
    /// Column holding WKT geometry; parsed and removed when present
    pub geometry_column: String,
    /// CRS to declare for the geometry column
    pub crs: Option<Crs>,
}

impl Default for TextReadOptions {
    fn default() -> Self {
        Self {
            geometry_column: columns::GEOMETRY.to_string(),
            crs: None,
        }
    }
}

/// Read a delimited file into a layer.
///
/// Fails with `EmptyData` when the file has no header or no rows and with
/// `ParseFailure` (carrying the csv position) on malformed records.
pub fn read_text(
    path: &Path,
    format: TextFormat,
    options: &TextReadOptions,
) -> Result<FeatureLayer> {
    require_exists(path)?;
    info!("Reading delimited text from {}", path.display());

    let file = File::open(path).map_err(|e| GeoError::parse(path, "open", e))?;
    let reader: Box<dyn Read> = if format.compressed {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(format.delimiter)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| GeoError::parse(path, "read header of", e))?
        .clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(GeoError::EmptyData(format!("{} has no header", path.display())));
    }

    let name = path.display().to_string();
    let mut layer = FeatureLayer::new(
        name,
        headers.iter().map(|h| h.trim().to_string()).collect(),
    );

    for result in csv_reader.records() {
        let record = result.map_err(|e| GeoError::parse(path, "parse", e))?;
        let attributes = record.iter().map(AttributeValue::infer).collect();
        layer.push(Feature::new(None, attributes));
    }

    if layer.is_empty() {
        return Err(GeoError::EmptyData(format!("{} has no rows", path.display())));
    }

    if layer.has_column(&options.geometry_column) {
        debug!("Parsing WKT column '{}'", options.geometry_column);
        wkt_column_to_geometry(&mut layer, &options.geometry_column)?;
        layer.remove_column(&options.geometry_column);
        layer.set_crs(options.crs);
    }

    info!("Loaded {} rows from {}", layer.len(), path.display());
    Ok(layer)
}

/// Write a layer as delimited text.
///
/// Geometry and centroid are serialized as WKT; derived area is written as
/// `area_km2`. Output columns keep the layer order.
pub fn write_text(layer: &FeatureLayer, path: &Path, delimiter: u8) -> Result<()> {
    let prepared = layer.replacing_derived(&[columns::CENTROID]);
    let layer: &FeatureLayer = &prepared;
    let has_geometry = layer.features().iter().any(|f| f.geometry.is_some());
    let (has_area, has_centroid) = layer.has_derived();

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| GeoError::write(path, e))?;

    let mut header: Vec<&str> = layer.columns().iter().map(String::as_str).collect();
    if has_area {
        header.push(columns::AREA_KM2);
    }
    if has_centroid {
        header.push(columns::CENTROID);
    }
    if has_geometry && !layer.has_column(columns::GEOMETRY) {
        header.push(columns::GEOMETRY);
    }
    writer
        .write_record(&header)
        .map_err(|e| GeoError::write(path, e))?;

    for feature in layer.features() {
        let mut row: Vec<String> = feature.attributes.iter().map(|v| v.to_string()).collect();
        if has_area {
            row.push(feature.area_km2.map(|a| a.to_string()).unwrap_or_default());
        }
        if has_centroid {
            row.push(
                feature
                    .centroid
                    .map(|p| to_wkt(&p.into()))
                    .unwrap_or_default(),
            );
        }
        if has_geometry && !layer.has_column(columns::GEOMETRY) {
            row.push(feature.geometry.as_ref().map(to_wkt).unwrap_or_default());
        }
        writer
            .write_record(&row)
            .map_err(|e| GeoError::write(path, e))?;
    }

    writer.flush().map_err(|e| GeoError::write(path, e))?;
    info!("Wrote {} rows to {}", layer.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const CSV: TextFormat = TextFormat {
        delimiter: b',',
        compressed: false,
    };

    #[test]
    fn test_read_with_wkt_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sal.csv");
        std::fs::write(
            &path,
            "SAL_CODE21,SAL_NAME21,geometry\n10001,Aarons Pass,POINT(149.8 -32.9)\n10002,Abbotsbury,\n",
        )
        .unwrap();

        let options = TextReadOptions {
            crs: Some(Crs::GDA2020),
            ..Default::default()
        };
        let layer = read_text(&path, CSV, &options).unwrap();
        assert_eq!(layer.columns(), &["SAL_CODE21", "SAL_NAME21"]);
        assert_eq!(layer.len(), 2);
        assert!(layer.features()[0].geometry.is_some());
        assert!(layer.features()[1].geometry.is_none());
        assert_eq!(layer.crs(), Some(Crs::GDA2020));
        assert_eq!(layer.get(0, "SAL_CODE21"), Some(&AttributeValue::Integer(10001)));
    }

    #[test]
    fn test_header_only_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "a,b\n").unwrap();
        assert!(matches!(
            read_text(&path, CSV, &TextReadOptions::default()),
            Err(GeoError::EmptyData(_))
        ));
    }

    #[test]
    fn test_ragged_rows_fail_to_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a,b\n1,2\n3\n").unwrap();
        assert!(matches!(
            read_text(&path, CSV, &TextReadOptions::default()),
            Err(GeoError::ParseFailure { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_text(Path::new("/nonexistent/x.csv"), CSV, &TextReadOptions::default()),
            Err(GeoError::NotFound(_))
        ));
    }

    #[test]
    fn test_gzip_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sal.tsv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"sal_name\tpop\nNorth Sydney\t100\n").unwrap();
        encoder.finish().unwrap();

        let format = TextFormat {
            delimiter: b'\t',
            compressed: true,
        };
        let layer = read_text(&path, format, &TextReadOptions::default()).unwrap();
        assert_eq!(layer.text(0, "sal_name").as_deref(), Some("North Sydney"));
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut layer = FeatureLayer::new("t", vec!["region_name".into()]);
        let mut feature = Feature::new(
            Some(geo::point!(x: 1.0, y: 2.0).into()),
            vec!["Sydney".into()],
        );
        feature.area_km2 = Some(12.5);
        feature.centroid = Some(geo::point!(x: 1.0, y: 2.0));
        layer.push(feature);

        write_text(&layer, &path, b',').unwrap();
        let back = read_text(&path, CSV, &TextReadOptions::default()).unwrap();
        assert_eq!(back.columns(), &["region_name", "area_km2", "centroid"]);
        assert_eq!(back.get(0, "area_km2"), Some(&AttributeValue::Real(12.5)));
        assert!(back.features()[0].geometry.is_some());
    }

    #[test]
    fn test_derived_values_replace_stored_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "region_name,area_km2,centroid\nSydney,1.5,POINT(0 0)\n").unwrap();

        let mut layer = read_text(&path, CSV, &TextReadOptions::default()).unwrap();
        layer.features_mut()[0].area_km2 = Some(12.5);
        layer.features_mut()[0].centroid = Some(geo::point!(x: 1.0, y: 2.0));
        write_text(&layer, &path, b',').unwrap();

        let back = read_text(&path, CSV, &TextReadOptions::default()).unwrap();
        assert_eq!(back.columns(), &["region_name", "area_km2", "centroid"]);
        assert_eq!(back.get(0, "area_km2"), Some(&AttributeValue::Real(12.5)));
        let centroid = back.text(0, "centroid").unwrap();
        assert_eq!(
            crate::io::wkt::from_wkt(&centroid).unwrap(),
            geo::Geometry::Point(geo::point!(x: 1.0, y: 2.0))
        );
    }
}
