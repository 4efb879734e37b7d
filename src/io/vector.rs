//! Format dispatch and reference-system handling for whole layers.

use std::path::Path;

use tracing::{debug, info};

use super::path::{require_exists, VectorFormat};
use super::text::TextReadOptions;
use super::{geojson, gpkg, parquet, shapefile, text};
use crate::crs::{Crs, Reprojector};
use crate::error::{GeoError, Result};
use crate::models::{columns, FeatureLayer};

/// How to load a vector file
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Reference system for delimited text, or an override of the GeoJSON
    /// EPSG:4326 default. Shapefiles and GeoPackages use what they declare.
    pub crs: Option<Crs>,
    /// WKT column for delimited text
    pub geometry_column: String,
    /// GeoPackage table; the first feature table when `None`
    pub layer: Option<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            crs: None,
            geometry_column: columns::GEOMETRY.to_string(),
            layer: None,
        }
    }
}

fn unsupported(path: &Path) -> GeoError {
    GeoError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string(),
    }
}

pub fn read_vector(path: &Path, options: &ReadOptions) -> Result<FeatureLayer> {
    let format = VectorFormat::from_path(path)?;
    if !format.is_readable() {
        return Err(unsupported(path));
    }
    if format != VectorFormat::Shapefile {
        require_exists(path)?;
    }
    debug!("Reading {} as {:?}", path.display(), format);

    match format {
        VectorFormat::Shapefile => shapefile::read_shapefile(path),
        VectorFormat::GeoJson => geojson::read_geojson(path, options.crs),
        VectorFormat::GeoPackage => gpkg::read_gpkg(path, options.layer.as_deref()),
        VectorFormat::Text(text_format) => text::read_text(
            path,
            text_format,
            &TextReadOptions {
                geometry_column: options.geometry_column.clone(),
                crs: options.crs,
            },
        ),
        VectorFormat::Parquet => Err(unsupported(path)),
    }
}

/// Serialize a layer, choosing the format from the extension.
///
/// The extension is checked before anything is created on disk.
pub fn write_vector(layer: &FeatureLayer, path: &Path) -> Result<()> {
    let format = VectorFormat::from_path(path)?;
    if !format.is_writable() {
        return Err(unsupported(path));
    }
    if layer.is_empty() {
        info!("Writing empty layer {} to {}", layer.name, path.display());
    }

    match format {
        VectorFormat::Shapefile => shapefile::write_shapefile(layer, path),
        VectorFormat::GeoJson => geojson::write_geojson(layer, path),
        VectorFormat::GeoPackage => gpkg::write_gpkg(layer, path),
        VectorFormat::Parquet => parquet::write_parquet(layer, path),
        VectorFormat::Text(text_format) => text::write_text(layer, path, text_format.delimiter),
    }
}

/// Declare `crs` on a layer that has none; returns true if it was assigned
pub fn assign_default_crs(layer: &mut FeatureLayer, crs: Crs) -> bool {
    if layer.crs().is_some() {
        return false;
    }
    info!("Assigning {} to {}", crs, layer.name);
    layer.set_crs(Some(crs));
    true
}

/// Reproject geometry and centroids in place
pub fn reproject(layer: &mut FeatureLayer, target: Crs) -> Result<()> {
    let source = layer
        .crs()
        .ok_or_else(|| GeoError::MissingReferenceSystem(layer.name.clone()))?;
    let projector = Reprojector::new(source, target)?;

    if !projector.is_identity() {
        info!("Reprojecting {} from {} to {}", layer.name, source, target);
        for feature in layer.features_mut() {
            if let Some(geometry) = &feature.geometry {
                feature.geometry = Some(projector.project(geometry)?);
            }
            if let Some(centroid) = feature.centroid {
                feature.centroid = Some(projector.project_coord(centroid.0)?.into());
            }
        }
    }
    layer.set_crs(Some(target));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feature;
    use geo::point;

    fn single_point(crs: Option<Crs>) -> FeatureLayer {
        let mut layer = FeatureLayer::new("pt", vec!["name".into()]).with_crs(crs);
        layer.push(Feature::new(
            Some(point!(x: 151.2093, y: -33.8688).into()),
            vec!["Sydney".into()],
        ));
        layer
    }

    #[test]
    fn test_unsupported_extension_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.kml");
        let err = write_vector(&single_point(Some(Crs::WGS84)), &path).unwrap_err();
        assert!(matches!(err, GeoError::UnsupportedFormat { .. }));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_compressed_text_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv.gz");
        assert!(write_vector(&single_point(None), &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_parquet_is_write_only() {
        assert!(matches!(
            read_vector(Path::new("x.parquet"), &ReadOptions::default()),
            Err(GeoError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_assign_default_never_overrides() {
        let mut layer = single_point(Some(Crs::GDA2020));
        assert!(!assign_default_crs(&mut layer, Crs::WGS84));
        assert_eq!(layer.crs(), Some(Crs::GDA2020));

        let mut layer = single_point(None);
        assert!(assign_default_crs(&mut layer, Crs::WGS84));
        assert_eq!(layer.crs(), Some(Crs::WGS84));
    }

    #[test]
    fn test_reproject_requires_crs() {
        let mut layer = single_point(None);
        assert!(matches!(
            reproject(&mut layer, Crs::WEB_MERCATOR),
            Err(GeoError::MissingReferenceSystem(_))
        ));
    }

    #[test]
    fn test_reproject_to_web_mercator() {
        let mut layer = single_point(Some(Crs::WGS84));
        reproject(&mut layer, Crs::WEB_MERCATOR).unwrap();
        assert_eq!(layer.crs(), Some(Crs::WEB_MERCATOR));
        match &layer.features()[0].geometry {
            Some(geo::Geometry::Point(p)) => {
                assert!((p.x() - 16_832_542.28).abs() < 0.1);
                assert!((p.y() + 4_011_198.65).abs() < 0.1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_csv_round_trip_through_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pt.csv");
        write_vector(&single_point(Some(Crs::WGS84)), &path).unwrap();
        let options = ReadOptions {
            crs: Some(Crs::WGS84),
            ..Default::default()
        };
        let back = read_vector(&path, &options).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.crs(), Some(Crs::WGS84));
    }
}
