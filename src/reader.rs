//! End-to-end "read and standardize" for a named regional dataset.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::crs::{regional_crs, Crs};
use crate::error::Result;
use crate::io::{
    assign_default_crs, read_vector, reproject, require_shapefile, validate_base_name, ReadOptions,
};
use crate::models::FeatureLayer;
use crate::standardize::standardize_columns;

/// Loads shapefiles from one data folder into the common schema
#[derive(Debug, Clone)]
pub struct RegionalReader {
    data_dir: PathBuf,
    target: Crs,
}

impl RegionalReader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            target: Crs::WGS84,
        }
    }

    /// Reference system every layer is unified to (EPSG:4326 by default)
    pub fn with_target(mut self, target: Crs) -> Self {
        self.target = target;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Read `<data_dir>/<file_name>.shp`, declare the country's reference
    /// system if the file has none, unify to the target system and rename
    /// columns to the canonical schema.
    ///
    /// `file_name` is a base name without extension.
    pub fn read_and_standardize(&self, file_name: &str, country: &str) -> Result<FeatureLayer> {
        self.load(file_name, country).map_err(|e| {
            error!("{}: failed to process {}", e, file_name);
            e
        })
    }

    fn load(&self, file_name: &str, country: &str) -> Result<FeatureLayer> {
        validate_base_name(file_name)?;
        let path = self.data_dir.join(format!("{}.shp", file_name));
        require_shapefile(&path)?;

        let mut layer = read_vector(&path, &ReadOptions::default())?;
        layer.name = file_name.to_string();

        let declared = regional_crs(country);
        if assign_default_crs(&mut layer, declared) {
            info!("{} had no reference system, assumed {}", file_name, declared);
        }
        reproject(&mut layer, self.target)?;
        standardize_columns(&mut layer, country);

        info!("Read and standardized {} ({} features)", file_name, layer.len());
        Ok(layer)
    }
}
