//! File name, extension and shapefile sibling validation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{GeoError, Result};

/// Files a shapefile cannot function without
pub const SHAPEFILE_SIBLINGS: [&str; 3] = ["shp", "shx", "dbf"];

/// Delimited text flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextFormat {
    pub delimiter: u8,
    pub compressed: bool,
}

impl TextFormat {
    /// Text flavour for a path; any non-text extension is `UnsupportedFormat`
    pub fn from_path(path: &Path) -> Result<Self> {
        match VectorFormat::from_path(path)? {
            VectorFormat::Text(format) => Ok(format),
            _ => Err(GeoError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_string(),
            }),
        }
    }
}

/// Vector formats known to the reader/writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    Shapefile,
    GeoJson,
    GeoPackage,
    Parquet,
    Text(TextFormat),
}

impl VectorFormat {
    /// Pick a format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let (stem, compressed) = match file_name.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (file_name.as_str(), false),
        };
        let extension = stem.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

        let text = |delimiter| VectorFormat::Text(TextFormat {
            delimiter,
            compressed,
        });

        let format = match (extension, compressed) {
            ("csv", _) => text(b','),
            ("tsv", _) | ("txt", _) => text(b'\t'),
            ("shp", false) => VectorFormat::Shapefile,
            ("geojson", false) | ("json", false) => VectorFormat::GeoJson,
            ("gpkg", false) => VectorFormat::GeoPackage,
            ("parquet", false) | ("geoparquet", false) => VectorFormat::Parquet,
            _ => {
                return Err(GeoError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    extension: if compressed {
                        format!("{}.gz", extension)
                    } else {
                        extension.to_string()
                    },
                })
            }
        };
        Ok(format)
    }

    /// Formats the reader understands (Parquet is output only)
    pub fn is_readable(&self) -> bool {
        !matches!(self, VectorFormat::Parquet)
    }

    /// Compressed text is read only
    pub fn is_writable(&self) -> bool {
        !matches!(
            self,
            VectorFormat::Text(TextFormat {
                compressed: true,
                ..
            })
        )
    }
}

/// Reject base names that carry their own extension separator
pub fn validate_base_name(name: &str) -> Result<()> {
    if name.contains('.') {
        return Err(GeoError::InvalidName {
            name: name.to_string(),
            reason: "file name cannot contain a period (.)".to_string(),
        });
    }
    if name.trim().is_empty() {
        return Err(GeoError::InvalidName {
            name: name.to_string(),
            reason: "file name is empty".to_string(),
        });
    }
    Ok(())
}

pub fn require_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(GeoError::NotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Strip a trailing `.shp` so siblings can be derived from the base
pub fn shapefile_base(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("shp") => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

/// `base` + `.ext`, without treating dots in `base` as an extension
pub fn with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn sibling_exists(base: &Path, ext: &str) -> bool {
    with_suffix(base, ext).exists() || with_suffix(base, &ext.to_ascii_uppercase()).exists()
}

/// Siblings missing for a shapefile, as `.ext` strings; empty when complete
pub fn validate_shapefile(path: &Path) -> Vec<String> {
    let base = shapefile_base(path);
    SHAPEFILE_SIBLINGS
        .iter()
        .filter(|ext| !sibling_exists(&base, ext))
        .map(|ext| format!(".{}", ext))
        .collect()
}

/// Fail with `MissingSibling` unless `.shp`, `.shx` and `.dbf` all exist
pub fn require_shapefile(path: &Path) -> Result<()> {
    let missing = validate_shapefile(path);
    if !missing.is_empty() {
        return Err(GeoError::MissingSibling {
            base: shapefile_base(path),
            missing,
        });
    }
    Ok(())
}

/// Sibling check result for one shapefile found on disk
#[derive(Debug, Clone)]
pub struct ShapefileReport {
    pub path: PathBuf,
    pub missing: Vec<String>,
}

impl ShapefileReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Walk a directory and check every `.shp` found
pub fn scan_directory(dir: &Path) -> Result<Vec<ShapefileReport>> {
    require_exists(dir)?;

    let mut reports = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| GeoError::parse(dir, "scan directory", e))?;
        let path = entry.path();

        let is_shp = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("shp"))
            .unwrap_or(false);
        if !path.is_file() || !is_shp {
            continue;
        }

        let missing = validate_shapefile(path);
        if missing.is_empty() {
            debug!("{} is complete", path.display());
        } else {
            warn!("{} is missing {}", path.display(), missing.join(", "));
        }
        reports.push(ShapefileReport {
            path: path.to_path_buf(),
            missing,
        });
    }

    Ok(reports)
}
