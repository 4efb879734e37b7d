//! Error kinds surfaced by the library.

use std::path::PathBuf;
use thiserror::Error;

/// Every failure the pipeline can report.
///
/// Library failures (shapefile, sqlite, parquet, csv) are folded into
/// `ParseFailure` or `Write` with the file and operation that triggered them.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid file name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("shapefile {} is missing {}", .base.display(), .missing.join(", "))]
    MissingSibling {
        base: PathBuf,
        missing: Vec<String>,
    },

    #[error("unsupported format '{extension}' for {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("no data: {0}")]
    EmptyData(String),

    #[error("{0} has no coordinate reference system")]
    MissingReferenceSystem(String),

    #[error("unknown coordinate reference system EPSG:{0}")]
    UnknownReferenceSystem(u32),

    #[error("failed to {operation} {}: {reason}", .path.display())]
    ParseFailure {
        path: PathBuf,
        operation: &'static str,
        reason: String,
    },

    #[error("'{0}' is outside the research scope")]
    OutOfScope(String),

    #[error("failed to write {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },
}

impl GeoError {
    pub fn parse(
        path: impl Into<PathBuf>,
        operation: &'static str,
        reason: impl std::fmt::Display,
    ) -> Self {
        GeoError::ParseFailure {
            path: path.into(),
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        GeoError::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = GeoError> = std::result::Result<T, E>;
