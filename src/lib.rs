//! Oceania Geo - boundary ingest for Australian, New Zealand and Papua New
//! Guinea government datasets
//!
//! This library reads boundary files, normalizes their reference systems and
//! column names, computes area and centroid, restricts fine layers to
//! capital-city boundaries and writes the result back out. The `ingest`
//! binary drives it from the command line.

pub mod calc;
pub mod crs;
pub mod error;
pub mod io;
pub mod models;
pub mod reader;
pub mod spatial;
pub mod standardize;

pub use crs::{Crs, Jurisdiction};
pub use error::{GeoError, Result};
pub use models::{AttributeValue, BoundaryRecord, Feature, FeatureLayer};
pub use reader::RegionalReader;
