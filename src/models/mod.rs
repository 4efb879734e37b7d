//! Core data models for the boundary pipeline.

pub mod boundary;
pub mod feature;

pub use boundary::{as_multipolygon, boundaries_from_layer, BoundaryRecord};
pub use feature::{columns, AttributeValue, Feature, FeatureLayer};
