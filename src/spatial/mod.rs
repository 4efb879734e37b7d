//! Boundary indexing and spatial joins.

pub mod filter;
pub mod index;

pub use filter::{
    partition_by_boundary, select_columns, spatial_filter, FilterOptions, JoinMode, Predicate,
};
pub use index::{BoundaryIndex, IndexedBoundary};
