//! R-tree over boundary envelopes.

use geo::{BoundingRect, Geometry};
use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;
use tracing::info;

use crate::crs::Crs;
use crate::error::Result;
use crate::models::{boundaries_from_layer, BoundaryRecord, FeatureLayer};

/// Wrapper for R-tree indexing of boundaries
#[derive(Clone)]
pub struct IndexedBoundary {
    pub boundary: Arc<BoundaryRecord>,
    /// Position in the input, so matches come back in load order
    pub order: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedBoundary {
    pub fn new(order: usize, boundary: BoundaryRecord) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = boundary.bbox()?;
        Some(Self {
            boundary: Arc::new(boundary),
            order,
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
        })
    }
}

/// Spatial index for join-target boundaries
pub struct BoundaryIndex {
    tree: RTree<IndexedBoundary>,
    crs: Option<Crs>,
}

impl BoundaryIndex {
    /// Build spatial index from boundaries
    pub fn build(boundaries: Vec<BoundaryRecord>) -> Self {
        info!("Building spatial index for {} boundaries...", boundaries.len());

        let indexed: Vec<IndexedBoundary> = boundaries
            .into_iter()
            .enumerate()
            .filter_map(|(order, b)| IndexedBoundary::new(order, b))
            .collect();
        let tree = RTree::bulk_load(indexed);

        info!("Spatial index built with {} entries", tree.size());
        Self { tree, crs: None }
    }

    /// Declare the reference system the boundary coordinates are in
    pub fn with_crs(mut self, crs: Option<Crs>) -> Self {
        self.crs = crs;
        self
    }

    /// Index the rows of `layer` whose code is in `codes` (all when empty)
    pub fn from_layer(
        layer: &FeatureLayer,
        code_column: &str,
        name_column: &str,
        codes: &[String],
    ) -> Result<Self> {
        let boundaries = boundaries_from_layer(layer, code_column, name_column, codes)?;
        Ok(Self::build(boundaries).with_crs(layer.crs()))
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    /// Boundaries whose envelope overlaps the geometry's, in load order
    pub fn candidates(&self, geometry: &Geometry<f64>) -> Vec<&IndexedBoundary> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let query_envelope =
            AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        let mut found: Vec<&IndexedBoundary> = self
            .tree
            .locate_in_envelope_intersecting(&query_envelope)
            .collect();
        found.sort_by_key(|ib| ib.order);
        found
    }

    /// Get total number of indexed boundaries
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Iterate over all indexed boundaries
    pub fn boundaries(&self) -> impl Iterator<Item = &Arc<BoundaryRecord>> {
        self.tree.iter().map(|ib| &ib.boundary)
    }
}
