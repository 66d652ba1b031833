use ahash::AHashSet;
use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rstar::RTree;

use crate::{
    geom::{IndexedBounds, envelope},
    types::PopulationCell,
};

/// Population allocated to one exclusive-coverage area.
///
/// `weighted` sums area-ratio-scaled estimates; `unweighted` sums the full
/// estimate of every surviving cell. Both stay real-valued during
/// accumulation; rounding happens only when a ranking record is built.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PopulationShare {
    pub weighted: f64,
    pub unweighted: f64,
}

/// R-tree-indexed population grid supporting proportional-area allocation
/// into arbitrary polygons.
#[derive(Debug)]
pub struct PopulationGrid {
    cells: Vec<PopulationCell>,
    rtree: RTree<IndexedBounds>,
}

impl PopulationGrid {
    pub fn new(cells: Vec<PopulationCell>) -> Self {
        let rtree = RTree::bulk_load(
            cells
                .iter()
                .enumerate()
                .filter_map(|(i, cell)| {
                    cell.boundary.bounding_rect().map(|rect| IndexedBounds::new(i, rect))
                })
                .collect(),
        );
        Self { cells, rtree }
    }

    #[inline]
    pub fn len(&self) -> usize { self.cells.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.cells.is_empty() }

    /// Allocate grid population into `area` by overlap proportion.
    ///
    /// For each candidate cell the exact intersection is computed and
    /// `area_ratio = intersection_area / original_cell_area`. Ratios at or
    /// below `min_overlap_ratio` are slivers from adjacent-cell boundary
    /// noise and contribute nothing. Each surviving cell is counted once in
    /// the unweighted total, keyed by cell id.
    pub fn allocate(&self, area: &MultiPolygon<f64>, min_overlap_ratio: f64) -> PopulationShare {
        let mut share = PopulationShare::default();
        let Some(rect) = area.bounding_rect() else { return share };

        let mut counted: AHashSet<&str> = AHashSet::new();
        for candidate in self.rtree.locate_in_envelope_intersecting(&envelope(&rect)) {
            let cell = &self.cells[candidate.idx()];
            let Some(estimate) = cell.latest_estimate() else {
                log::warn!("population cell {} has no estimates; skipping", cell.id);
                continue;
            };
            if cell.original_area() <= 0.0 {
                log::warn!("population cell {} has non-positive area; skipping", cell.id);
                continue;
            }

            let intersection = cell.boundary.intersection(area);
            let ratio = intersection.unsigned_area() / cell.original_area();
            if ratio <= min_overlap_ratio {
                continue;
            }

            share.weighted += ratio * estimate;
            if counted.insert(&cell.id) {
                share.unweighted += estimate;
            }
        }
        share
    }
}
