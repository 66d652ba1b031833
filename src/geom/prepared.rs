use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use rstar::{AABB, RTree};

use crate::geom::bbox::{IndexedBounds, envelope};

/// A pre-indexed form of a (possibly multi-part) area, enabling fast repeated
/// intersection and containment tests against many query geometries.
///
/// The R-tree holds per-part bounding boxes; queries take an envelope pass
/// first and only run the exact predicate on surviving parts.
#[derive(Debug, Clone)]
pub struct PreparedArea {
    geom: MultiPolygon<f64>,
    rtree: RTree<IndexedBounds>,
}

impl PreparedArea {
    pub fn new(geom: MultiPolygon<f64>) -> Self {
        let rtree = RTree::bulk_load(
            geom.0
                .iter()
                .enumerate()
                .filter_map(|(i, part)| part.bounding_rect().map(|rect| IndexedBounds::new(i, rect)))
                .collect(),
        );
        Self { geom, rtree }
    }

    /// The underlying geometry.
    #[inline]
    pub fn geometry(&self) -> &MultiPolygon<f64> { &self.geom }

    /// Whether the area has no parts at all.
    #[inline]
    pub fn is_empty(&self) -> bool { self.geom.0.is_empty() }

    /// Exact intersection test against another area, with a cheap bounding-box
    /// pass over the part index first.
    pub fn intersects(&self, other: &MultiPolygon<f64>) -> bool {
        let Some(rect) = other.bounding_rect() else { return false };
        let search = envelope(&rect);
        self.rtree
            .locate_in_envelope_intersecting(&search)
            .any(|part| self.geom.0[part.idx()].intersects(other))
    }

    /// Whether a point lies inside or on the boundary of the area.
    pub fn covers_point(&self, point: &Point<f64>) -> bool {
        let search = AABB::from_point([point.x(), point.y()]);
        self.rtree
            .locate_in_envelope_intersecting(&search)
            .any(|part| self.geom.0[part.idx()].intersects(point))
    }
}
