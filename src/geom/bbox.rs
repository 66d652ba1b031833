use geo::Rect;
use rstar::{AABB, RTreeObject};

/// A bounding box in an R-tree, tied to a geometry in some backing store by
/// index.
#[derive(Debug, Clone)]
pub(crate) struct IndexedBounds {
    idx: usize,
    bbox: Rect<f64>,
}

impl IndexedBounds {
    pub(crate) fn new(idx: usize, bbox: Rect<f64>) -> Self {
        Self { idx, bbox }
    }

    /// Index of the backing geometry.
    pub(crate) fn idx(&self) -> usize { self.idx }
}

impl RTreeObject for IndexedBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        envelope(&self.bbox)
    }
}

/// Convert a geo bounding rect into an rstar envelope.
pub(crate) fn envelope(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners(rect.min().into(), rect.max().into())
}
