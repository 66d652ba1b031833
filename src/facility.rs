use geo::{BoundingRect, Contains, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

use crate::{
    geom::{PreparedArea, envelope},
    types::{Facility, FacilityKind},
};

/// A facility location stored in the R-tree, referring back to the facility
/// list by index.
#[derive(Debug, Clone)]
struct FacilityPoint {
    idx: usize,
    position: [f64; 2],
}

impl RTreeObject for FacilityPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Per-kind facility tallies for one exclusive-coverage area.
///
/// `other` is tracked for diagnostics but never contributes to scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FacilityCounts {
    pub police: u32,
    pub fire_station: u32,
    pub hospital: u32,
    pub other: u32,
}

impl FacilityCounts {
    fn tally(&mut self, kind: FacilityKind) {
        match kind {
            FacilityKind::Police => self.police += 1,
            FacilityKind::FireStation => self.fire_station += 1,
            FacilityKind::Hospital => self.hospital += 1,
            FacilityKind::Other => self.other += 1,
        }
    }
}

/// R-tree-indexed facility set supporting candidate lookups by bounding box
/// followed by exact point-in-polygon tests.
#[derive(Debug)]
pub struct FacilityIndex {
    facilities: Vec<Facility>,
    rtree: RTree<FacilityPoint>,
}

impl FacilityIndex {
    pub fn new(facilities: Vec<Facility>) -> Self {
        let rtree = RTree::bulk_load(
            facilities
                .iter()
                .enumerate()
                .map(|(idx, f)| FacilityPoint { idx, position: [f.location.x(), f.location.y()] })
                .collect(),
        );
        Self { facilities, rtree }
    }

    #[inline]
    pub fn len(&self) -> usize { self.facilities.len() }

    #[inline]
    pub fn is_empty(&self) -> bool { self.facilities.is_empty() }

    /// Drop every facility already served by the live network, returning a
    /// reduced index for the per-tower counting passes. Applied once per run.
    ///
    /// A facility on the live-coverage boundary counts as served. An empty
    /// live union keeps everything.
    pub fn uncovered_by(&self, live: &PreparedArea) -> Self {
        if live.is_empty() {
            return Self::new(self.facilities.clone());
        }
        let uncovered: Vec<Facility> = self
            .facilities
            .iter()
            .filter(|f| !live.covers_point(&f.location))
            .cloned()
            .collect();
        log::info!(
            "{} of {} facilities remain outside live coverage",
            uncovered.len(),
            self.facilities.len()
        );
        Self::new(uncovered)
    }

    /// Count facilities whose point lies strictly inside the given area,
    /// tallied by kind. Boundary points are excluded, so tallies are
    /// independent of candidate ordering and index implementation.
    pub fn count_within(&self, area: &MultiPolygon<f64>) -> FacilityCounts {
        let mut counts = FacilityCounts::default();
        let Some(rect) = area.bounding_rect() else { return counts };

        for candidate in self.rtree.locate_in_envelope_intersecting(&envelope(&rect)) {
            let facility = &self.facilities[candidate.idx];
            if area.contains(&facility.location) {
                counts.tally(facility.kind);
            }
        }
        counts
    }
}
