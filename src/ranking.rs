use std::cmp::Ordering;

use geo::MultiPolygon;

use crate::{
    config::WeightProfile,
    facility::{FacilityCounts, FacilityIndex},
    population::PopulationGrid,
    types::TowerId,
};

/// Final per-tower output row. Produced fresh per run and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingRecord {
    pub tower_id: TowerId,
    pub police: u32,
    pub fire_station: u32,
    pub hospital: u32,
    pub weighted_population: f64,
    pub unweighted_population: u64,
    pub score: f64,
}

/// Weighted priority score for one tower's tallies.
///
/// `other` facilities never contribute.
pub fn score(counts: &FacilityCounts, weighted_population: f64, weights: &WeightProfile) -> f64 {
    f64::from(counts.police) * weights.police
        + f64::from(counts.fire_station) * weights.fire_station
        + f64::from(counts.hospital) * weights.hospital
        + weighted_population * weights.population_scale
}

/// Count facilities and allocate population inside each exclusive area, score
/// the results, and return records sorted descending by score. The sort is
/// stable: equal scores keep the input encounter order.
pub fn rank_towers(
    exclusive: &[(TowerId, MultiPolygon<f64>)],
    facilities: &FacilityIndex,
    grid: &PopulationGrid,
    weights: &WeightProfile,
    min_overlap_ratio: f64,
) -> Vec<RankingRecord> {
    let mut records: Vec<RankingRecord> = exclusive
        .iter()
        .map(|(id, area)| {
            let counts = facilities.count_within(area);
            let share = grid.allocate(area, min_overlap_ratio);
            let score = score(&counts, share.weighted, weights);
            log::debug!(
                "tower {id} | police: {} | fire: {} | hospital: {} | pop_w: {:.2} | score: {score:.2}",
                counts.police, counts.fire_station, counts.hospital, share.weighted,
            );
            RankingRecord {
                tower_id: id.clone(),
                police: counts.police,
                fire_station: counts.fire_station,
                hospital: counts.hospital,
                weighted_population: share.weighted,
                unweighted_population: share.unweighted.round() as u64,
                score,
            }
        })
        .collect();

    records.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    records
}
