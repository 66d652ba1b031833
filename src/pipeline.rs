use ahash::AHashSet;
use anyhow::Result;

use crate::{
    cache::CoverageStore,
    config::{AnalysisParams, PartialWeights, WeightTable},
    coverage::{exclusive_coverage, live_union},
    facility::FacilityIndex,
    geom::{PreparedArea, dissolve},
    population::PopulationGrid,
    ranking::{RankingRecord, rank_towers},
    types::{Facility, PopulationCell, PrefixRange, Tower, TowerId, TowerSectors},
};

/// Everything one analysis run consumes. All geometry is expected in a single
/// Cartesian projected reference system; parsing and reprojection happen
/// upstream.
#[derive(Debug)]
pub struct AnalysisInput {
    /// Raw per-tower sector polygons.
    pub sectors: Vec<TowerSectors>,
    /// Ids of the towers that failed.
    pub failed: Vec<TowerId>,
    /// Optional restriction on which towers join the live union.
    pub prefix_range: Option<PrefixRange>,
    pub facilities: Vec<Facility>,
    pub population: Vec<PopulationCell>,
    /// Disaster-scenario name resolved against the weight table.
    pub scenario: String,
    /// Caller-supplied custom weights; when present they replace the scenario
    /// profile and must be complete and strictly positive.
    pub weight_overrides: Option<PartialWeights>,
}

/// The exclusive-coverage and impact-scoring engine, configured once and run
/// per failure list.
pub struct Analysis<'a> {
    params: AnalysisParams,
    weights: WeightTable,
    store: &'a dyn CoverageStore,
}

impl<'a> Analysis<'a> {
    pub fn new(params: AnalysisParams, weights: WeightTable, store: &'a dyn CoverageStore) -> Self {
        Self { params, weights, store }
    }

    /// Run the full pipeline: dissolve sectors, build (or reuse) the live
    /// union, pre-filter facilities, derive exclusive coverage, allocate
    /// impact, and rank.
    ///
    /// Weight resolution happens first so configuration errors surface before
    /// any geometry work. Per-item data problems degrade to empty results with
    /// a warning; only configuration errors abort.
    pub fn run(&self, input: AnalysisInput) -> Result<Vec<RankingRecord>> {
        let weights = self.weights.resolve(&input.scenario, input.weight_overrides)?;
        log::info!("scenario '{}' resolved to weights {weights:?}", input.scenario);

        let towers: Vec<Tower> = input
            .sectors
            .iter()
            .map(|t| Tower { id: t.id.clone(), coverage: dissolve(&t.sectors) })
            .collect();
        log::info!("dissolved {} towers", towers.len());

        let failed: AHashSet<TowerId> = input.failed.iter().cloned().collect();
        for id in &failed {
            if !towers.iter().any(|t| &t.id == id) {
                log::warn!("failed tower {id} has no coverage geometry; it will not be ranked");
            }
        }
        let failed_towers: Vec<Tower> =
            towers.iter().filter(|t| failed.contains(&t.id)).cloned().collect();

        let live = live_union(
            &towers,
            &failed,
            input.prefix_range.as_ref(),
            &self.params,
            self.store,
        )?;
        let prepared = PreparedArea::new(live);

        let facilities = FacilityIndex::new(input.facilities).uncovered_by(&prepared);
        let grid = PopulationGrid::new(input.population);
        log::info!(
            "{} candidate facilities, {} population cells",
            facilities.len(),
            grid.len()
        );

        let exclusive = exclusive_coverage(&failed_towers, &prepared, &self.params);

        let records = rank_towers(
            &exclusive,
            &facilities,
            &grid,
            &weights,
            self.params.min_overlap_ratio,
        );
        log::info!("ranked {} failed towers", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, NoStore};
    use crate::config::DEFAULT_SCENARIO;
    use crate::types::FacilityKind;
    use geo::{Point, Polygon, polygon};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]
    }

    fn two_tower_input(failed: Vec<TowerId>) -> AnalysisInput {
        AnalysisInput {
            sectors: vec![
                TowerSectors::new(TowerId::new("001-AAAA"), [square(0.0, 0.0, 10.0)]),
                TowerSectors::new(TowerId::new("002-BBBB"), [square(100.0, 0.0, 10.0)]),
            ],
            failed,
            prefix_range: None,
            facilities: vec![Facility::new(
                "h1",
                FacilityKind::Hospital,
                Point::new(5.0, 5.0),
            )],
            population: vec![],
            scenario: DEFAULT_SCENARIO.to_string(),
            weight_overrides: None,
        }
    }

    #[test]
    fn hospital_tower_ranks_first() {
        let analysis = Analysis::new(AnalysisParams::default(), WeightTable::default(), &NoStore);
        let failed = vec![TowerId::new("001-AAAA"), TowerId::new("002-BBBB")];
        let records = analysis.run(two_tower_input(failed)).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tower_id.as_str(), "001-AAAA");
        assert_eq!(records[0].hospital, 1);
        assert!(records[0].score >= 10.0);
        assert_eq!(records[1].hospital, 0);
        assert_eq!(records[1].score, 0.0);
    }

    #[test]
    fn empty_failure_set_ranks_nothing() {
        let analysis = Analysis::new(AnalysisParams::default(), WeightTable::default(), &NoStore);
        let records = analysis.run(two_tower_input(vec![])).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn configuration_error_aborts_before_computation() {
        let table = WeightTable::from_json(
            r#"{"Default": {"hospital": 10, "police": 6, "fire_station": 8}}"#,
        )
        .unwrap();
        let analysis = Analysis::new(AnalysisParams::default(), table, &NoStore);
        let err = analysis
            .run(two_tower_input(vec![TowerId::new("001-AAAA")]))
            .unwrap_err();
        assert!(err.to_string().contains("population_scale"), "{err}");
    }

    #[test]
    fn reruns_with_same_inputs_are_identical() {
        let store = MemoryStore::new();
        let analysis = Analysis::new(AnalysisParams::default(), WeightTable::default(), &store);
        let failed = vec![TowerId::new("001-AAAA")];

        let first = analysis.run(two_tower_input(failed.clone())).unwrap();
        // Second run hits the coverage cache and must reproduce the records
        // bit for bit.
        let second = analysis.run(two_tower_input(failed)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_failed_tower_is_skipped_with_empty_result() {
        let analysis = Analysis::new(AnalysisParams::default(), WeightTable::default(), &NoStore);
        let failed = vec![TowerId::new("001-AAAA"), TowerId::new("999-NOPE")];
        let records = analysis.run(two_tower_input(failed)).unwrap();
        // The unknown id has no geometry and produces no record.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tower_id.as_str(), "001-AAAA");
    }
}
