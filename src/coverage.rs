use ahash::AHashSet;
use anyhow::Result;
use geo::{BooleanOps, MultiPolygon, Validation};

use crate::{
    cache::{CoverageStore, Fingerprint, get_or_compute},
    config::AnalysisParams,
    geom::{PreparedArea, batched_union},
    types::{PrefixRange, Tower, TowerId},
};

/// Union of the coverage of every tower not in the failure set, optionally
/// restricted to a prefix range. Cached by fingerprint; a cache hit skips the
/// union entirely.
///
/// Zero live towers is not an error: the union is empty and downstream stages
/// treat it as "no live coverage".
pub fn live_union(
    towers: &[Tower],
    failed: &AHashSet<TowerId>,
    prefix_range: Option<&PrefixRange>,
    params: &AnalysisParams,
    store: &dyn CoverageStore,
) -> Result<MultiPolygon<f64>> {
    let key = Fingerprint::of(failed.iter(), prefix_range);
    get_or_compute(store, &key, || {
        let selected: Vec<&MultiPolygon<f64>> = towers
            .iter()
            .filter(|t| !failed.contains(&t.id))
            .filter(|t| prefix_range.is_none_or(|r| r.contains(&t.id)))
            .map(|t| &t.coverage)
            .collect();

        if selected.is_empty() {
            log::warn!("no live towers selected; live coverage is empty");
            return Ok(MultiPolygon(vec![]));
        }

        log::info!("unioning {} live towers (batch size {})", selected.len(), params.network_batch_size);
        Ok(batched_union(selected, params.network_batch_size))
    })
}

/// The area each failed tower serves exclusively: its coverage minus the live
/// union. Results preserve the input tower order.
///
/// Per-tower behavior:
/// - empty or invalid coverage yields an empty exclusive area (logged, never
///   an error);
/// - coverage disjoint from the live union is returned unchanged, skipping
///   the expensive difference;
/// - otherwise the exact geometric difference is taken.
///
/// Iteration is batched purely to bound memory and report progress; each
/// tower's result is independent of the others.
pub fn exclusive_coverage(
    failed_towers: &[Tower],
    live: &PreparedArea,
    params: &AnalysisParams,
) -> Vec<(TowerId, MultiPolygon<f64>)> {
    let batch_size = params.exclusive_batch_size.max(1);
    let mut out = Vec::with_capacity(failed_towers.len());

    for (batch_no, batch) in failed_towers.chunks(batch_size).enumerate() {
        log::info!(
            "exclusive coverage batch {}/{}",
            batch_no + 1,
            failed_towers.len().div_ceil(batch_size)
        );

        for tower in batch {
            let exclusive = if tower.coverage.0.is_empty() {
                log::warn!("tower {} has empty coverage; exclusive area is empty", tower.id);
                MultiPolygon(vec![])
            } else if !tower.coverage.is_valid() {
                log::warn!("tower {} has invalid coverage; exclusive area is empty", tower.id);
                MultiPolygon(vec![])
            } else if live.is_empty() || !live.intersects(&tower.coverage) {
                tower.coverage.clone()
            } else {
                tower.coverage.difference(live.geometry())
            };
            out.push((tower.id.clone(), exclusive));
        }
    }

    out
}

/// Union of every tower's coverage, failed or not.
pub fn total_network_coverage(towers: &[Tower], params: &AnalysisParams) -> MultiPolygon<f64> {
    batched_union(towers.iter().map(|t| &t.coverage), params.network_batch_size)
}

/// The single combined area losing coverage: the total network union minus
/// the union of live towers. Useful as one aggregate outline of the outage.
pub fn failed_exclusive_aggregate(
    towers: &[Tower],
    failed: &AHashSet<TowerId>,
    params: &AnalysisParams,
) -> MultiPolygon<f64> {
    let total = total_network_coverage(towers, params);
    let live = batched_union(
        towers.iter().filter(|t| !failed.contains(&t.id)).map(|t| &t.coverage),
        params.network_batch_size,
    );
    if live.0.is_empty() {
        return total;
    }
    total.difference(&live)
}
