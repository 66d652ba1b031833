use geo::{BooleanOps, MultiPolygon, Polygon, Validation};

/// Merge one tower's raw sector polygons into a single coverage area.
///
/// Sectors that fail validity checks are logged and dropped rather than
/// poisoning the whole dissolve; a tower whose sectors are all invalid ends up
/// with empty coverage.
pub fn dissolve(sectors: &[Polygon<f64>]) -> MultiPolygon<f64> {
    let valid: Vec<MultiPolygon<f64>> = sectors
        .iter()
        .enumerate()
        .filter_map(|(i, sector)| {
            if sector.is_valid() {
                Some(MultiPolygon(vec![sector.clone()]))
            } else {
                log::warn!("dropping invalid sector polygon #{i} from dissolve");
                None
            }
        })
        .collect();
    reduce_union(valid)
}

/// Batched cascade union of many coverage areas into one.
///
/// The input is split into fixed-size batches, each batch is unioned by
/// pairwise reduction, and the batch results are unioned into the final
/// geometry. Unioning thousands of polygons in one reduction accumulates
/// self-intersection artifacts; batching bounds the working set per call and
/// isolates numerical failures to a batch. Invalid inputs are logged and
/// excluded from their batch. Zero input yields an empty MultiPolygon.
pub fn batched_union<'a>(
    shapes: impl IntoIterator<Item = &'a MultiPolygon<f64>>,
    batch_size: usize,
) -> MultiPolygon<f64> {
    let batch_size = batch_size.max(1);
    let shapes: Vec<&MultiPolygon<f64>> = shapes.into_iter().collect();

    let batches: Vec<MultiPolygon<f64>> = shapes
        .chunks(batch_size)
        .map(|batch| {
            let valid: Vec<MultiPolygon<f64>> = batch
                .iter()
                .enumerate()
                .filter_map(|(i, shape)| {
                    if shape.is_valid() {
                        Some((*shape).clone())
                    } else {
                        log::warn!("excluding invalid geometry #{i} from union batch");
                        None
                    }
                })
                .collect();
            reduce_union(valid)
        })
        .collect();

    reduce_union(batches)
}

/// Pairwise union reduction; empty input reduces to an empty MultiPolygon.
fn reduce_union(shapes: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    shapes
        .into_iter()
        .reduce(|a, b| a.union(&b))
        .unwrap_or_else(|| MultiPolygon(vec![]))
}
