use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, OnceLock},
};

use geo::{Area, MultiPolygon, Point, Polygon};
use regex::Regex;
use smallvec::SmallVec;

/// Stable identity for a cellular tower.
/// Keeps the original structured code text (with leading zeros) but avoids
/// repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TowerId(Arc<str>);

impl TowerId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str { &self.0 }

    /// The zero-padded three-digit numeric prefix of the code, e.g. "001" for
    /// "001-AHPA". Returns `None` when the id does not start with one.
    pub fn numeric_prefix(&self) -> Option<&str> {
        let head = self.0.get(..3)?;
        head.bytes().all(|b| b.is_ascii_digit()).then_some(head)
    }
}

impl fmt::Display for TowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TowerId {
    fn from(value: &str) -> Self { Self::new(value) }
}

fn tower_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{3}-[A-Z]+)").expect("tower id pattern"))
}

/// Extract a tower id from a raw source label, e.g. "001-AHPA-L07-1" -> "001-AHPA".
/// Labels that do not carry the structured prefix code yield `None`.
pub fn extract_tower_id(label: &str) -> Option<TowerId> {
    tower_id_pattern()
        .captures(label)
        .map(|caps| TowerId::new(&caps[1]))
}

/// Inclusive bounds on the three-digit numeric prefix, used to restrict which
/// towers participate in the live-network union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRange {
    start: String,
    end: String,
}

impl PrefixRange {
    /// Build a range from raw bounds, zero-padding each to three characters.
    pub fn new(start: &str, end: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !start.is_empty() && start.len() <= 3 && start.bytes().all(|b| b.is_ascii_digit()),
            "invalid prefix start '{start}': expected 1-3 digits"
        );
        anyhow::ensure!(
            !end.is_empty() && end.len() <= 3 && end.bytes().all(|b| b.is_ascii_digit()),
            "invalid prefix end '{end}': expected 1-3 digits"
        );
        let start = format!("{start:0>3}");
        let end = format!("{end:0>3}");
        anyhow::ensure!(start <= end, "invalid prefix range: start '{start}' is greater than end '{end}'");
        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> &str { &self.start }

    #[inline]
    pub fn end(&self) -> &str { &self.end }

    /// Whether a tower's numeric prefix falls inside the bounds. Towers with
    /// no parsable prefix are excluded.
    pub fn contains(&self, id: &TowerId) -> bool {
        id.numeric_prefix()
            .is_some_and(|p| self.start.as_str() <= p && p <= self.end.as_str())
    }

    /// Token used in cache fingerprints, e.g. "001-042".
    pub(crate) fn cache_token(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// The minimum and maximum numeric prefix present in a set of tower ids, or
/// `None` when no id carries one.
pub fn prefix_bounds<'a>(ids: impl IntoIterator<Item = &'a TowerId>) -> Option<(String, String)> {
    let mut bounds: Option<(String, String)> = None;
    for prefix in ids.into_iter().filter_map(TowerId::numeric_prefix) {
        bounds = Some(match bounds {
            None => (prefix.to_string(), prefix.to_string()),
            Some((lo, hi)) => (
                if prefix < lo.as_str() { prefix.to_string() } else { lo },
                if prefix > hi.as_str() { prefix.to_string() } else { hi },
            ),
        });
    }
    bounds
}

/// Raw antenna-sector polygons for one tower, prior to dissolving.
#[derive(Debug, Clone)]
pub struct TowerSectors {
    pub id: TowerId,
    pub sectors: SmallVec<[Polygon<f64>; 4]>,
}

impl TowerSectors {
    pub fn new(id: TowerId, sectors: impl IntoIterator<Item = Polygon<f64>>) -> Self {
        Self { id, sectors: sectors.into_iter().collect() }
    }
}

/// A tower with its dissolved coverage area (possibly multi-part, possibly
/// empty). Immutable once built.
#[derive(Debug, Clone)]
pub struct Tower {
    pub id: TowerId,
    pub coverage: MultiPolygon<f64>,
}

/// Closed classification of critical facilities. `Other` covers every label
/// the classifier does not recognize and is never scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacilityKind {
    Police,
    FireStation,
    Hospital,
    Other,
}

impl FacilityKind {
    /// Classify a free-text facility label by case-insensitive substring match.
    pub fn classify(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        if label.contains("police") {
            Self::Police
        } else if label.contains("fire") {
            Self::FireStation
        } else if label.contains("hospital") {
            Self::Hospital
        } else {
            Self::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Police => "police",
            Self::FireStation => "fire_station",
            Self::Hospital => "hospital",
            Self::Other => "other",
        }
    }
}

/// A critical facility: point location plus classified kind.
#[derive(Debug, Clone)]
pub struct Facility {
    pub id: Arc<str>,
    pub kind: FacilityKind,
    pub location: Point<f64>,
}

impl Facility {
    pub fn new(id: impl AsRef<str>, kind: FacilityKind, location: Point<f64>) -> Self {
        Self { id: Arc::from(id.as_ref()), kind, location }
    }

    /// Build a facility from a raw label, classifying it on the way in.
    pub fn from_label(id: impl AsRef<str>, label: &str, location: Point<f64>) -> Self {
        Self::new(id, FacilityKind::classify(label), location)
    }
}

/// One population-grid cell with year-stamped estimates.
///
/// The cell keeps its original (pre-intersection) area so that overlap ratios
/// are computed against the full cell even after it has been clipped.
#[derive(Debug, Clone)]
pub struct PopulationCell {
    pub id: Arc<str>,
    pub boundary: MultiPolygon<f64>,
    original_area: f64,
    estimates: BTreeMap<u16, f64>,
}

impl PopulationCell {
    pub fn new(
        id: impl AsRef<str>,
        boundary: MultiPolygon<f64>,
        estimates: impl IntoIterator<Item = (u16, f64)>,
    ) -> Self {
        let original_area = boundary.unsigned_area();
        Self {
            id: Arc::from(id.as_ref()),
            boundary,
            original_area,
            estimates: estimates.into_iter().collect(),
        }
    }

    /// Override the recorded original area (source data sometimes carries its
    /// own area field that differs slightly from the recomputed one).
    pub fn with_original_area(mut self, area: f64) -> Self {
        self.original_area = area;
        self
    }

    #[inline]
    pub fn original_area(&self) -> f64 { self.original_area }

    /// The population estimate for the most recent year, if any.
    pub fn latest_estimate(&self) -> Option<f64> {
        self.estimates.last_key_value().map(|(_, &pop)| pop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn extracts_structured_prefix_codes() {
        assert_eq!(extract_tower_id("001-AHPA-L07-1"), Some(TowerId::new("001-AHPA")));
        assert_eq!(extract_tower_id("042-XRAY"), Some(TowerId::new("042-XRAY")));
        assert_eq!(extract_tower_id("no-tower-here"), None);
        assert_eq!(extract_tower_id("1-AHPA"), None);
    }

    #[test]
    fn numeric_prefix() {
        assert_eq!(TowerId::new("001-AHPA").numeric_prefix(), Some("001"));
        assert_eq!(TowerId::new("xx1-AHPA").numeric_prefix(), None);
        assert_eq!(TowerId::new("01").numeric_prefix(), None);
    }

    #[test]
    fn prefix_range_is_inclusive_and_zero_padded() {
        let range = PrefixRange::new("1", "10").unwrap();
        assert_eq!(range.start(), "001");
        assert_eq!(range.end(), "010");
        assert!(range.contains(&TowerId::new("001-AHPA")));
        assert!(range.contains(&TowerId::new("010-ZULU")));
        assert!(!range.contains(&TowerId::new("011-ZULU")));
        assert!(!range.contains(&TowerId::new("bad-id")));
    }

    #[test]
    fn prefix_range_rejects_junk() {
        assert!(PrefixRange::new("", "010").is_err());
        assert!(PrefixRange::new("01a", "010").is_err());
        assert!(PrefixRange::new("020", "010").is_err());
    }

    #[test]
    fn prefix_bounds_over_ids() {
        let ids = [TowerId::new("017-ABLE"), TowerId::new("003-BAKER"), TowerId::new("junk")];
        assert_eq!(prefix_bounds(&ids), Some(("003".to_string(), "017".to_string())));
        assert_eq!(prefix_bounds(&[TowerId::new("junk")]), None);
    }

    #[test]
    fn classifies_facility_labels() {
        assert_eq!(FacilityKind::classify("Auckland Central Police Station"), FacilityKind::Police);
        assert_eq!(FacilityKind::classify("FIRE station #3"), FacilityKind::FireStation);
        assert_eq!(FacilityKind::classify("city hospital"), FacilityKind::Hospital);
        assert_eq!(FacilityKind::classify("primary school"), FacilityKind::Other);
    }

    #[test]
    fn population_cell_latest_estimate() {
        let boundary = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0),
        ]]);
        let cell = PopulationCell::new("g1", boundary, [(2018, 120.0), (2023, 150.0)]);
        assert_eq!(cell.latest_estimate(), Some(150.0));
        assert!((cell.original_area() - 100.0).abs() < 1e-9);

        let empty = PopulationCell::new("g2", MultiPolygon(vec![]), []);
        assert_eq!(empty.latest_estimate(), None);
    }
}
