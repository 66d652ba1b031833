use std::collections::BTreeMap;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

/// Scenario name every lookup falls back to.
pub const DEFAULT_SCENARIO: &str = "Default";

/// Scoring coefficients for one disaster scenario. All four fields are
/// required; a table entry missing one is rejected at resolve time, before any
/// per-tower computation runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub hospital: f64,
    pub police: f64,
    pub fire_station: f64,
    pub population_scale: f64,
}

/// A possibly-incomplete set of weights, as deserialized from a profile table
/// or supplied by a caller as custom overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialWeights {
    pub hospital: Option<f64>,
    pub police: Option<f64>,
    pub fire_station: Option<f64>,
    pub population_scale: Option<f64>,
}

impl PartialWeights {
    /// Require all four fields, naming the first missing one.
    fn complete(self, scenario: &str) -> Result<WeightProfile> {
        let require = |field: Option<f64>, name: &str| {
            field.with_context(|| format!("weight profile '{scenario}' is missing key '{name}'"))
        };
        Ok(WeightProfile {
            hospital: require(self.hospital, "hospital")?,
            police: require(self.police, "police")?,
            fire_station: require(self.fire_station, "fire_station")?,
            population_scale: require(self.population_scale, "population_scale")?,
        })
    }
}

impl From<WeightProfile> for PartialWeights {
    fn from(w: WeightProfile) -> Self {
        Self {
            hospital: Some(w.hospital),
            police: Some(w.police),
            fire_station: Some(w.fire_station),
            population_scale: Some(w.population_scale),
        }
    }
}

/// Named preset weight profiles, one per disaster scenario.
///
/// An explicit immutable value passed into the analysis at construction, never
/// ambient global state. The default table always contains "Default".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable {
    profiles: BTreeMap<String, PartialWeights>,
}

impl Default for WeightTable {
    fn default() -> Self {
        let presets = [
            (DEFAULT_SCENARIO, 10.0, 6.0, 8.0, 0.0005),
            ("Earthquake", 12.0, 6.0, 9.0, 0.0006),
            ("Flood", 11.0, 5.0, 10.0, 0.0005),
            ("Cyclone", 10.0, 7.0, 9.0, 0.0007),
        ];
        Self {
            profiles: presets
                .into_iter()
                .map(|(name, hospital, police, fire_station, population_scale)| {
                    (
                        name.to_string(),
                        WeightProfile { hospital, police, fire_station, population_scale }.into(),
                    )
                })
                .collect(),
        }
    }
}

impl WeightTable {
    /// Parse a table from JSON, e.g. `{"Default": {"hospital": 10, ...}, ...}`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse weight profile table")
    }

    pub fn scenarios(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Resolve the profile for a scenario.
    ///
    /// Explicit `overrides` (the "custom" variant) win and must be complete and
    /// strictly positive. Otherwise the scenario name is looked up, falling
    /// back to "Default"; preset fields must be complete and non-negative.
    pub fn resolve(&self, scenario: &str, overrides: Option<PartialWeights>) -> Result<WeightProfile> {
        if let Some(custom) = overrides {
            let profile = custom.complete("custom")?;
            for (value, name) in [
                (profile.hospital, "hospital"),
                (profile.police, "police"),
                (profile.fire_station, "fire_station"),
                (profile.population_scale, "population_scale"),
            ] {
                ensure!(value > 0.0, "custom weight '{name}' must be strictly positive, got {value}");
            }
            return Ok(profile);
        }

        let (name, partial) = match self.profiles.get(scenario) {
            Some(partial) => (scenario, partial),
            None => {
                let Some(fallback) = self.profiles.get(DEFAULT_SCENARIO) else {
                    bail!("unknown scenario '{scenario}' and no '{DEFAULT_SCENARIO}' profile to fall back to");
                };
                (DEFAULT_SCENARIO, fallback)
            }
        };

        let profile = partial.complete(name)?;
        for (value, field) in [
            (profile.hospital, "hospital"),
            (profile.police, "police"),
            (profile.fire_station, "fire_station"),
            (profile.population_scale, "population_scale"),
        ] {
            ensure!(
                value >= 0.0 && value.is_finite(),
                "weight '{field}' in profile '{name}' must be finite and non-negative, got {value}"
            );
        }
        Ok(profile)
    }
}

/// Tuning knobs for the analysis pipeline. Batch sizes bound the working set
/// of each union call; the overlap ratio filters float-sliver intersections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisParams {
    /// Towers per batch when unioning coverage into the live network.
    pub network_batch_size: usize,
    /// Failed towers per batch during exclusive-coverage iteration.
    pub exclusive_batch_size: usize,
    /// Minimum intersection/original area ratio for a population cell to count.
    pub min_overlap_ratio: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            network_batch_size: 200,
            exclusive_batch_size: 20,
            min_overlap_ratio: 0.005,
        }
    }
}
