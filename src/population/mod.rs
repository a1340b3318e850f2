//! Population reference statistics.
//!
//! The reference table is keyed by statistic (rows) and feature (columns).
//! It is loaded once, shared read-only across sessions, and consulted for
//! table comparison sentences and counterfactual bounds. Survivor and
//! non-survivor bands are not guaranteed to lie within `[min, max]`;
//! [`SliderBounds`] clamps them for display instead of rejecting them.

use crate::core::error::{Result, SepsisVisionError};
use crate::catalog::feature_ref::SCORE_FIELDS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Share of the population range treated as comparatively low or high.
const RELATIVE_POSITION_MARGIN: f64 = 0.1;

/// Ranges at least this wide use whole-number slider steps.
const WIDE_RANGE: f64 = 20.0;

/// Statistic rows of the reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Min,
    Max,
    SurvivorLower,
    SurvivorUpper,
    SurvivorMean,
    NonSurvivorLower,
    NonSurvivorUpper,
    NonSurvivorMean,
}

impl Statistic {
    pub const ALL: [Statistic; 8] = [
        Statistic::Min,
        Statistic::Max,
        Statistic::SurvivorLower,
        Statistic::SurvivorUpper,
        Statistic::SurvivorMean,
        Statistic::NonSurvivorLower,
        Statistic::NonSurvivorUpper,
        Statistic::NonSurvivorMean,
    ];

    /// Row label in the reference file
    pub fn row_key(self) -> &'static str {
        match self {
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::SurvivorLower => "survivor_lower",
            Statistic::SurvivorUpper => "survivor_upper",
            Statistic::SurvivorMean => "survivor_mean",
            Statistic::NonSurvivorLower => "non_survivor_lower",
            Statistic::NonSurvivorUpper => "non_survivor_upper",
            Statistic::NonSurvivorMean => "non_survivor_mean",
        }
    }

    /// Parse a row label
    pub fn from_row_key(key: &str) -> Option<Statistic> {
        Statistic::ALL.into_iter().find(|s| s.row_key() == key)
    }
}

/// Where a value falls relative to the outcome bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandMembership {
    /// Inside both the survivor and the non-survivor band
    Overlap,
    Survivor,
    NonSurvivor,
    Outside,
}

/// Where a value falls within the population range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelativePosition {
    ComparativelyLow,
    Typical,
    ComparativelyHigh,
}

/// All statistics of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub min: f64,
    pub max: f64,
    pub survivor_lower: f64,
    pub survivor_upper: f64,
    pub non_survivor_lower: f64,
    pub non_survivor_upper: f64,
    pub survivor_mean: Option<f64>,
    pub non_survivor_mean: Option<f64>,
}

impl FeatureStatistics {
    /// Statistics with both outcome bands spanning the full range
    pub fn with_range(min: f64, max: f64) -> Self {
        FeatureStatistics {
            min,
            max,
            survivor_lower: min,
            survivor_upper: max,
            non_survivor_lower: min,
            non_survivor_upper: max,
            survivor_mean: None,
            non_survivor_mean: None,
        }
    }

    /// Set the survivor and non-survivor bands
    pub fn with_bands(mut self, survivor: (f64, f64), non_survivor: (f64, f64)) -> Self {
        self.survivor_lower = survivor.0;
        self.survivor_upper = survivor.1;
        self.non_survivor_lower = non_survivor.0;
        self.non_survivor_upper = non_survivor.1;
        self
    }

    /// Position within the lowest or highest tenth of the range
    pub fn relative_position(&self, value: f64) -> RelativePosition {
        let margin = (self.max - self.min) * RELATIVE_POSITION_MARGIN;
        if value < self.min + margin {
            RelativePosition::ComparativelyLow
        } else if value > self.max - margin {
            RelativePosition::ComparativelyHigh
        } else {
            RelativePosition::Typical
        }
    }

    /// Membership in the outcome bands, bounds inclusive
    pub fn band_membership(&self, value: f64) -> BandMembership {
        let survivor = (self.survivor_lower..=self.survivor_upper).contains(&value);
        let non_survivor = (self.non_survivor_lower..=self.non_survivor_upper).contains(&value);
        match (survivor, non_survivor) {
            (true, true) => BandMembership::Overlap,
            (true, false) => BandMembership::Survivor,
            (false, true) => BandMembership::NonSurvivor,
            (false, false) => BandMembership::Outside,
        }
    }
}

/// Statistics keyed by statistic and feature.
#[derive(Debug, Clone, Default)]
pub struct PopulationReference {
    features: Vec<String>,
    values: HashMap<Statistic, HashMap<String, f64>>,
}

impl PopulationReference {
    /// Create an empty reference
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a reference table from disk
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            SepsisVisionError::data_loading(format!(
                "Failed to open population reference {}: {}",
                path.display(),
                e
            ))
        })?;
        let reference = Self::from_reader(file)?;
        log::info!(
            "Loaded population statistics for {} features from {}",
            reference.features.len(),
            path.display()
        );
        Ok(reference)
    }

    /// Parse a reference table. Unknown statistic rows are skipped and
    /// non-numeric cells are treated as absent.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let features: Vec<String> = csv_reader
            .headers()?
            .iter()
            .skip(1)
            .map(str::to_string)
            .collect();
        let mut values: HashMap<Statistic, HashMap<String, f64>> = HashMap::new();

        for record in csv_reader.records() {
            let record = record?;
            let label = record.get(0).unwrap_or_default();
            let Some(statistic) = Statistic::from_row_key(label) else {
                log::debug!("Skipping unknown population statistic '{}'", label);
                continue;
            };
            let row = values.entry(statistic).or_default();
            for (feature, cell) in features.iter().zip(record.iter().skip(1)) {
                if let Some(value) = cell.parse::<f64>().ok().filter(|v| v.is_finite()) {
                    row.insert(feature.clone(), value);
                }
            }
        }

        Ok(PopulationReference { features, values })
    }

    /// Insert or replace every statistic of a feature
    pub fn insert(&mut self, feature: &str, stats: FeatureStatistics) {
        if !self.features.iter().any(|f| f == feature) {
            self.features.push(feature.to_string());
        }
        let entries = [
            (Statistic::Min, Some(stats.min)),
            (Statistic::Max, Some(stats.max)),
            (Statistic::SurvivorLower, Some(stats.survivor_lower)),
            (Statistic::SurvivorUpper, Some(stats.survivor_upper)),
            (Statistic::SurvivorMean, stats.survivor_mean),
            (Statistic::NonSurvivorLower, Some(stats.non_survivor_lower)),
            (Statistic::NonSurvivorUpper, Some(stats.non_survivor_upper)),
            (Statistic::NonSurvivorMean, stats.non_survivor_mean),
        ];
        for (statistic, value) in entries {
            let row = self.values.entry(statistic).or_default();
            match value {
                Some(value) => row.insert(feature.to_string(), value),
                None => row.remove(feature),
            };
        }
    }

    /// Feature columns in file order
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// One statistic of one feature
    pub fn get(&self, feature: &str, statistic: Statistic) -> Result<f64> {
        self.values
            .get(&statistic)
            .and_then(|row| row.get(feature))
            .copied()
            .ok_or_else(|| SepsisVisionError::missing_statistics(feature))
    }

    /// Range and outcome bands of a feature. Fails with a recoverable
    /// missing-statistics error when any of them is absent.
    pub fn feature_statistics(&self, feature: &str) -> Result<FeatureStatistics> {
        Ok(FeatureStatistics {
            min: self.get(feature, Statistic::Min)?,
            max: self.get(feature, Statistic::Max)?,
            survivor_lower: self.get(feature, Statistic::SurvivorLower)?,
            survivor_upper: self.get(feature, Statistic::SurvivorUpper)?,
            non_survivor_lower: self.get(feature, Statistic::NonSurvivorLower)?,
            non_survivor_upper: self.get(feature, Statistic::NonSurvivorUpper)?,
            survivor_mean: self.get(feature, Statistic::SurvivorMean).ok(),
            non_survivor_mean: self.get(feature, Statistic::NonSurvivorMean).ok(),
        })
    }

    /// Features offered for comparison views: identifiers, one-hot
    /// encodings, binary clinical flags and `extra_exclusions` are left out.
    pub fn available_features(&self, extra_exclusions: &[&str]) -> Vec<&str> {
        const EXCLUDED: [&str; 9] = [
            "positiveculture_poe",
            "suspected_infection_time_poe_days",
            "blood_culture_positive",
            "vent",
            "septic_shock_explicit",
            "severe_sepsis_explicit",
            "gender_F",
            "gender_M",
            "elixhauser_hospital",
        ];
        self.features
            .iter()
            .map(String::as_str)
            .filter(|f| !f.starts_with("hadm_id"))
            .filter(|f| !["race_", "diagnosis_", "specimen_"].iter().any(|p| f.contains(p)))
            .filter(|f| !EXCLUDED.contains(f) && !extra_exclusions.contains(f))
            .collect()
    }
}

/// Input bounds for a counterfactual value control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderBounds {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Survivor band clamped into `[min, max]`
    pub survivor: (f64, f64),
    /// Non-survivor band clamped into `[min, max]`
    pub non_survivor: (f64, f64),
}

impl SliderBounds {
    /// Bounds for a feature. Discrete scores and ranges of at least 20 step
    /// by 1, everything else by 0.1.
    pub fn for_feature(feature: &str, stats: &FeatureStatistics) -> Self {
        let (min, max) = if stats.min <= stats.max {
            (stats.min, stats.max)
        } else {
            log::warn!("Population range of '{}' is inverted", feature);
            (stats.max, stats.min)
        };
        let step = if SCORE_FIELDS.contains(&feature) || max - min >= WIDE_RANGE {
            1.0
        } else {
            0.1
        };
        let clamp = |lower: f64, upper: f64| {
            let (lower, upper) = (lower.clamp(min, max), upper.clamp(min, max));
            (lower.min(upper), lower.max(upper))
        };
        SliderBounds {
            min,
            max,
            step,
            survivor: clamp(stats.survivor_lower, stats.survivor_upper),
            non_survivor: clamp(stats.non_survivor_lower, stats.non_survivor_upper),
        }
    }

    /// Clamp a value into the slider range
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "\
,heartrate,lactate_max,race_white,vent,sofa
min,30,0.3,0,0,0
max,180,15,1,1,20
survivor_lower,70,0.8,0,0,1
survivor_upper,100,2.5,1,1,6
non_survivor_lower,90,2.0,0,0,5
non_survivor_upper,130,8.0,1,1,14
survivor_mean,84,1.6,,,
";

    #[test]
    fn test_load_and_lookup() {
        let reference = PopulationReference::from_reader(REFERENCE.as_bytes()).unwrap();
        assert_eq!(reference.features().len(), 5);
        assert_eq!(reference.get("heartrate", Statistic::Max).unwrap(), 180.0);

        let stats = reference.feature_statistics("lactate_max").unwrap();
        assert_eq!(stats.survivor_mean, Some(1.6));
        assert_eq!(stats.non_survivor_mean, None);

        let err = reference.feature_statistics("troponin_max").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_available_features_exclusions() {
        let reference = PopulationReference::from_reader(REFERENCE.as_bytes()).unwrap();
        assert_eq!(
            reference.available_features(&[]),
            vec!["heartrate", "lactate_max", "sofa"]
        );
        assert_eq!(reference.available_features(&["sofa"]), vec!["heartrate", "lactate_max"]);
    }

    #[test]
    fn test_position_and_bands() {
        let stats = FeatureStatistics::with_range(0.0, 100.0).with_bands((20.0, 60.0), (50.0, 90.0));
        assert_eq!(stats.relative_position(5.0), RelativePosition::ComparativelyLow);
        assert_eq!(stats.relative_position(50.0), RelativePosition::Typical);
        assert_eq!(stats.relative_position(95.0), RelativePosition::ComparativelyHigh);
        assert_eq!(stats.band_membership(55.0), BandMembership::Overlap);
        assert_eq!(stats.band_membership(30.0), BandMembership::Survivor);
        assert_eq!(stats.band_membership(80.0), BandMembership::NonSurvivor);
        assert_eq!(stats.band_membership(95.0), BandMembership::Outside);
    }

    #[test]
    fn test_slider_bounds() {
        let wide = FeatureStatistics::with_range(30.0, 180.0).with_bands((10.0, 100.0), (90.0, 400.0));
        let bounds = SliderBounds::for_feature("heartrate", &wide);
        assert_eq!(bounds.step, 1.0);
        assert_eq!(bounds.survivor, (30.0, 100.0));
        assert_eq!(bounds.non_survivor, (90.0, 180.0));
        assert_eq!(bounds.clamp(500.0), 180.0);

        let narrow = FeatureStatistics::with_range(0.3, 15.0);
        assert_eq!(SliderBounds::for_feature("lactate_max", &narrow).step, 0.1);
        assert_eq!(SliderBounds::for_feature("sofa", &narrow).step, 1.0);
    }

    #[test]
    fn test_insert_round_trip() {
        let mut reference = PopulationReference::new();
        let stats = FeatureStatistics::with_range(35.0, 41.0);
        reference.insert("tempc", stats);
        assert_eq!(reference.feature_statistics("tempc").unwrap(), stats);
    }
}
