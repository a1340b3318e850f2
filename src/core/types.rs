//! Core data types shared across SepsisVision modules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribution value type. Attributions are reported in risk percentage
/// points once multiplied by the configured output scale.
pub type Contribution = f64;

/// Index of a feature in the static feature order.
pub type StaticIndex = usize;

/// Scalar field groups of a patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StaticGroup {
    /// Age, weight and one-hot race/gender columns
    Demographics,
    /// Severity scores (SOFA, SIRS, GCS, Elixhauser)
    Scores,
    /// Clinical flags and numeric clinical fields
    Clinical,
    /// Diagnosis class flags
    Diagnosis,
    /// Specimen group flags
    Specimen,
}

impl fmt::Display for StaticGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticGroup::Demographics => write!(f, "demographics"),
            StaticGroup::Scores => write!(f, "scores"),
            StaticGroup::Clinical => write!(f, "clinical"),
            StaticGroup::Diagnosis => write!(f, "diagnosis"),
            StaticGroup::Specimen => write!(f, "specimen"),
        }
    }
}

/// Table holding a 24-hour time-series stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeriesSource {
    /// Vital signs (heart rate, blood pressures, respiration, temperature, SpO2)
    Vitals,
    /// Hourly urine output
    UrineOutput,
    /// Vasopressor doses, one stream per drug
    Vasopressor,
}

impl SeriesSource {
    /// Rounding applied to values written back into this stream
    pub fn precision_for(self, feature: &str) -> SeriesPrecision {
        match self {
            SeriesSource::Vitals if feature == "tempc" => SeriesPrecision::Decimals(1),
            SeriesSource::Vasopressor => SeriesPrecision::Decimals(2),
            _ => SeriesPrecision::Integer,
        }
    }
}

impl fmt::Display for SeriesSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesSource::Vitals => write!(f, "vitals"),
            SeriesSource::UrineOutput => write!(f, "urineoutput"),
            SeriesSource::Vasopressor => write!(f, "vasopressor"),
        }
    }
}

/// Summary statistic stored per laboratory test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LabStat {
    /// Number of observations
    Count,
    /// Mean value
    Mean,
    /// Maximum value
    Max,
    /// Minimum value
    Min,
    /// Linear trend, absent with fewer than two observations
    Slope,
}

impl LabStat {
    /// All statistics in suffix-matching order
    pub const ALL: [LabStat; 5] = [
        LabStat::Count,
        LabStat::Mean,
        LabStat::Max,
        LabStat::Min,
        LabStat::Slope,
    ];

    /// Column suffix used in feature names, e.g. `_mean`
    pub fn suffix(self) -> &'static str {
        match self {
            LabStat::Count => "_count",
            LabStat::Mean => "_mean",
            LabStat::Max => "_max",
            LabStat::Min => "_min",
            LabStat::Slope => "_slope",
        }
    }

    /// Split a feature name such as `lactate_max` into test and statistic
    pub fn split_feature(name: &str) -> Option<(&str, LabStat)> {
        LabStat::ALL.iter().find_map(|stat| {
            name.strip_suffix(stat.suffix())
                .filter(|test| !test.is_empty())
                .map(|test| (test, *stat))
        })
    }
}

/// Rounding policy for values written into a time-series stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesPrecision {
    /// Round to the nearest integer
    Integer,
    /// Round to a fixed number of decimals
    Decimals(u32),
}

impl SeriesPrecision {
    /// Apply the rounding policy to a value
    pub fn apply(self, value: f64) -> f64 {
        match self {
            SeriesPrecision::Integer => value.round(),
            SeriesPrecision::Decimals(places) => round_to(value, places),
        }
    }

    /// Format a displayed average; integer averages are truncated
    pub fn display(self, value: f64) -> f64 {
        match self {
            SeriesPrecision::Integer => value.trunc(),
            SeriesPrecision::Decimals(places) => round_to(value, places),
        }
    }
}

/// Round a value to a fixed number of decimals
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Natural-language strength of a single contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContributionStrength {
    /// Above the strong threshold
    Much,
    /// Above the moderate threshold
    Slightly,
    /// Everything else
    NotMuch,
}

impl fmt::Display for ContributionStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributionStrength::Much => write!(f, "much"),
            ContributionStrength::Slightly => write!(f, "slightly"),
            ContributionStrength::NotMuch => write!(f, "not much"),
        }
    }
}

/// Coarse label for a predicted mortality risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Below 25%
    Low,
    /// 25% to 50%
    Moderate,
    /// 50% to 75%
    Elevated,
    /// 75% and above
    High,
}

impl RiskLevel {
    /// Classify a risk probability in [0, 1]
    pub fn from_probability(risk: f64) -> Self {
        if risk < 0.25 {
            RiskLevel::Low
        } else if risk < 0.5 {
            RiskLevel::Moderate
        } else if risk < 0.75 {
            RiskLevel::Elevated
        } else {
            RiskLevel::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::Elevated => write!(f, "elevated"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Human-readable parameter name: underscores become spaces, words are
/// capitalized.
pub fn display_name(feature: &str) -> String {
    feature
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lab_suffix_split() {
        assert_eq!(LabStat::split_feature("lactate_max"), Some(("lactate", LabStat::Max)));
        assert_eq!(
            LabStat::split_feature("bicarbonate_slope"),
            Some(("bicarbonate", LabStat::Slope))
        );
        assert_eq!(LabStat::split_feature("_mean"), None);
        assert_eq!(LabStat::split_feature("heartrate"), None);
    }

    #[test]
    fn test_series_precision() {
        assert_eq!(SeriesSource::Vitals.precision_for("tempc"), SeriesPrecision::Decimals(1));
        assert_eq!(SeriesSource::Vitals.precision_for("heartrate"), SeriesPrecision::Integer);
        assert_eq!(
            SeriesSource::Vasopressor.precision_for("norepinephrine_dose"),
            SeriesPrecision::Decimals(2)
        );
        assert_eq!(SeriesPrecision::Decimals(1).apply(37.46), 37.5);
        assert_eq!(SeriesPrecision::Integer.apply(88.5), 89.0);
        assert_eq!(SeriesPrecision::Integer.display(88.9), 88.0);
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_probability(0.1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.25), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_probability(0.6), RiskLevel::Elevated);
        assert_eq!(RiskLevel::from_probability(0.75), RiskLevel::High);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("suspected_infection_time_poe_days"), "Suspected Infection Time Poe Days");
        assert_eq!(display_name("sofa"), "Sofa");
    }
}
