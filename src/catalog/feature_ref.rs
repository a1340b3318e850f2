//! Typed references to patient features.
//!
//! Feature names arrive as flat strings (`age`, `diagnosis_Renal`,
//! `lactate_max`, `heartrate`). They are classified once, when the catalog
//! is built, into a [`FeatureRef`] that the patient record can resolve
//! without string matching.

use crate::core::types::{LabStat, SeriesSource, StaticGroup};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Demographic scalar fields
pub const DEMOGRAPHIC_FIELDS: [&str; 8] = [
    "age",
    "weight",
    "race_white",
    "race_black",
    "race_hispanic",
    "race_other",
    "gender_F",
    "gender_M",
];

/// Severity score fields
pub const SCORE_FIELDS: [&str; 4] = ["sofa", "sirs", "mingcs", "elixhauser_hospital"];

/// Clinical flag and numeric fields
pub const CLINICAL_FIELDS: [&str; 6] = [
    "suspected_infection_time_poe_days",
    "positiveculture_poe",
    "blood_culture_positive",
    "septic_shock_explicit",
    "severe_sepsis_explicit",
    "vent",
];

/// Diagnosis classes, stored as `diagnosis_<class>` in feature names
pub const DIAGNOSIS_CLASSES: [&str; 13] = [
    "Cancer/Malignancy",
    "Cardiovascular",
    "Gastrointestinal",
    "Hematologic",
    "Hepatic",
    "Metabolic/Endocrine",
    "Musculoskeletal",
    "Neurological",
    "Other",
    "Renal",
    "Respiratory",
    "Sepsis/Infection",
    "Trauma/Injury",
];

/// Specimen groups, stored as `specimen_group_<group>` in feature names
pub const SPECIMEN_GROUPS: [&str; 4] = ["Blood/Serology", "Other", "Respiratory/Swab", "Urine"];

/// Vital sign streams
pub const VITAL_SIGNS: [&str; 7] = [
    "heartrate", "sysbp", "diasbp", "meanbp", "resprate", "tempc", "spo2",
];

/// Urine output stream
pub const URINE_OUTPUT: &str = "urineoutput";

/// Vasopressor dose streams
pub const VASOPRESSORS: [&str; 6] = [
    "dobutamine_dose",
    "dopamine_dose",
    "vasopressin_dose",
    "phenylephrine_dose",
    "epinephrine_dose",
    "norepinephrine_dose",
];

const DIAGNOSIS_PREFIX: &str = "diagnosis_";
const SPECIMEN_PREFIX: &str = "specimen_group_";

/// Resolved location of a feature inside a patient record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureRef {
    /// A scalar field in one of the static groups
    Static {
        /// Group holding the field
        group: StaticGroup,
        /// Field key within the group
        field: String,
    },
    /// One summary statistic of a laboratory test
    LabStatistic {
        /// Laboratory test name
        test: String,
        /// Statistic column
        stat: LabStat,
    },
    /// The 24-hour average of a time-series stream
    TimeSeriesAverage {
        /// Table holding the stream
        source: SeriesSource,
        /// Stream name
        name: String,
    },
    /// A name that matches no known location
    Unknown(String),
}

impl FeatureRef {
    /// Classify a feature name.
    ///
    /// Static groups are checked first, then laboratory suffixes, then
    /// time-series prefixes, so every name has exactly one resolution.
    pub fn classify(name: &str) -> FeatureRef {
        if let Some(group) = static_group_of(name) {
            return FeatureRef::Static {
                group,
                field: name.to_string(),
            };
        }
        if let Some(class) = name.strip_prefix(DIAGNOSIS_PREFIX) {
            return FeatureRef::Static {
                group: StaticGroup::Diagnosis,
                field: class.to_string(),
            };
        }
        if let Some(specimen) = name.strip_prefix(SPECIMEN_PREFIX) {
            return FeatureRef::Static {
                group: StaticGroup::Specimen,
                field: specimen.to_string(),
            };
        }
        if let Some((test, stat)) = LabStat::split_feature(name) {
            return FeatureRef::LabStatistic {
                test: test.to_string(),
                stat,
            };
        }
        if let Some((source, stream)) = series_stream_of(name) {
            return FeatureRef::TimeSeriesAverage {
                source,
                name: stream.to_string(),
            };
        }
        FeatureRef::Unknown(name.to_string())
    }

    /// Whether the reference points at a known location
    pub fn is_known(&self) -> bool {
        !matches!(self, FeatureRef::Unknown(_))
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureRef::Static { group, field } => write!(f, "{}.{}", group, field),
            FeatureRef::LabStatistic { test, stat } => write!(f, "laboratory.{}{}", test, stat.suffix()),
            FeatureRef::TimeSeriesAverage { source, name } => write!(f, "{}.{}[avg]", source, name),
            FeatureRef::Unknown(name) => write!(f, "unknown.{}", name),
        }
    }
}

fn static_group_of(name: &str) -> Option<StaticGroup> {
    if DEMOGRAPHIC_FIELDS.contains(&name) {
        Some(StaticGroup::Demographics)
    } else if SCORE_FIELDS.contains(&name) {
        Some(StaticGroup::Scores)
    } else if CLINICAL_FIELDS.contains(&name) {
        Some(StaticGroup::Clinical)
    } else if SPECIMEN_GROUPS.contains(&name) {
        Some(StaticGroup::Specimen)
    } else {
        None
    }
}

/// Map a name to the time-series stream it starts with
pub(crate) fn series_stream_of(name: &str) -> Option<(SeriesSource, &'static str)> {
    let vital = VITAL_SIGNS
        .iter()
        .find(|stream| name.starts_with(**stream))
        .map(|stream| (SeriesSource::Vitals, *stream));
    let vasopressor = || {
        VASOPRESSORS
            .iter()
            .find(|stream| {
                let drug = stream.trim_end_matches("_dose");
                name.starts_with(drug)
            })
            .map(|stream| (SeriesSource::Vasopressor, *stream))
    };
    let urine = || {
        name.starts_with(URINE_OUTPUT)
            .then_some((SeriesSource::UrineOutput, URINE_OUTPUT))
    };
    vital.or_else(vasopressor).or_else(urine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_static_groups() {
        assert_eq!(
            FeatureRef::classify("age"),
            FeatureRef::Static {
                group: StaticGroup::Demographics,
                field: "age".into()
            }
        );
        assert_eq!(
            FeatureRef::classify("diagnosis_Renal"),
            FeatureRef::Static {
                group: StaticGroup::Diagnosis,
                field: "Renal".into()
            }
        );
        assert_eq!(
            FeatureRef::classify("specimen_group_Blood/Serology"),
            FeatureRef::Static {
                group: StaticGroup::Specimen,
                field: "Blood/Serology".into()
            }
        );
        assert_eq!(
            FeatureRef::classify("vent"),
            FeatureRef::Static {
                group: StaticGroup::Clinical,
                field: "vent".into()
            }
        );
    }

    #[test]
    fn test_lab_suffix_before_series_prefix() {
        // A lab-style suffix wins even when the prefix names a vital sign
        assert_eq!(
            FeatureRef::classify("heartrate_mean"),
            FeatureRef::LabStatistic {
                test: "heartrate".into(),
                stat: LabStat::Mean
            }
        );
        assert_eq!(
            FeatureRef::classify("lactate_slope"),
            FeatureRef::LabStatistic {
                test: "lactate".into(),
                stat: LabStat::Slope
            }
        );
    }

    #[test]
    fn test_classify_series() {
        assert_eq!(
            FeatureRef::classify("tempc"),
            FeatureRef::TimeSeriesAverage {
                source: SeriesSource::Vitals,
                name: "tempc".into()
            }
        );
        assert_eq!(
            FeatureRef::classify("norepinephrine_dose"),
            FeatureRef::TimeSeriesAverage {
                source: SeriesSource::Vasopressor,
                name: "norepinephrine_dose".into()
            }
        );
        assert_eq!(
            FeatureRef::classify("urineoutput"),
            FeatureRef::TimeSeriesAverage {
                source: SeriesSource::UrineOutput,
                name: "urineoutput".into()
            }
        );
        assert!(!FeatureRef::classify("hadm_id").is_known());
    }
}
