//! Patient record: raw clinical values and model-ready tensors.

use super::laboratory::LabSummary;
use super::series::HourlySeries;
use crate::catalog::feature_ref::{
    FeatureRef, CLINICAL_FIELDS, DEMOGRAPHIC_FIELDS, DIAGNOSIS_CLASSES, SCORE_FIELDS,
    SPECIMEN_GROUPS, URINE_OUTPUT, VASOPRESSORS, VITAL_SIGNS,
};
use crate::core::error::{Result, SepsisVisionError};
use crate::core::types::{LabStat, SeriesSource, StaticGroup};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scaled model inputs: the static vector in scaler order and the
/// (hours x features) time-series tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlTensors {
    pub static_features: Array1<f64>,
    pub timeseries: Array2<f64>,
}

/// Ethnicity encoded by the one-hot `race_*` demographic columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ethnicity {
    White,
    Black,
    Hispanic,
    Other,
}

impl Ethnicity {
    pub const ALL: [Ethnicity; 4] = [
        Ethnicity::White,
        Ethnicity::Black,
        Ethnicity::Hispanic,
        Ethnicity::Other,
    ];

    /// Demographic column holding this ethnicity's flag
    pub fn column(self) -> &'static str {
        match self {
            Ethnicity::White => "race_white",
            Ethnicity::Black => "race_black",
            Ethnicity::Hispanic => "race_hispanic",
            Ethnicity::Other => "race_other",
        }
    }
}

impl fmt::Display for Ethnicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ethnicity::White => write!(f, "White"),
            Ethnicity::Black => write!(f, "Black"),
            Ethnicity::Hispanic => write!(f, "Hispanic"),
            Ethnicity::Other => write!(f, "Other"),
        }
    }
}

/// Gender encoded by the one-hot `gender_F` / `gender_M` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Demographic column holding this gender's flag
    pub fn column(self) -> &'static str {
        match self {
            Gender::Female => "gender_F",
            Gender::Male => "gender_M",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Female => write!(f, "Female"),
            Gender::Male => write!(f, "Male"),
        }
    }
}

/// A patient's raw clinical data.
///
/// Scalar groups map field names to optional values. Mutating any raw value
/// discards the stored tensors, which must then be rebuilt before the
/// record can be scored again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    statics: BTreeMap<StaticGroup, BTreeMap<String, Option<f64>>>,
    laboratory: BTreeMap<String, LabSummary>,
    series: BTreeMap<SeriesSource, BTreeMap<String, HourlySeries>>,
    tensors: Option<MlTensors>,
}

impl Default for PatientRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl PatientRecord {
    /// Create a record with every known field present and missing
    pub fn new() -> Self {
        fn fields(names: &[&str]) -> BTreeMap<String, Option<f64>> {
            names.iter().map(|name| (name.to_string(), None)).collect()
        }
        fn streams(names: &[&str]) -> BTreeMap<String, HourlySeries> {
            names
                .iter()
                .map(|name| (name.to_string(), HourlySeries::missing()))
                .collect()
        }

        let statics = BTreeMap::from([
            (StaticGroup::Demographics, fields(&DEMOGRAPHIC_FIELDS)),
            (StaticGroup::Scores, fields(&SCORE_FIELDS)),
            (StaticGroup::Clinical, fields(&CLINICAL_FIELDS)),
            (StaticGroup::Diagnosis, fields(&DIAGNOSIS_CLASSES)),
            (StaticGroup::Specimen, fields(&SPECIMEN_GROUPS)),
        ]);
        let series = BTreeMap::from([
            (SeriesSource::Vitals, streams(&VITAL_SIGNS)),
            (SeriesSource::UrineOutput, streams(&[URINE_OUTPUT])),
            (SeriesSource::Vasopressor, streams(&VASOPRESSORS)),
        ]);

        PatientRecord {
            statics,
            laboratory: BTreeMap::new(),
            series,
            tensors: None,
        }
    }

    // Scalar groups

    /// Fields of one scalar group
    pub fn group(&self, group: StaticGroup) -> Option<&BTreeMap<String, Option<f64>>> {
        self.statics.get(&group)
    }

    /// Value of a scalar field
    pub fn static_value(&self, group: StaticGroup, field: &str) -> Option<f64> {
        self.statics.get(&group)?.get(field).copied().flatten()
    }

    /// Overwrite a scalar field. Unknown fields are rejected.
    pub fn set_static(&mut self, group: StaticGroup, field: &str, value: Option<f64>) -> Result<()> {
        let slot = self
            .statics
            .get_mut(&group)
            .and_then(|fields| fields.get_mut(field))
            .ok_or_else(|| {
                SepsisVisionError::invalid_parameter(
                    "field",
                    field,
                    format!("not a {} field", group),
                )
            })?;
        *slot = value;
        self.tensors = None;
        Ok(())
    }

    /// Ethnicity from the one-hot race columns; the first set flag wins
    pub fn ethnicity(&self) -> Option<Ethnicity> {
        Ethnicity::ALL.into_iter().find(|e| {
            self.static_value(StaticGroup::Demographics, e.column())
                .is_some_and(|flag| flag != 0.0)
        })
    }

    /// Gender from the one-hot gender columns
    pub fn gender(&self) -> Option<Gender> {
        [Gender::Female, Gender::Male].into_iter().find(|g| {
            self.static_value(StaticGroup::Demographics, g.column())
                .is_some_and(|flag| flag != 0.0)
        })
    }

    // Laboratory

    /// Laboratory summaries keyed by test name
    pub fn laboratory(&self) -> &BTreeMap<String, LabSummary> {
        &self.laboratory
    }

    /// Summary of one laboratory test
    pub fn lab(&self, test: &str) -> Option<&LabSummary> {
        self.laboratory.get(test)
    }

    /// Insert or replace a laboratory summary
    pub fn set_lab(&mut self, test: &str, summary: LabSummary) {
        self.laboratory.insert(test.to_string(), summary);
        self.tensors = None;
    }

    /// Overwrite one statistic of an existing laboratory test
    pub fn set_lab_stat(&mut self, test: &str, stat: LabStat, value: Option<f64>) -> Result<()> {
        let summary = self
            .laboratory
            .get_mut(test)
            .ok_or_else(|| SepsisVisionError::missing_value(format!("{}{}", test, stat.suffix())))?;
        summary.set(stat, value);
        self.tensors = None;
        Ok(())
    }

    // Time series

    /// One hourly stream
    pub fn series(&self, source: SeriesSource, name: &str) -> Option<&HourlySeries> {
        self.series.get(&source)?.get(name)
    }

    /// Streams of one source
    pub fn streams(&self, source: SeriesSource) -> Option<&BTreeMap<String, HourlySeries>> {
        self.series.get(&source)
    }

    /// Replace an hourly stream. Unknown streams are rejected.
    pub fn set_series(&mut self, source: SeriesSource, name: &str, series: HourlySeries) -> Result<()> {
        let slot = self
            .series
            .get_mut(&source)
            .and_then(|streams| streams.get_mut(name))
            .ok_or_else(|| {
                SepsisVisionError::invalid_parameter(
                    "stream",
                    name,
                    format!("not a {} stream", source),
                )
            })?;
        *slot = series;
        self.tensors = None;
        Ok(())
    }

    /// Unrounded mean over the present hours of a stream
    pub fn series_average(&self, source: SeriesSource, name: &str) -> Option<f64> {
        self.series(source, name)?.mean()
    }

    /// Mean of a stream at display precision
    pub fn display_average(&self, source: SeriesSource, name: &str) -> Option<f64> {
        self.series_average(source, name)
            .map(|mean| source.precision_for(name).display(mean))
    }

    // Unified lookup

    /// Resolve a classified feature to its raw value. Time-series features
    /// resolve to their display average.
    pub fn get_feature_value(&self, feature: &FeatureRef) -> Option<f64> {
        match feature {
            FeatureRef::Static { group, field } => self.static_value(*group, field),
            FeatureRef::LabStatistic { test, stat } => self.lab(test)?.get(*stat),
            FeatureRef::TimeSeriesAverage { source, name } => self.display_average(*source, name),
            FeatureRef::Unknown(_) => None,
        }
    }

    /// Resolve a feature by name
    pub fn feature_value(&self, name: &str) -> Option<f64> {
        self.get_feature_value(&FeatureRef::classify(name))
    }

    // Tensors

    /// Stored model inputs, if built since the last edit
    pub fn tensors(&self) -> Option<&MlTensors> {
        self.tensors.as_ref()
    }

    /// Store freshly built model inputs
    pub fn set_tensors(&mut self, tensors: MlTensors) {
        self.tensors = Some(tensors);
    }

    /// Stored model inputs or an error naming what is missing
    pub fn require_tensors(&self) -> Result<&MlTensors> {
        self.tensors.as_ref().ok_or_else(|| {
            SepsisVisionError::prediction("model inputs have not been built for this patient")
        })
    }
}
