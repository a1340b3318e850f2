//! Common fixtures for SepsisVision integration tests.
//!
//! A small catalog (five static features, three hourly streams), scalers
//! whose column orders differ from the catalog's, a logistic model and a
//! seeded background sample.

#![allow(dead_code)]

use ndarray::{Array1, Array2, Array3};
use rand::prelude::*;
use sepsis_vision::catalog::{SeriesCategory, StaticCategory};
use sepsis_vision::prediction::hourly_column;
use sepsis_vision::*;
use std::collections::HashMap;

pub const STATIC_FEATURES: [&str; 5] = ["age", "sofa", "vent", "lactate_max", "diagnosis_Renal"];
pub const TIMESERIES_FEATURES: [&str; 3] = ["heartrate", "tempc", "norepinephrine_dose"];

/// Static scaler column order
pub const STATIC_SCALER_ORDER: [&str; 5] = ["sofa", "age", "diagnosis_Renal", "lactate_max", "vent"];
/// Time-series scaler stream order
pub const TIMESERIES_SCALER_ORDER: [&str; 3] = ["tempc", "heartrate", "norepinephrine_dose"];

fn names(features: &[&str]) -> Vec<String> {
    features.iter().map(|f| f.to_string()).collect()
}

pub fn catalog_with(timeseries: &[&str], timeseries_categories: Vec<SeriesCategory>) -> FeatureCatalog {
    let metadata = HashMap::from([
        ("heartrate".to_string(), FeatureMetadata::new("bpm", Some(60.0), Some(100.0))),
        ("lactate_max".to_string(), FeatureMetadata::new("mmol/L", Some(0.5), Some(2.0))),
        ("age".to_string(), FeatureMetadata::new("years", None, None)),
    ]);
    FeatureCatalog::new(
        names(&STATIC_FEATURES),
        names(timeseries),
        vec![
            StaticCategory::from_ranges("Demographics", &[0..1]),
            StaticCategory::from_ranges("Clinical", &[1..3, 4..5]),
            StaticCategory::from_ranges("Lab", &[3..4]),
        ],
        timeseries_categories,
        metadata,
    )
    .expect("fixture catalog is consistent")
}

pub fn catalog() -> FeatureCatalog {
    catalog_with(
        &TIMESERIES_FEATURES,
        vec![
            SeriesCategory::new("Vital Signs", &["heartrate", "tempc"]),
            SeriesCategory::new("Vasopressor", &["norepinephrine_dose"]),
        ],
    )
}

pub fn population() -> PopulationReference {
    let mut population = PopulationReference::new();
    population.insert(
        "heartrate",
        FeatureStatistics::with_range(30.0, 180.0).with_bands((60.0, 100.0), (90.0, 130.0)),
    );
    population.insert(
        "tempc",
        FeatureStatistics::with_range(34.0, 42.0).with_bands((36.5, 37.8), (37.5, 39.5)),
    );
    population.insert("norepinephrine_dose", FeatureStatistics::with_range(0.0, 2.0));
    population.insert(
        "lactate_max",
        FeatureStatistics::with_range(0.3, 20.0).with_bands((0.8, 2.5), (2.0, 8.0)),
    );
    population.insert("age", FeatureStatistics::with_range(18.0, 91.0));
    population.insert("sofa", FeatureStatistics::with_range(0.0, 24.0));
    population
}

pub fn static_scaler() -> FittedScaler {
    FittedScaler::standard(
        names(&STATIC_SCALER_ORDER),
        vec![6.0, 65.0, 0.0, 2.0, 0.0],
        vec![4.0, 15.0, 1.0, 2.0, 1.0],
    )
    .expect("valid static scaler")
}

pub fn timeseries_columns(streams: &[&str]) -> Vec<String> {
    streams
        .iter()
        .flat_map(|s| (0..OBSERVATION_HOURS).map(move |h| hourly_column(s, h)))
        .collect()
}

pub fn timeseries_scaler() -> FittedScaler {
    let per_stream = [(37.0, 1.0), (85.0, 15.0), (0.1, 0.2)];
    let mean = per_stream
        .iter()
        .flat_map(|(m, _)| std::iter::repeat(*m).take(OBSERVATION_HOURS))
        .collect();
    let scale = per_stream
        .iter()
        .flat_map(|(_, s)| std::iter::repeat(*s).take(OBSERVATION_HOURS))
        .collect();
    FittedScaler::standard(timeseries_columns(&TIMESERIES_SCALER_ORDER), mean, scale)
        .expect("valid time-series scaler")
}

/// Weights follow the scalers' column orders
pub fn model() -> LogisticRiskModel {
    let static_weights = Array1::from(vec![0.3, 0.2, 0.1, 0.25, 0.15]);
    let timeseries_weights =
        Array2::from_shape_fn((OBSERVATION_HOURS, 3), |(_, f)| [0.01, 0.02, 0.015][f]);
    LogisticRiskModel::new(static_weights, timeseries_weights, -1.0).expect("valid model")
}

pub fn background(samples: usize) -> Background {
    let mut rng = StdRng::seed_from_u64(42);
    let static_samples = Array2::from_shape_fn((samples, 5), |_| rng.gen_range(-1.0..1.0));
    let timeseries_samples =
        Array3::from_shape_fn((samples, OBSERVATION_HOURS, 3), |_| rng.gen_range(-1.0..1.0));
    Background::new(static_samples, timeseries_samples).expect("valid background")
}

pub fn config() -> ExplanationConfig {
    ExplanationConfigBuilder::new()
        .background_samples(64)
        .random_seed(7)
        .build()
        .expect("valid config")
}

pub fn predictor() -> RiskPredictor {
    RiskPredictor::new(
        Box::new(model()),
        static_scaler(),
        timeseries_scaler(),
        background(8),
        &catalog(),
        &config(),
    )
    .expect("fixture artifacts agree")
}

pub fn resources() -> SharedResources {
    SharedResources::new(predictor(), catalog(), population(), config())
}

pub fn ramp(start: f64, step: f64) -> HourlySeries {
    let values: Vec<Option<f64>> = (0..OBSERVATION_HOURS)
        .map(|h| Some(start + step * h as f64))
        .collect();
    HourlySeries::from_slice(&values).expect("full window")
}

/// A septic patient with one missing temperature reading and no weight
pub fn patient() -> PatientRecord {
    let mut patient = PatientRecord::new();
    patient.set_static(StaticGroup::Demographics, "age", Some(70.0)).unwrap();
    patient.set_static(StaticGroup::Scores, "sofa", Some(9.0)).unwrap();
    patient.set_static(StaticGroup::Clinical, "vent", Some(1.0)).unwrap();
    patient.set_static(StaticGroup::Diagnosis, "Renal", Some(1.0)).unwrap();
    let mut lactate = LabSummary::default();
    lactate.set(LabStat::Count, Some(3.0));
    lactate.set(LabStat::Max, Some(4.2));
    lactate.set(LabStat::Min, Some(1.9));
    patient.set_lab("lactate", lactate);

    patient.set_series(SeriesSource::Vitals, "heartrate", ramp(80.0, 1.0)).unwrap();
    let mut temperature = HourlySeries::constant(38.2);
    temperature.set(4, None).unwrap();
    patient.set_series(SeriesSource::Vitals, "tempc", temperature).unwrap();
    patient
        .set_series(SeriesSource::Vasopressor, "norepinephrine_dose", HourlySeries::constant(0.05))
        .unwrap();
    patient
}
