//! # SepsisVision
//!
//! Explanations and what-if scenarios for a sepsis mortality risk model.
//!
//! The crate takes a trained two-input classifier (a static feature vector
//! and a 24-hour time-series tensor), attributes each prediction to its
//! input features, and turns the attributions into:
//!
//! - category-level evidence (Demographics, Clinical, Lab, Vital Signs, ...)
//!   with overall risk-increasing and risk-decreasing sums,
//! - a ranked risk-contribution table with population comparisons and an
//!   aggregated "Others" row,
//! - a plain-language interpretation.
//!
//! A counterfactual copy of the patient can be edited (scalar fields,
//! laboratory statistics, target averages for hourly streams) and re-scored
//! without touching the primary patient or its explanation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sepsis_vision::{
//!     CsvPatientSource, ExplanationConfig, ResourcePaths, SharedResources, StudySession,
//! };
//!
//! # fn main() -> sepsis_vision::Result<()> {
//! sepsis_vision::init()?;
//!
//! let resources = sepsis_vision::session::shared_or_init(|| {
//!     SharedResources::load(&ResourcePaths::in_directory("artifacts"), ExplanationConfig::default())
//! })?;
//! let patients = CsvPatientSource::load(&[("xai", "data/xai_patients.csv".into())])?;
//!
//! let mut session = StudySession::load(resources, &patients, "xai", 0)?;
//! let explanation = session.explain()?;
//! println!("{}", explanation.interpretation.text());
//!
//! session.edit_timeseries_average("heartrate", 95.0)?;
//! let scenario = session.predict_scenario()?;
//! println!("risk {:.2} -> {:.2}", session.patient_risk(), scenario);
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    non_snake_case,
    non_upper_case_globals
)]

// Error types, constants and shared enums
pub mod core;

// Explanation thresholds and their loading
pub mod config;

// Feature names, categories and metadata
pub mod catalog;

// Raw patient data
pub mod patient;

// Population statistics for comparisons and slider bounds
pub mod population;

// Model, scalers and attribution
pub mod prediction;

// Aggregation and explanation building
pub mod explanation;

// What-if editing and re-scoring
pub mod counterfactual;

// Per-participant state and shared artifacts
pub mod session;

pub use crate::core::{
    constants::*,
    error::{Result, SepsisVisionError},
    types::*,
};

pub use config::{ExplanationConfig, ExplanationConfigBuilder};

pub use catalog::{FeatureCatalog, FeatureMetadata, FeatureRef, SeriesCategory, StaticCategory};

pub use patient::{
    CsvPatientSource, Ethnicity, Gender, HourlySeries, LabSummary, MlTensors, PatientRecord,
    PatientSource,
};

pub use population::{FeatureStatistics, PopulationReference, SliderBounds, Statistic};

pub use prediction::{
    AttributionResult, Background, ExpectedGradients, FittedScaler, LogisticRiskModel, RiskModel,
    RiskPredictor,
};

pub use explanation::{
    aggregate_groups, aggregate_timeseries, build_detail_table, ClinicalInterpretation,
    GlobalImportance, GroupContributions, RiskContributionRow,
};

pub use counterfactual::{apply_scalar_edit, apply_timeseries_target, predict_scenario, rebuild_tensors};

pub use session::{Explanation, ResourcePaths, SharedResources, StudySession};

/// Initialize logging.
///
/// Installs `env_logger` with `RUST_LOG=info` as the default filter unless
/// another logger is already present. Safe to call more than once.
pub fn init() -> Result<()> {
    crate::core::initialize_core()
}

/// Check if [`init`] has run.
pub fn is_initialized() -> bool {
    crate::core::is_core_initialized()
}
