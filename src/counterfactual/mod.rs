//! Counterfactual engine: edit a copy of the patient and re-score it.
//!
//! Edits only touch raw values. [`predict_scenario`] rebuilds the scaled
//! tensors in the scalers' column order and runs the predictor on them.

pub mod editor;
pub mod tensors;

pub use editor::{
    apply_lab_edit, apply_scalar_edit, apply_timeseries_target, set_ethnicity, set_gender,
    solve_scale_factor, ScaleSolution, TimeseriesEdit,
};
pub use tensors::{
    flatten_feature_major, rebuild_tensors, reshape_feature_major, static_feature_row,
    timeseries_feature_row,
};

use crate::catalog::FeatureCatalog;
use crate::core::error::Result;
use crate::patient::PatientRecord;
use crate::prediction::RiskPredictor;

/// Rebuild the counterfactual's tensors, store them, and return its risk
pub fn predict_scenario(
    counterfactual: &mut PatientRecord,
    catalog: &FeatureCatalog,
    predictor: &RiskPredictor,
) -> Result<f64> {
    let tensors = rebuild_tensors(counterfactual, catalog, predictor)?;
    counterfactual.set_tensors(tensors);
    let risk = predictor.predict(counterfactual)?;
    log::info!("Scenario risk: {:.4}", risk);
    Ok(risk)
}
