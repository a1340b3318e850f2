//! Risk predictor: model, scalers and background behind one contract.

use super::model::RiskModel;
use super::scaler::{ExpectedColumnOrder, FeatureRow, FittedScaler};
use super::shap::{AttributionResult, Background, ExpectedGradients};
use crate::catalog::FeatureCatalog;
use crate::config::ExplanationConfig;
use crate::core::error::{Result, SepsisVisionError};
use crate::patient::PatientRecord;
use ndarray::{Array1, Array2, Axis};

/// Wraps the trained model with its two fitted scalers.
///
/// The scalers' column orders are authoritative: model inputs are always
/// laid out in scaler order, and attributions are mapped back to catalog
/// order before they leave the predictor.
#[derive(Debug)]
pub struct RiskPredictor {
    model: Box<dyn RiskModel>,
    static_scaler: FittedScaler,
    timeseries_scaler: FittedScaler,
    background: Background,
    explainer: ExpectedGradients,
    /// Catalog index of each static scaler column
    static_to_catalog: Vec<usize>,
    /// Time-series streams in tensor column order
    timeseries_streams: Vec<String>,
    /// Catalog index of each tensor column
    timeseries_to_catalog: Vec<usize>,
    missing_sentinel: f64,
}

impl RiskPredictor {
    /// Assemble a predictor, validating every artifact against the catalog.
    ///
    /// Fails with a contract error when the catalog, the scalers and the
    /// model disagree about their inputs.
    pub fn new(
        model: Box<dyn RiskModel>,
        static_scaler: FittedScaler,
        timeseries_scaler: FittedScaler,
        background: Background,
        catalog: &FeatureCatalog,
        config: &ExplanationConfig,
    ) -> Result<Self> {
        let static_to_catalog = static_scaler
            .expected_columns()
            .permutation_from(catalog.static_features())?;

        let timeseries_streams = timeseries_scaler.expected_columns().feature_major_streams()?;
        let stream_order = ExpectedColumnOrder::new(timeseries_streams.clone())?;
        let timeseries_to_catalog = stream_order.permutation_from(catalog.timeseries_features())?;

        if model.static_dim() != static_to_catalog.len() {
            return Err(SepsisVisionError::contract(format!(
                "model expects {} static inputs but the static scaler has {} columns",
                model.static_dim(),
                static_to_catalog.len()
            )));
        }
        if model.timeseries_dim() != timeseries_streams.len() {
            return Err(SepsisVisionError::contract(format!(
                "model expects {} time-series features but the time-series scaler covers {}",
                model.timeseries_dim(),
                timeseries_streams.len()
            )));
        }
        if background.static_dim() != model.static_dim()
            || background.timeseries_shape().1 != model.timeseries_dim()
        {
            return Err(SepsisVisionError::dimension_mismatch(
                format!(
                    "background with {} static and {} time-series features",
                    model.static_dim(),
                    model.timeseries_dim()
                ),
                format!(
                    "{} static and {} time-series features",
                    background.static_dim(),
                    background.timeseries_shape().1
                ),
            ));
        }

        let suspicious = background.values_beyond(config.background_scale_guard);
        if suspicious > 0 {
            log::warn!(
                "{} background values exceed |{}|; the background may not be scaled like patient data",
                suspicious,
                config.background_scale_guard
            );
        }

        log::info!(
            "Risk predictor ready: {} static inputs, {} time-series features, {} background samples",
            static_to_catalog.len(),
            timeseries_streams.len(),
            background.len()
        );

        Ok(RiskPredictor {
            model,
            static_scaler,
            timeseries_scaler,
            background,
            explainer: ExpectedGradients::from_config(config),
            static_to_catalog,
            timeseries_streams,
            timeseries_to_catalog,
            missing_sentinel: config.missing_sentinel,
        })
    }

    pub fn static_scaler(&self) -> &FittedScaler {
        &self.static_scaler
    }

    pub fn timeseries_scaler(&self) -> &FittedScaler {
        &self.timeseries_scaler
    }

    /// Time-series streams in the column order of the model tensor
    pub fn timeseries_streams(&self) -> &[String] {
        &self.timeseries_streams
    }

    /// Fill value for missing scaled inputs
    pub fn missing_sentinel(&self) -> f64 {
        self.missing_sentinel
    }

    /// Mortality risk in [0, 1] from the patient's stored tensors
    pub fn predict(&self, patient: &PatientRecord) -> Result<f64> {
        let tensors = patient.require_tensors()?;
        let risk = self
            .model
            .predict_proba(tensors.static_features.view(), tensors.timeseries.view())?;
        if !(0.0..=1.0).contains(&risk) {
            return Err(SepsisVisionError::prediction(format!(
                "model returned {} outside [0, 1]",
                risk
            )));
        }
        Ok(risk)
    }

    /// Attributions for the patient's stored tensors, in catalog order
    pub fn generate_attribution(&self, patient: &PatientRecord) -> Result<AttributionResult> {
        let tensors = patient.require_tensors()?;
        let raw = self.explainer.explain(
            self.model.as_ref(),
            &self.background,
            tensors.static_features.view(),
            tensors.timeseries.view(),
        )?;

        let mut static_shap = Array1::zeros(raw.static_shap.len());
        for (model_index, &catalog_index) in self.static_to_catalog.iter().enumerate() {
            static_shap[catalog_index] = raw.static_shap[model_index];
        }
        let mut timeseries_shap_raw = Array2::zeros(raw.timeseries_shap_raw.dim());
        for (model_column, &catalog_column) in self.timeseries_to_catalog.iter().enumerate() {
            timeseries_shap_raw
                .column_mut(catalog_column)
                .assign(&raw.timeseries_shap_raw.index_axis(Axis(1), model_column));
        }

        Ok(AttributionResult {
            static_shap,
            timeseries_shap_raw,
        })
    }

    /// Reindex both unscaled rows to the scalers' fitted orders and scale
    /// them. Columns absent from a row come back as NaN; the caller decides
    /// how to fill them.
    pub fn scale_raw_data(
        &self,
        static_row: &FeatureRow,
        timeseries_row: &FeatureRow,
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        let scaled_static = self.static_scaler.transform_row(static_row)?;
        let scaled_timeseries = self.timeseries_scaler.transform_row(timeseries_row)?;
        Ok((scaled_static, scaled_timeseries))
    }
}
