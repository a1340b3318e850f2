//! Global feature importance across the patient population.

use super::aggregate::aggregate_timeseries;
use crate::catalog::FeatureCatalog;
use crate::core::error::{Result, SepsisVisionError};
use crate::prediction::AttributionResult;
use serde::{Deserialize, Serialize};

/// Input family of a ranked feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    Static,
    Timeseries,
}

/// Mean absolute attribution of one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub mean_abs_contribution: f64,
    pub input_type: InputType,
}

/// Static and time-series importances in one list, strongest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalImportance {
    ranking: Vec<FeatureImportance>,
}

impl GlobalImportance {
    /// Combine precomputed per-feature importances, each aligned with the
    /// catalog order of its input family
    pub fn from_vectors(
        static_importance: &[f64],
        timeseries_importance: &[f64],
        catalog: &FeatureCatalog,
    ) -> Result<Self> {
        if static_importance.len() != catalog.num_static()
            || timeseries_importance.len() != catalog.num_timeseries()
        {
            return Err(SepsisVisionError::dimension_mismatch(
                format!(
                    "{} static and {} time-series importances",
                    catalog.num_static(),
                    catalog.num_timeseries()
                ),
                format!(
                    "{} and {}",
                    static_importance.len(),
                    timeseries_importance.len()
                ),
            ));
        }

        let tag = |names: &[String], values: &[f64], input_type| {
            names
                .iter()
                .zip(values)
                .map(|(feature, &value)| FeatureImportance {
                    feature: feature.clone(),
                    mean_abs_contribution: value,
                    input_type,
                })
                .collect::<Vec<_>>()
        };
        let mut ranking = tag(catalog.static_features(), static_importance, InputType::Static);
        ranking.extend(tag(
            catalog.timeseries_features(),
            timeseries_importance,
            InputType::Timeseries,
        ));
        ranking.sort_by(|a, b| b.mean_abs_contribution.total_cmp(&a.mean_abs_contribution));
        Ok(GlobalImportance { ranking })
    }

    /// Mean absolute attribution over a set of patients. Time-series
    /// attributions are summed over hours per patient first.
    pub fn from_attributions(attributions: &[AttributionResult], catalog: &FeatureCatalog) -> Result<Self> {
        if attributions.is_empty() {
            return Err(SepsisVisionError::invalid_parameter(
                "attributions",
                "0",
                "at least one patient is required",
            ));
        }
        let mut static_sum = vec![0.0; catalog.num_static()];
        let mut series_sum = vec![0.0; catalog.num_timeseries()];

        for attribution in attributions {
            if attribution.static_shap.len() != static_sum.len() {
                return Err(SepsisVisionError::dimension_mismatch(
                    format!("{} static attributions", static_sum.len()),
                    attribution.static_shap.len().to_string(),
                ));
            }
            for (sum, value) in static_sum.iter_mut().zip(attribution.static_shap.iter()) {
                *sum += value.abs();
            }
            let aggregated = aggregate_timeseries(
                attribution.timeseries_shap_raw.view(),
                catalog.timeseries_features(),
            )?;
            for (sum, feature) in series_sum.iter_mut().zip(catalog.timeseries_features()) {
                *sum += aggregated.get(feature).copied().unwrap_or(0.0).abs();
            }
        }

        let n = attributions.len() as f64;
        let mean = |sums: Vec<f64>| sums.into_iter().map(|s| s / n).collect::<Vec<_>>();
        Self::from_vectors(&mean(static_sum), &mean(series_sum), catalog)
    }

    /// Ranked features, strongest first
    pub fn ranking(&self) -> &[FeatureImportance] {
        &self.ranking
    }

    /// The strongest `n` features and the summed importance of the rest
    pub fn top_with_others(&self, n: usize) -> (&[FeatureImportance], f64) {
        let split = n.min(self.ranking.len());
        let others = self.ranking[split..]
            .iter()
            .map(|f| f.mean_abs_contribution)
            .sum();
        (&self.ranking[..split], others)
    }
}
