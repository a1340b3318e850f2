//! Attribution aggregation: hourly collapse and category sums.

use crate::catalog::FeatureCatalog;
use crate::core::constants::{RISK_DECREASING_EVIDENCE, RISK_INCREASING_EVIDENCE};
use crate::core::error::{Result, SepsisVisionError};
use crate::core::types::Contribution;
use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One aggregated attribution per time-series feature.
pub type TimeseriesContributions = BTreeMap<String, Contribution>;

/// Collapse the hour axis by summation.
///
/// Any number of rows is accepted, so a single row of already aggregated
/// values comes back unchanged.
pub fn aggregate_timeseries(
    timeseries_shap_raw: ArrayView2<'_, f64>,
    features: &[String],
) -> Result<TimeseriesContributions> {
    if timeseries_shap_raw.ncols() != features.len() {
        return Err(SepsisVisionError::dimension_mismatch(
            format!("{} time-series attribution columns", features.len()),
            timeseries_shap_raw.ncols().to_string(),
        ));
    }
    Ok(features
        .iter()
        .zip(timeseries_shap_raw.axis_iter(Axis(1)))
        .map(|(name, column)| (name.clone(), nan_sum(column.iter().copied())))
        .collect())
}

/// Category sums plus overall evidence, rounded toward zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupContributions {
    /// Categories in catalog order, static first
    categories: Vec<(String, i64)>,
    increasing: i64,
    decreasing: i64,
}

impl GroupContributions {
    /// Rounded sum for a category or one of the evidence keys
    pub fn get(&self, name: &str) -> Option<i64> {
        match name {
            RISK_INCREASING_EVIDENCE => Some(self.increasing),
            RISK_DECREASING_EVIDENCE => Some(self.decreasing),
            _ => self
                .categories
                .iter()
                .find(|(category, _)| category == name)
                .map(|(_, value)| *value),
        }
    }

    /// Sum of all positive contributions
    pub fn risk_increasing(&self) -> i64 {
        self.increasing
    }

    /// Sum of all negative contributions
    pub fn risk_decreasing(&self) -> i64 {
        self.decreasing
    }

    /// Category sums without the evidence keys
    pub fn categories(&self) -> &[(String, i64)] {
        &self.categories
    }

    /// Every entry, evidence keys last
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.categories
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
            .chain([
                (RISK_INCREASING_EVIDENCE, self.increasing),
                (RISK_DECREASING_EVIDENCE, self.decreasing),
            ])
    }
}

/// Sum attributions per category and split them into risk-increasing and
/// risk-decreasing evidence. Zero contributions count toward their category
/// only; NaN attributions are skipped.
pub fn aggregate_groups(
    static_shap: ArrayView1<'_, f64>,
    timeseries: &TimeseriesContributions,
    catalog: &FeatureCatalog,
) -> Result<GroupContributions> {
    if static_shap.len() != catalog.num_static() {
        return Err(SepsisVisionError::dimension_mismatch(
            format!("{} static attributions", catalog.num_static()),
            static_shap.len().to_string(),
        ));
    }

    let mut categories = Vec::with_capacity(
        catalog.static_categories().len() + catalog.timeseries_categories().len(),
    );
    for category in catalog.static_categories() {
        let sum = nan_sum(category.indices.iter().map(|&i| static_shap[i]));
        categories.push((category.name.clone(), round_toward_zero(sum)));
    }
    for category in catalog.timeseries_categories() {
        let values = category
            .features
            .iter()
            .map(|feature| {
                timeseries.get(feature).copied().ok_or_else(|| {
                    SepsisVisionError::contract(format!(
                        "no aggregated attribution for time-series feature '{}'",
                        feature
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        categories.push((category.name.clone(), round_toward_zero(nan_sum(values))));
    }

    let all = || static_shap.iter().chain(timeseries.values()).copied();
    let increasing = round_toward_zero(nan_sum(all().filter(|v| *v > 0.0)));
    let decreasing = round_toward_zero(nan_sum(all().filter(|v| *v < 0.0)));

    log::debug!(
        "Aggregated {} categories: {:+} increasing, {:+} decreasing",
        categories.len(),
        increasing,
        decreasing
    );

    Ok(GroupContributions {
        categories,
        increasing,
        decreasing,
    })
}

fn nan_sum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().filter(|v| !v.is_nan()).sum()
}

fn round_toward_zero(value: f64) -> i64 {
    value.trunc() as i64
}
