//! Ranked risk-contribution table.
//!
//! One row per static feature and per aggregated time-series feature,
//! sorted by absolute contribution, with rows at or below the noise floor
//! removed. Truncation keeps the strongest rows and folds the rest into a
//! single "Others" row whose contribution is the signed sum of the folded
//! rows. Missing population statistics and missing patient values degrade
//! the row's text, never the table.

use super::aggregate::TimeseriesContributions;
use crate::catalog::{FeatureCatalog, FeatureMetadata, FeatureRef};
use crate::config::ExplanationConfig;
use crate::core::constants::OTHERS_ROW;
use crate::core::error::{Result, SepsisVisionError};
use crate::core::types::{display_name, Contribution, ContributionStrength, StaticIndex};
use crate::patient::PatientRecord;
use crate::population::{BandMembership, PopulationReference, RelativePosition};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// What a table row stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowKind {
    /// A static feature at this catalog index
    Static(StaticIndex),
    /// An aggregated time-series feature
    TimeSeries,
    /// Folded rows
    Others {
        /// Number of parameters folded in
        folded: usize,
        /// Folded parameters at or above the cutoff
        above_cutoff: usize,
    },
}

/// One row of the risk-contribution table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskContributionRow {
    /// Feature name, or "Others"
    pub parameter: String,
    pub kind: RowKind,
    pub raw_value: Option<f64>,
    /// Raw value with its unit; empty when the value is missing
    pub formatted_value: String,
    /// Signed contribution in risk percentage points
    pub contribution: Contribution,
    pub strength: Option<ContributionStrength>,
    pub description: String,
    pub comparison: String,
}

impl RiskContributionRow {
    /// Display name of the parameter
    pub fn display_name(&self) -> String {
        match self.kind {
            RowKind::Others { .. } => OTHERS_ROW.to_string(),
            _ => display_name(&self.parameter),
        }
    }

    pub fn is_others(&self) -> bool {
        matches!(self.kind, RowKind::Others { .. })
    }
}

/// Strength band of a contribution
pub fn contribution_strength(contribution: f64, config: &ExplanationConfig) -> ContributionStrength {
    let magnitude = contribution.abs();
    if magnitude > config.strong_contribution {
        ContributionStrength::Much
    } else if magnitude > config.moderate_contribution {
        ContributionStrength::Slightly
    } else {
        ContributionStrength::NotMuch
    }
}

/// Build the ranked detail table.
///
/// `static_shap` is in catalog order; `timeseries` holds one aggregated
/// value per catalog time-series feature. With `truncate` set, rows past
/// `config.truncate_top_n` are folded into an "Others" row.
pub fn build_detail_table(
    static_shap: ArrayView1<'_, f64>,
    timeseries: &TimeseriesContributions,
    patient: &PatientRecord,
    population: &PopulationReference,
    catalog: &FeatureCatalog,
    config: &ExplanationConfig,
    truncate: bool,
) -> Result<Vec<RiskContributionRow>> {
    if static_shap.len() != catalog.num_static() {
        return Err(SepsisVisionError::dimension_mismatch(
            format!("{} static attributions", catalog.num_static()),
            static_shap.len().to_string(),
        ));
    }

    let static_rows = catalog
        .static_features()
        .iter()
        .zip(catalog.static_refs())
        .enumerate()
        .map(|(index, (name, feature_ref))| {
            (name, feature_ref, RowKind::Static(index), static_shap[index])
        });
    let series_rows = catalog
        .timeseries_features()
        .iter()
        .zip(catalog.timeseries_refs())
        .filter_map(|(name, feature_ref)| {
            timeseries
                .get(name)
                .map(|&value| (name, feature_ref, RowKind::TimeSeries, value))
        });

    let mut rows: Vec<RiskContributionRow> = static_rows
        .chain(series_rows)
        .filter(|(_, _, _, contribution)| !contribution.is_nan())
        .map(|(name, feature_ref, kind, contribution)| {
            build_row(name, feature_ref, kind, contribution, patient, population, catalog, config)
        })
        .collect();

    rows.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
    rows.retain(|row| row.contribution.abs() > config.noise_floor);

    log::debug!("Detail table holds {} rows above the noise floor", rows.len());

    if truncate {
        Ok(truncate_rows(rows, config.truncate_top_n, config.others_cutoff))
    } else {
        Ok(rows)
    }
}

#[allow(clippy::too_many_arguments)]
fn build_row(
    name: &str,
    feature_ref: &FeatureRef,
    kind: RowKind,
    contribution: f64,
    patient: &PatientRecord,
    population: &PopulationReference,
    catalog: &FeatureCatalog,
    config: &ExplanationConfig,
) -> RiskContributionRow {
    let raw_value = patient.get_feature_value(feature_ref);
    let strength = contribution_strength(contribution, config);
    let metadata = catalog.metadata(name);

    let mut description = format!(
        "The parameter '{}' contributes {} to the risk.",
        display_name(name),
        strength
    );
    let (formatted_value, comparison) = match raw_value {
        Some(value) => (
            format_value(value, catalog.unit(name)),
            comparison_text(name, value, metadata, population),
        ),
        None => {
            description.push_str(" No value is available for this patient.");
            (String::new(), "No patient value available for comparison.".to_string())
        }
    };

    RiskContributionRow {
        parameter: name.to_string(),
        kind,
        raw_value,
        formatted_value,
        contribution,
        strength: Some(strength),
        description,
        comparison,
    }
}

fn format_value(value: f64, unit: &str) -> String {
    if unit.is_empty() {
        format!("{:.2}", value)
    } else {
        format!("{:.2} {}", value, unit)
    }
}

fn comparison_text(
    feature: &str,
    value: f64,
    metadata: Option<&FeatureMetadata>,
    population: &PopulationReference,
) -> String {
    let mut parts = Vec::new();

    if let Some(sentence) = metadata.and_then(|m| normal_range_sentence(value, m)) {
        parts.push(sentence);
    }

    match population.feature_statistics(feature) {
        Ok(stats) => {
            match stats.relative_position(value) {
                RelativePosition::ComparativelyLow => parts.push(
                    "Compared to the patient base, this value is comparatively low.".to_string(),
                ),
                RelativePosition::ComparativelyHigh => parts.push(
                    "Compared to the patient base, this value is comparatively high.".to_string(),
                ),
                RelativePosition::Typical => {}
            }
            let band = match stats.band_membership(value) {
                BandMembership::Overlap => {
                    "The patient's value is in the overlapping range of survivors and non-survivors."
                }
                BandMembership::Survivor => "The patient's value is within the typical range of survivors.",
                BandMembership::NonSurvivor => {
                    "The patient's value is within the typical range of non-survivors."
                }
                BandMembership::Outside => {
                    "The patient's value is outside the typical range of both survivors and non-survivors."
                }
            };
            parts.push(band.to_string());
        }
        Err(e) if e.is_recoverable() => {
            log::debug!("No population statistics for '{}': {}", feature, e);
            parts.push("Statistics not available for this feature.".to_string());
        }
        Err(e) => {
            log::warn!("Population lookup for '{}' failed: {}", feature, e);
            parts.push("Statistics not available for this feature.".to_string());
        }
    }

    parts.join(" ")
}

fn normal_range_sentence(value: f64, metadata: &FeatureMetadata) -> Option<String> {
    let unit = metadata.unit_or_empty();
    let with_unit = |bound: f64| {
        if unit.is_empty() {
            format!("{}", bound)
        } else {
            format!("{} {}", bound, unit)
        }
    };
    match (metadata.normal_lower, metadata.normal_upper) {
        (Some(lower), _) if value < lower => {
            Some(format!("Below the normal lower bound of {}.", with_unit(lower)))
        }
        (_, Some(upper)) if value > upper => {
            Some(format!("Above the normal upper bound of {}.", with_unit(upper)))
        }
        (Some(lower), Some(upper)) => Some(format!(
            "Within the normal range of {} to {}.",
            lower,
            with_unit(upper)
        )),
        (Some(_), None) | (None, Some(_)) => Some("Within the normal range.".to_string()),
        (None, None) => None,
    }
}

/// Keep the first `top_n` rows and fold the rest into an "Others" row.
///
/// The "Others" contribution is the signed sum of the folded rows. Folding
/// an existing "Others" row carries its counts forward, so a truncated
/// table can be truncated again.
pub fn truncate_rows(
    mut rows: Vec<RiskContributionRow>,
    top_n: usize,
    others_cutoff: f64,
) -> Vec<RiskContributionRow> {
    if rows.len() <= top_n {
        return rows;
    }
    let folded_rows = rows.split_off(top_n);

    let mut folded = 0;
    let mut above_cutoff = 0;
    let mut contribution = 0.0;
    for row in &folded_rows {
        contribution += row.contribution;
        match row.kind {
            RowKind::Others {
                folded: inner,
                above_cutoff: inner_above,
            } => {
                folded += inner;
                above_cutoff += inner_above;
            }
            _ => {
                folded += 1;
                if row.contribution.abs() >= others_cutoff {
                    above_cutoff += 1;
                }
            }
        }
    }

    rows.push(RiskContributionRow {
        parameter: OTHERS_ROW.to_string(),
        kind: RowKind::Others {
            folded,
            above_cutoff,
        },
        raw_value: None,
        formatted_value: String::new(),
        contribution,
        strength: None,
        description: format!(
            "Combined contribution of {} other parameters outside the top {}; {} of them contribute at least ±{} each.",
            folded, top_n, above_cutoff, others_cutoff
        ),
        comparison: String::new(),
    });
    rows
}
