//! Value edits on a counterfactual patient.
//!
//! Scalar, one-hot and laboratory edits overwrite values directly.
//! Time-series edits take a target average and rescale the existing hourly
//! readings: each reading is multiplied by a common factor and clipped to
//! the population range, and the factor is found by bisection because
//! clipping makes the mean piecewise linear in the factor.

use crate::catalog::FeatureRef;
use crate::config::ExplanationConfig;
use crate::core::constants::OBSERVATION_HOURS;
use crate::core::error::{Result, SepsisVisionError};
use crate::core::types::{LabStat, StaticGroup};
use crate::patient::{Ethnicity, Gender, HourlySeries, LabSummary, PatientRecord};
use crate::population::{PopulationReference, Statistic};
use serde::{Deserialize, Serialize};

/// Upper limit for the scale factor search interval
const MAX_SCALE: f64 = 1e12;

/// Overwrite a scalar field (demographics, scores, clinical flags,
/// diagnosis or specimen flags) addressed by feature name.
pub fn apply_scalar_edit(patient: &mut PatientRecord, feature: &str, value: Option<f64>) -> Result<()> {
    match FeatureRef::classify(feature) {
        FeatureRef::Static { group, field } => patient.set_static(group, &field, value),
        other => Err(SepsisVisionError::invalid_parameter(
            "feature",
            feature,
            format!("{} is not a scalar field", other),
        )),
    }
}

/// Set the one-hot race columns to a single ethnicity
pub fn set_ethnicity(patient: &mut PatientRecord, ethnicity: Ethnicity) -> Result<()> {
    for candidate in Ethnicity::ALL {
        let flag = if candidate == ethnicity { 1.0 } else { 0.0 };
        patient.set_static(StaticGroup::Demographics, candidate.column(), Some(flag))?;
    }
    Ok(())
}

/// Set the one-hot gender columns
pub fn set_gender(patient: &mut PatientRecord, gender: Gender) -> Result<()> {
    for candidate in [Gender::Female, Gender::Male] {
        let flag = if candidate == gender { 1.0 } else { 0.0 };
        patient.set_static(StaticGroup::Demographics, candidate.column(), Some(flag))?;
    }
    Ok(())
}

/// Overwrite one laboratory statistic, adding the test when absent
pub fn apply_lab_edit(patient: &mut PatientRecord, test: &str, stat: LabStat, value: Option<f64>) -> Result<()> {
    if patient.lab(test).is_some() {
        return patient.set_lab_stat(test, stat, value);
    }
    let mut summary = LabSummary::default();
    summary.set(stat, value);
    patient.set_lab(test, summary);
    Ok(())
}

/// Outcome of the scale factor search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSolution {
    /// Chosen factor; `None` when the uniform fallback was used
    pub scale: Option<f64>,
    /// Rescaled and clipped series before display rounding
    pub series: HourlySeries,
    pub iterations: usize,
    pub converged: bool,
}

/// Find the series whose clipped mean matches `target`.
///
/// Missing hours stay missing and the mean is taken over present hours.
/// A series with a near-zero or undefined mean cannot be rescaled, so every
/// hour is set to `target` instead. The clipped mean is non-decreasing in
/// the factor for non-negative readings.
///
/// Fails when either bound is not finite or `lower > upper`.
pub fn solve_scale_factor(
    series: &HourlySeries,
    target: f64,
    lower: f64,
    upper: f64,
    config: &ExplanationConfig,
) -> Result<ScaleSolution> {
    if !lower.is_finite() || !upper.is_finite() || lower > upper {
        return Err(SepsisVisionError::invalid_parameter(
            "bounds",
            format!("[{}, {}]", lower, upper),
            "clipping range must be finite and ordered",
        ));
    }
    let uniform = || ScaleSolution {
        scale: None,
        series: HourlySeries::constant(target),
        iterations: 0,
        converged: true,
    };
    let Some(old_mean) = series.mean() else {
        return Ok(uniform());
    };
    if old_mean.abs() < config.near_zero_mean {
        return Ok(uniform());
    }

    let clipped_mean = |scale: f64| -> f64 {
        let present = series.present_count() as f64;
        series.present().map(|v| (v * scale).clamp(lower, upper)).sum::<f64>() / present
    };

    let naive = target / old_mean;
    let mut high = (naive * 10.0).max(10.0);
    if let Some(min_positive) = series.present().filter(|v| *v > 0.0).reduce(f64::min) {
        high = high.max(upper / min_positive);
    }
    while clipped_mean(high) < target && high < MAX_SCALE {
        high *= 2.0;
    }

    let mut low = 0.0;
    let mut scale = 1.0;
    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.bisection_max_iterations {
        iterations += 1;
        let mid = (low + high) / 2.0;
        let mean = clipped_mean(mid);
        scale = mid;
        if (mean - target).abs() < config.bisection_tolerance {
            converged = true;
            break;
        }
        if mean < target {
            low = mid;
        } else {
            high = mid;
        }
    }

    log::debug!(
        "Scale factor search: target {:.4}, factor {:.6} after {} iterations (converged: {})",
        target,
        scale,
        iterations,
        converged
    );

    Ok(ScaleSolution {
        scale: Some(scale),
        series: series.map_present(|v| (v * scale).clamp(lower, upper)),
        iterations,
        converged,
    })
}

/// Summary of a time-series edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesEdit {
    pub feature: String,
    pub target: f64,
    /// `None` when every hour was set to the target
    pub scale: Option<f64>,
    /// Mean of the stored series after rounding
    pub achieved_average: Option<f64>,
    pub converged: bool,
}

/// Population `[min, max]` of a stream. An inverted range is swapped; a
/// non-finite bound counts as missing statistics.
fn population_range(population: &PopulationReference, name: &str) -> Result<(f64, f64)> {
    let min = population.get(name, Statistic::Min)?;
    let max = population.get(name, Statistic::Max)?;
    if !min.is_finite() || !max.is_finite() {
        log::warn!("Population range of '{}' is not finite: [{}, {}]", name, min, max);
        return Err(SepsisVisionError::missing_statistics(name));
    }
    if min > max {
        log::warn!("Population range of '{}' is inverted", name);
        return Ok((max, min));
    }
    Ok((min, max))
}

/// Rescale a time-series feature of the counterfactual patient so that its
/// average approaches `target_average`, then round to the stream's
/// precision.
pub fn apply_timeseries_target(
    patient: &mut PatientRecord,
    feature: &str,
    target_average: f64,
    population: &PopulationReference,
    config: &ExplanationConfig,
) -> Result<TimeseriesEdit> {
    let FeatureRef::TimeSeriesAverage { source, name } = FeatureRef::classify(feature) else {
        return Err(SepsisVisionError::invalid_parameter(
            "feature",
            feature,
            "not a time-series stream",
        ));
    };
    if !target_average.is_finite() {
        return Err(SepsisVisionError::invalid_parameter(
            "target_average",
            target_average.to_string(),
            "must be finite",
        ));
    }
    let series = patient
        .series(source, &name)
        .cloned()
        .ok_or_else(|| SepsisVisionError::missing_value(name.clone()))?;
    let (lower, upper) = population_range(population, &name)?;
    if !(lower..=upper).contains(&target_average) {
        log::warn!(
            "Target {} for '{}' lies outside the population range [{}, {}]",
            target_average,
            name,
            lower,
            upper
        );
    }

    let solution = solve_scale_factor(&series, target_average, lower, upper, config)?;
    let precision = source.precision_for(&name);
    let rounded = solution.series.map_present(|v| precision.apply(v));
    patient.set_series(source, &name, rounded)?;

    let edit = TimeseriesEdit {
        feature: name.clone(),
        target: target_average,
        scale: solution.scale,
        achieved_average: patient.series_average(source, &name),
        converged: solution.converged,
    };
    log::debug!(
        "Edited '{}' over {} hours: target {}, achieved {:?}",
        name,
        OBSERVATION_HOURS,
        target_average,
        edit.achieved_average
    );
    Ok(edit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SeriesSource;
    use crate::population::FeatureStatistics;
    use approx::assert_relative_eq;

    fn population() -> PopulationReference {
        let mut population = PopulationReference::new();
        population.insert("heartrate", FeatureStatistics::with_range(30.0, 180.0));
        population.insert("tempc", FeatureStatistics::with_range(34.0, 42.0));
        population.insert("norepinephrine_dose", FeatureStatistics::with_range(0.0, 2.0));
        population
    }

    fn ramp(start: f64, step: f64) -> HourlySeries {
        let values: Vec<Option<f64>> = (0..OBSERVATION_HOURS)
            .map(|h| Some(start + step * h as f64))
            .collect();
        HourlySeries::from_slice(&values).unwrap()
    }

    #[test]
    fn test_solver_hits_target_with_clipping() {
        let config = ExplanationConfig::default();
        let series = ramp(60.0, 5.0);
        let solution = solve_scale_factor(&series, 150.0, 30.0, 180.0, &config).unwrap();
        assert!(solution.converged);
        assert_relative_eq!(solution.series.mean().unwrap(), 150.0, epsilon = 1e-3);
        assert!(solution.series.present().all(|v| v <= 180.0));
    }

    #[test]
    fn test_solver_keeps_missing_hours() {
        let config = ExplanationConfig::default();
        let mut series = HourlySeries::constant(80.0);
        series.set(2, None).unwrap();
        let solution = solve_scale_factor(&series, 100.0, 30.0, 180.0, &config).unwrap();
        assert_eq!(solution.series.get(2), None);
        assert_relative_eq!(solution.series.mean().unwrap(), 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_zero_series_uses_uniform_fill() {
        let config = ExplanationConfig::default();
        let solution = solve_scale_factor(&HourlySeries::constant(0.0), 0.3, 0.0, 2.0, &config).unwrap();
        assert_eq!(solution.scale, None);
        assert_eq!(solution.series, HourlySeries::constant(0.3));

        let solution = solve_scale_factor(&HourlySeries::missing(), 0.3, 0.0, 2.0, &config).unwrap();
        assert_eq!(solution.series.present_count(), OBSERVATION_HOURS);
    }

    #[test]
    fn test_apply_target_rounds_by_stream() {
        let config = ExplanationConfig::default();
        let population = population();
        let mut patient = PatientRecord::new();
        patient.set_series(SeriesSource::Vitals, "tempc", ramp(36.0, 0.05)).unwrap();
        patient.set_series(SeriesSource::Vitals, "heartrate", ramp(70.0, 1.0)).unwrap();

        let edit = apply_timeseries_target(&mut patient, "tempc", 38.5, &population, &config).unwrap();
        assert!(edit.converged);
        let temps = patient.series(SeriesSource::Vitals, "tempc").unwrap();
        assert!(temps.present().all(|v| (v * 10.0 - (v * 10.0).round()).abs() < 1e-9));
        assert_relative_eq!(edit.achieved_average.unwrap(), 38.5, epsilon = 0.05);

        apply_timeseries_target(&mut patient, "heartrate", 95.0, &population, &config).unwrap();
        let rates = patient.series(SeriesSource::Vitals, "heartrate").unwrap();
        assert!(rates.present().all(|v| v.fract() == 0.0));

        apply_timeseries_target(&mut patient, "norepinephrine_dose", 0.12, &population, &config).unwrap();
        assert_eq!(
            patient.series(SeriesSource::Vasopressor, "norepinephrine_dose").unwrap(),
            &HourlySeries::constant(0.12)
        );
    }

    #[test]
    fn test_inverted_population_range_is_swapped() {
        let config = ExplanationConfig::default();
        let mut population = PopulationReference::new();
        population.insert("heartrate", FeatureStatistics::with_range(180.0, 30.0));
        let mut patient = PatientRecord::new();
        patient.set_series(SeriesSource::Vitals, "heartrate", ramp(70.0, 1.0)).unwrap();

        let edit = apply_timeseries_target(&mut patient, "heartrate", 100.0, &population, &config).unwrap();
        assert!(edit.converged);
        assert_relative_eq!(edit.achieved_average.unwrap(), 100.0, epsilon = 0.5);
        let rates = patient.series(SeriesSource::Vitals, "heartrate").unwrap();
        assert!(rates.present().all(|v| (30.0..=180.0).contains(&v)));
    }

    #[test]
    fn test_non_finite_population_range_is_recoverable() {
        let config = ExplanationConfig::default();
        let mut population = PopulationReference::new();
        population.insert("heartrate", FeatureStatistics::with_range(f64::NAN, 180.0));
        let mut patient = PatientRecord::new();
        patient.set_series(SeriesSource::Vitals, "heartrate", ramp(70.0, 1.0)).unwrap();

        let err = apply_timeseries_target(&mut patient, "heartrate", 100.0, &population, &config).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(patient.series(SeriesSource::Vitals, "heartrate"), Some(&ramp(70.0, 1.0)));
    }

    #[test]
    fn test_solver_rejects_bad_bounds() {
        let config = ExplanationConfig::default();
        let series = ramp(60.0, 5.0);
        assert!(solve_scale_factor(&series, 100.0, 180.0, 30.0, &config).is_err());
        assert!(solve_scale_factor(&series, 100.0, f64::NAN, 180.0, &config).is_err());
        assert!(solve_scale_factor(&series, 100.0, 30.0, f64::INFINITY, &config).is_err());
    }

    #[test]
    fn test_edit_errors() {
        let config = ExplanationConfig::default();
        let mut patient = PatientRecord::new();
        assert!(apply_timeseries_target(&mut patient, "sofa", 3.0, &population(), &config).is_err());
        let err = apply_timeseries_target(&mut patient, "sysbp", 120.0, &population(), &config).unwrap_err();
        assert!(err.is_recoverable());
        assert!(apply_scalar_edit(&mut patient, "lactate_max", Some(1.0)).is_err());
    }

    #[test]
    fn test_scalar_and_one_hot_edits() {
        let mut patient = PatientRecord::new();
        apply_scalar_edit(&mut patient, "diagnosis_Renal", Some(1.0)).unwrap();
        apply_scalar_edit(&mut patient, "vent", Some(0.0)).unwrap();
        set_ethnicity(&mut patient, Ethnicity::Hispanic).unwrap();
        set_gender(&mut patient, Gender::Female).unwrap();
        apply_lab_edit(&mut patient, "lactate", LabStat::Max, Some(5.5)).unwrap();
        apply_lab_edit(&mut patient, "lactate", LabStat::Min, Some(1.5)).unwrap();

        assert_eq!(patient.feature_value("diagnosis_Renal"), Some(1.0));
        assert_eq!(patient.feature_value("race_white"), Some(0.0));
        assert_eq!(patient.ethnicity(), Some(Ethnicity::Hispanic));
        assert_eq!(patient.gender(), Some(Gender::Female));
        assert_eq!(patient.feature_value("gender_M"), Some(0.0));
        assert_eq!(patient.feature_value("lactate_max"), Some(5.5));
        assert_eq!(patient.feature_value("lactate_min"), Some(1.5));
    }
}
