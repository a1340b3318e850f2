//! Invariants of attribution aggregation and the detail table.

mod common;

use approx::assert_relative_eq;
use ndarray::{Array1, Array2};
use proptest::prelude::*;
use sepsis_vision::catalog::{SeriesCategory, StaticCategory};
use sepsis_vision::explanation::{truncate_rows, RowKind};
use sepsis_vision::*;
use std::collections::HashMap;

fn static_shap() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-15.0..15.0f64, STATIC_LEN)
}

fn timeseries_shap() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.5..1.5f64, OBSERVATION_HOURS * 3)
}

const STATIC_LEN: usize = 5;

fn row(parameter: &str, contribution: f64) -> RiskContributionRow {
    RiskContributionRow {
        parameter: parameter.to_string(),
        kind: RowKind::TimeSeries,
        raw_value: None,
        formatted_value: String::new(),
        contribution,
        strength: None,
        description: String::new(),
        comparison: String::new(),
    }
}

proptest! {
    /// Category sums cover every feature once: each category loses less
    /// than one point to truncation.
    #[test]
    fn categories_partition_all_features(statics in static_shap(), hourly in timeseries_shap()) {
        let catalog = common::catalog();
        let statics = Array1::from(statics);
        let hourly = Array2::from_shape_vec((OBSERVATION_HOURS, 3), hourly).unwrap();
        let series = aggregate_timeseries(hourly.view(), catalog.timeseries_features()).unwrap();
        let groups = aggregate_groups(statics.view(), &series, &catalog).unwrap();

        let category_count = catalog.static_categories().len() + catalog.timeseries_categories().len();
        prop_assert_eq!(groups.categories().len(), category_count);

        let static_total: f64 = statics.sum();
        let static_categories: i64 = catalog
            .static_categories()
            .iter()
            .map(|c| groups.get(&c.name).unwrap())
            .sum();
        prop_assert!((static_categories as f64 - static_total).abs() < catalog.static_categories().len() as f64);

        let total = static_total + series.values().sum::<f64>();
        let all: i64 = groups.categories().iter().map(|(_, v)| v).sum();
        prop_assert!((all as f64 - total).abs() < category_count as f64);
    }

    /// Evidence sums split the signed total into two truncated halves
    #[test]
    fn evidence_sums_match_total(statics in static_shap(), hourly in timeseries_shap()) {
        let catalog = common::catalog();
        let statics = Array1::from(statics);
        let hourly = Array2::from_shape_vec((OBSERVATION_HOURS, 3), hourly).unwrap();
        let series = aggregate_timeseries(hourly.view(), catalog.timeseries_features()).unwrap();
        let groups = aggregate_groups(statics.view(), &series, &catalog).unwrap();

        let total = statics.sum() + series.values().sum::<f64>();
        let evidence = groups.get(RISK_INCREASING_EVIDENCE).unwrap() + groups.get(RISK_DECREASING_EVIDENCE).unwrap();
        prop_assert!(groups.risk_increasing() >= 0);
        prop_assert!(groups.risk_decreasing() <= 0);
        prop_assert!((evidence as f64 - total).abs() < 2.0);
    }

    /// The "Others" row carries exactly what the kept rows leave out
    #[test]
    fn others_row_preserves_total(mut contributions in prop::collection::vec(-20.0..20.0f64, 10..40)) {
        contributions.sort_by(|a, b| b.abs().total_cmp(&a.abs()));
        let rows: Vec<RiskContributionRow> = contributions
            .iter()
            .enumerate()
            .map(|(i, c)| row(&format!("feature_{}", i), *c))
            .collect();
        let total: f64 = contributions.iter().sum();

        let table = truncate_rows(rows, 9, 2.0);
        prop_assert_eq!(table.len(), 10);
        let kept: f64 = table[..9].iter().map(|r| r.contribution).sum();
        let others = &table[9];
        prop_assert!(others.is_others());
        prop_assert!((others.contribution - (total - kept)).abs() < 1e-9);
        match others.kind {
            RowKind::Others { folded, .. } => prop_assert_eq!(folded, contributions.len() - 9),
            _ => prop_assert!(false, "last row is not the Others row"),
        }
    }

    /// Summing already summed attributions changes nothing
    #[test]
    fn timeseries_aggregation_is_idempotent(hourly in timeseries_shap()) {
        let catalog = common::catalog();
        let hourly = Array2::from_shape_vec((OBSERVATION_HOURS, 3), hourly).unwrap();
        let once = aggregate_timeseries(hourly.view(), catalog.timeseries_features()).unwrap();

        let summed = Array2::from_shape_fn((1, 3), |(_, f)| once[&catalog.timeseries_features()[f]]);
        let twice = aggregate_timeseries(summed.view(), catalog.timeseries_features()).unwrap();
        prop_assert_eq!(once, twice);
    }
}

#[test]
fn four_feature_group_scenario() {
    let catalog = FeatureCatalog::new(
        vec!["age".into(), "weight".into(), "sofa".into(), "sirs".into()],
        vec!["heartrate".into()],
        vec![
            StaticCategory::from_ranges("A", &[0..2]),
            StaticCategory::from_ranges("B", &[2..4]),
        ],
        vec![SeriesCategory::new("Vital Signs", &["heartrate"])],
        HashMap::new(),
    )
    .unwrap();
    let statics = Array1::from(vec![3.0, -1.0, 0.5, -6.0]);
    let series = aggregate_timeseries(
        Array2::zeros((OBSERVATION_HOURS, 1)).view(),
        catalog.timeseries_features(),
    )
    .unwrap();
    let groups = aggregate_groups(statics.view(), &series, &catalog).unwrap();

    assert_eq!(groups.get("A"), Some(2));
    assert_eq!(groups.get("B"), Some(-5));
    assert_eq!(groups.get(RISK_INCREASING_EVIDENCE), Some(3));
    assert_eq!(groups.get(RISK_DECREASING_EVIDENCE), Some(-7));
}

#[test]
fn eleven_row_truncation_scenario() {
    let contributions = [10.0, -9.0, 8.0, -7.0, 6.0, -5.0, 4.0, -3.0, 2.0, 1.5, -1.0];
    let rows: Vec<RiskContributionRow> = contributions
        .iter()
        .enumerate()
        .map(|(i, c)| row(&format!("feature_{}", i), *c))
        .collect();
    let table = truncate_rows(rows, 9, 2.0);

    assert_eq!(table.len(), 10);
    assert_relative_eq!(table[9].contribution, 0.5);
    assert_eq!(table[9].display_name(), OTHERS_ROW);
}

#[test]
fn detail_table_for_fixture_patient() {
    let catalog = common::catalog();
    let population = common::population();
    let config = common::config();
    let patient = common::patient();

    let statics = Array1::from(vec![-0.5, 6.2, 0.01, 3.4, 1.0]);
    let hourly = Array2::from_shape_fn((OBSERVATION_HOURS, 3), |(_, f)| [0.2, -0.1, 0.0][f]);
    let series = aggregate_timeseries(hourly.view(), catalog.timeseries_features()).unwrap();
    let rows = build_detail_table(
        statics.view(),
        &series,
        &patient,
        &population,
        &catalog,
        &config,
        true,
    )
    .unwrap();

    let parameters: Vec<&str> = rows.iter().map(|r| r.parameter.as_str()).collect();
    assert_eq!(
        parameters,
        vec!["sofa", "heartrate", "lactate_max", "tempc", "diagnosis_Renal", "age"]
    );
    for pair in rows.windows(2) {
        assert!(pair[0].contribution.abs() >= pair[1].contribution.abs());
    }
    assert!(rows.iter().all(|r| r.contribution.abs() > config.noise_floor));

    let sofa = &rows[0];
    assert_eq!(sofa.strength, Some(ContributionStrength::Much));
    let heartrate = &rows[1];
    assert_relative_eq!(heartrate.contribution, 4.8, epsilon = 1e-9);
    assert_eq!(heartrate.raw_value, Some(91.0));
    let diagnosis = rows.iter().find(|r| r.parameter == "diagnosis_Renal").unwrap();
    assert!(diagnosis.comparison.contains("Statistics not available"));
}
