//! End-to-end study session: load, explain, edit, re-score, reset.

mod common;

use approx::assert_relative_eq;
use sepsis_vision::patient::WidePatientTable;
use sepsis_vision::session::{shared, shared_or_init};
use sepsis_vision::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn explanation_is_consistent_with_prediction() {
    let _ = sepsis_vision::init();
    let resources = common::resources();
    let mut session = StudySession::new(&resources, common::patient()).unwrap();
    let risk = session.patient_risk();
    assert!((0.0..=1.0).contains(&risk));
    assert_eq!(session.counterfactual(), session.primary());

    let explanation = session.explain().unwrap().clone();
    assert_eq!(explanation.attribution.static_shap.len(), 5);
    assert_eq!(explanation.attribution.timeseries_shap_raw.dim(), (OBSERVATION_HOURS, 3));
    assert_eq!(explanation.timeseries.len(), 3);

    let total: f64 = explanation.rows.iter().map(|r| r.contribution).sum();
    let positives: f64 = explanation.rows.iter().map(|r| r.contribution.max(0.0)).sum();
    assert!(explanation.rows.iter().all(|r| !r.is_others()));
    assert!(positives >= total);
    assert_eq!(explanation.interpretation.risk_level, RiskLevel::from_probability(risk));
    assert!(explanation.interpretation.text().contains("predicted mortality risk"));

    let short = explanation.detail_table(5, resources.config().others_cutoff);
    assert!(short.len() <= 6);
    if explanation.rows.len() > 5 {
        let folded: f64 = explanation.rows[5..].iter().map(|r| r.contribution).sum();
        assert_relative_eq!(short[5].contribution, folded, epsilon = 1e-9);
    }

    // Explaining again returns the stored result
    assert_eq!(session.explain().unwrap(), &explanation);
}

#[test]
fn counterfactual_edits_leave_primary_untouched() {
    let resources = common::resources();
    let mut session = StudySession::new(&resources, common::patient()).unwrap();
    let explanation = session.explain().unwrap().clone();
    let primary = session.primary().clone();
    let risk = session.patient_risk();

    session.edit_timeseries_average("heartrate", 60.0).unwrap();
    session.edit_scalar("vent", Some(0.0)).unwrap();
    session.edit_lab("lactate", LabStat::Max, Some(1.1)).unwrap();
    session.edit_ethnicity(Ethnicity::Black).unwrap();
    session.edit_gender(Gender::Male).unwrap();
    let scenario = session.predict_scenario().unwrap();

    assert!(scenario < risk);
    assert_eq!(session.scenario_risk(), Some(scenario));
    assert_eq!(session.primary(), &primary);
    assert_eq!(session.patient_risk(), risk);
    assert_eq!(session.explanation(), Some(&explanation));
    assert_eq!(session.counterfactual().ethnicity(), Some(Ethnicity::Black));
    assert_eq!(session.counterfactual().feature_value("lactate_max"), Some(1.1));

    session.reset_counterfactual();
    assert_eq!(session.counterfactual(), session.primary());
    assert_eq!(session.scenario_risk(), None);
    let restored = session.predict_scenario().unwrap();
    assert_relative_eq!(restored, risk, epsilon = 1e-12);
}

#[test]
fn invalid_edits_are_rejected() {
    let resources = common::resources();
    let mut session = StudySession::new(&resources, common::patient()).unwrap();

    assert!(session.edit_scalar("heartrate", Some(1.0)).is_err());
    assert!(session.edit_timeseries_average("sofa", 3.0).is_err());
    let err = session.edit_timeseries_average("sysbp", 120.0).unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(session.counterfactual(), session.primary());
}

#[test]
fn session_from_csv_source() {
    let mut header = vec!["age", "sofa", "vent", "diagnosis_Renal", "lactate_count", "lactate_max"]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    header.extend(common::timeseries_columns(&["heartrate"]));
    let mut row = vec!["70.9", "9", "1", "1", "3", "4.216"]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    row.extend((0..OBSERVATION_HOURS).map(|h| (80 + h).to_string()));

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", header.join(",")).unwrap();
    writeln!(file, "{}", row.join(",")).unwrap();

    let table = WidePatientTable::load_csv(file.path()).unwrap();
    let source = CsvPatientSource::default().with_arm("xai", table);
    assert_eq!(source.patient_count("xai").unwrap(), 1);

    let resources = common::resources();
    let session = StudySession::load(&resources, &source, "xai", 0).unwrap();
    assert_eq!(session.primary().feature_value("age"), Some(70.0));
    assert_eq!(session.primary().feature_value("lactate_max"), Some(4.22));
    assert_eq!(session.primary().feature_value("heartrate"), Some(91.0));
    assert!(session.primary().tensors().is_some());

    assert!(StudySession::load(&resources, &source, "xai", 1).is_err());
    assert!(StudySession::load(&resources, &source, "control", 0).is_err());
}

#[test]
fn global_importance_over_sessions() {
    let resources = common::resources();
    let mut attributions = Vec::new();
    for sofa in [4.0, 12.0] {
        let mut patient = common::patient();
        patient.set_static(StaticGroup::Scores, "sofa", Some(sofa)).unwrap();
        let mut session = StudySession::new(&resources, patient).unwrap();
        attributions.push(session.explain().unwrap().attribution.clone());
    }

    let global = GlobalImportance::from_attributions(&attributions, resources.catalog()).unwrap();
    assert_eq!(global.ranking().len(), 8);
    for pair in global.ranking().windows(2) {
        assert!(pair[0].mean_abs_contribution >= pair[1].mean_abs_contribution);
    }
    let resources = resources.with_global_importance(global);
    assert!(resources.global_importance().is_some());
}

#[test]
fn shared_resources_are_built_once() {
    let first = shared_or_init(|| Ok(common::resources())).unwrap();
    let second = shared_or_init(|| Err(SepsisVisionError::config("must not run"))).unwrap();
    assert!(std::ptr::eq(first, second));
    assert!(shared().is_some());

    let session = StudySession::new(first, common::patient()).unwrap();
    assert!((0.0..=1.0).contains(&session.patient_risk()));
}
