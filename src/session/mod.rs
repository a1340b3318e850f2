//! Per-participant study session.
//!
//! A [`StudySession`] owns the primary patient, its counterfactual twin and
//! the last explanation. Shared artifacts are borrowed from
//! [`SharedResources`]; nothing in a session is visible to another one.

pub mod resources;

pub use resources::{load_background_csv, shared, shared_or_init, ResourcePaths, SharedResources};

use crate::core::error::Result;
use crate::core::types::LabStat;
use crate::counterfactual::{self, TimeseriesEdit};
use crate::explanation::{
    aggregate_groups, aggregate_timeseries, build_detail_table, truncate_rows, ClinicalInterpretation,
    GroupContributions, RiskContributionRow, TimeseriesContributions,
};
use crate::patient::{Ethnicity, Gender, PatientRecord, PatientSource};
use crate::prediction::AttributionResult;
use serde::Serialize;

/// Everything derived from one attribution of the primary patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub attribution: AttributionResult,
    pub timeseries: TimeseriesContributions,
    pub groups: GroupContributions,
    /// Ranked rows without truncation
    pub rows: Vec<RiskContributionRow>,
    pub interpretation: ClinicalInterpretation,
}

impl Explanation {
    /// Rows truncated to `top_n` plus the "Others" row
    pub fn detail_table(&self, top_n: usize, others_cutoff: f64) -> Vec<RiskContributionRow> {
        truncate_rows(self.rows.clone(), top_n, others_cutoff)
    }
}

/// State of one participant looking at one patient.
#[derive(Debug)]
pub struct StudySession<'r> {
    resources: &'r SharedResources,
    primary: PatientRecord,
    counterfactual: PatientRecord,
    patient_risk: f64,
    scenario_risk: Option<f64>,
    explanation: Option<Explanation>,
}

impl<'r> StudySession<'r> {
    /// Start a session for a patient: build its tensors, score it and take
    /// the counterfactual copy
    pub fn new(resources: &'r SharedResources, mut patient: PatientRecord) -> Result<Self> {
        let tensors =
            counterfactual::rebuild_tensors(&patient, resources.catalog(), resources.predictor())?;
        patient.set_tensors(tensors);
        let patient_risk = resources.predictor().predict(&patient)?;
        log::info!("Patient risk: {:.4}", patient_risk);

        Ok(StudySession {
            resources,
            counterfactual: patient.clone(),
            primary: patient,
            patient_risk,
            scenario_risk: None,
            explanation: None,
        })
    }

    /// Start a session for the patient at `index` of a study arm
    pub fn load(
        resources: &'r SharedResources,
        source: &dyn PatientSource,
        arm: &str,
        index: usize,
    ) -> Result<Self> {
        let patient = source.load_patient(arm, index)?;
        log::debug!("Loaded patient {} of arm '{}'", index, arm);
        Self::new(resources, patient)
    }

    pub fn primary(&self) -> &PatientRecord {
        &self.primary
    }

    pub fn counterfactual(&self) -> &PatientRecord {
        &self.counterfactual
    }

    /// Risk of the primary patient
    pub fn patient_risk(&self) -> f64 {
        self.patient_risk
    }

    /// Risk of the counterfactual from the last [`Self::predict_scenario`]
    pub fn scenario_risk(&self) -> Option<f64> {
        self.scenario_risk
    }

    /// The last explanation, if [`Self::explain`] has run
    pub fn explanation(&self) -> Option<&Explanation> {
        self.explanation.as_ref()
    }

    /// Attribute the primary patient's risk and build every derived view.
    /// The result is computed once per session.
    pub fn explain(&mut self) -> Result<&Explanation> {
        let explanation = match self.explanation.take() {
            Some(explanation) => explanation,
            None => self.build_explanation()?,
        };
        Ok(self.explanation.insert(explanation))
    }

    fn build_explanation(&self) -> Result<Explanation> {
        let resources = self.resources;
        let catalog = resources.catalog();
        let attribution = resources.predictor().generate_attribution(&self.primary)?;
        let timeseries = aggregate_timeseries(
            attribution.timeseries_shap_raw.view(),
            catalog.timeseries_features(),
        )?;
        let groups = aggregate_groups(attribution.static_shap.view(), &timeseries, catalog)?;
        let rows = build_detail_table(
            attribution.static_shap.view(),
            &timeseries,
            &self.primary,
            resources.population(),
            catalog,
            resources.config(),
            false,
        )?;
        let interpretation = ClinicalInterpretation::new(self.patient_risk, &groups, &rows);
        log::debug!(
            "Explanation built: {} rows, evidence {:+} / {:+}",
            rows.len(),
            groups.risk_increasing(),
            groups.risk_decreasing()
        );

        Ok(Explanation {
            attribution,
            timeseries,
            groups,
            rows,
            interpretation,
        })
    }

    // Counterfactual edits

    pub fn edit_scalar(&mut self, feature: &str, value: Option<f64>) -> Result<()> {
        counterfactual::apply_scalar_edit(&mut self.counterfactual, feature, value)
    }

    pub fn edit_ethnicity(&mut self, ethnicity: Ethnicity) -> Result<()> {
        counterfactual::set_ethnicity(&mut self.counterfactual, ethnicity)
    }

    pub fn edit_gender(&mut self, gender: Gender) -> Result<()> {
        counterfactual::set_gender(&mut self.counterfactual, gender)
    }

    pub fn edit_lab(&mut self, test: &str, stat: LabStat, value: Option<f64>) -> Result<()> {
        counterfactual::apply_lab_edit(&mut self.counterfactual, test, stat, value)
    }

    pub fn edit_timeseries_average(&mut self, feature: &str, target_average: f64) -> Result<TimeseriesEdit> {
        counterfactual::apply_timeseries_target(
            &mut self.counterfactual,
            feature,
            target_average,
            self.resources.population(),
            self.resources.config(),
        )
    }

    /// Score the counterfactual. The primary patient and its explanation
    /// are untouched.
    pub fn predict_scenario(&mut self) -> Result<f64> {
        let risk = counterfactual::predict_scenario(
            &mut self.counterfactual,
            self.resources.catalog(),
            self.resources.predictor(),
        )?;
        self.scenario_risk = Some(risk);
        Ok(risk)
    }

    /// Discard every counterfactual edit
    pub fn reset_counterfactual(&mut self) {
        self.counterfactual = self.primary.clone();
        self.scenario_risk = None;
    }
}
