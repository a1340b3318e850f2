//! Gradient-based feature attribution.
//!
//! Implements expected gradients: the attribution of input `x` against a
//! background set `B` is the expectation, over a background sample `b` and
//! an interpolation point `alpha` in `[0, 1]`, of
//! `(x - b) * grad f(b + alpha * (x - b))`. Attributions sum to the
//! difference between `f(x)` and the mean background prediction, up to
//! sampling error.

use super::model::RiskModel;
use crate::config::ExplanationConfig;
use crate::core::error::{Result, SepsisVisionError};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-feature attributions for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    /// One value per static feature
    pub static_shap: Array1<f64>,
    /// (hours x time-series features)
    pub timeseries_shap_raw: Array2<f64>,
}

impl AttributionResult {
    /// Sum of every static and time-series attribution
    pub fn total(&self) -> f64 {
        self.static_shap.sum() + self.timeseries_shap_raw.sum()
    }
}

/// Pre-scaled population sample used as the attribution baseline.
#[derive(Debug, Clone)]
pub struct Background {
    static_samples: Array2<f64>,
    timeseries_samples: Array3<f64>,
}

impl Background {
    /// Create a background from `n` static rows and `n` time-series tensors
    pub fn new(static_samples: Array2<f64>, timeseries_samples: Array3<f64>) -> Result<Self> {
        if static_samples.nrows() == 0 {
            return Err(SepsisVisionError::invalid_parameter(
                "background",
                "0 samples",
                "at least one background sample is required",
            ));
        }
        if static_samples.nrows() != timeseries_samples.len_of(Axis(0)) {
            return Err(SepsisVisionError::dimension_mismatch(
                format!("{} time-series samples", static_samples.nrows()),
                timeseries_samples.len_of(Axis(0)).to_string(),
            ));
        }
        Ok(Background {
            static_samples,
            timeseries_samples,
        })
    }

    pub fn len(&self) -> usize {
        self.static_samples.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn static_dim(&self) -> usize {
        self.static_samples.ncols()
    }

    /// (hours, features) of each time-series sample
    pub fn timeseries_shape(&self) -> (usize, usize) {
        let (_, hours, features) = self.timeseries_samples.dim();
        (hours, features)
    }

    pub fn static_sample(&self, index: usize) -> ArrayView1<'_, f64> {
        self.static_samples.row(index)
    }

    pub fn timeseries_sample(&self, index: usize) -> ArrayView2<'_, f64> {
        self.timeseries_samples.index_axis(Axis(0), index)
    }

    /// Count finite values whose magnitude exceeds `guard`. Scaled data
    /// rarely leaves a few units around zero, so a non-zero count suggests
    /// the background was not scaled like the patient data.
    pub fn values_beyond(&self, guard: f64) -> usize {
        self.static_samples
            .iter()
            .chain(self.timeseries_samples.iter())
            .filter(|v| v.is_finite() && v.abs() > guard)
            .count()
    }
}

/// Expected-gradients explainer.
#[derive(Debug, Clone)]
pub struct ExpectedGradients {
    samples: usize,
    seed: u64,
    output_scale: f64,
}

impl ExpectedGradients {
    pub fn new(samples: usize, seed: u64, output_scale: f64) -> Self {
        ExpectedGradients {
            samples,
            seed,
            output_scale,
        }
    }

    pub fn from_config(config: &ExplanationConfig) -> Self {
        Self::new(config.background_samples, config.random_seed, config.output_scale)
    }

    /// Attribute one prediction against the background.
    ///
    /// Sampling is seeded, so repeated calls on the same input agree.
    pub fn explain(
        &self,
        model: &dyn RiskModel,
        background: &Background,
        static_input: ArrayView1<'_, f64>,
        timeseries: ArrayView2<'_, f64>,
    ) -> Result<AttributionResult> {
        model.check_inputs(static_input, timeseries)?;
        if background.static_dim() != static_input.len()
            || background.timeseries_shape() != timeseries.dim()
        {
            return Err(SepsisVisionError::dimension_mismatch(
                format!(
                    "background of {} static and {:?} time-series inputs",
                    static_input.len(),
                    timeseries.dim()
                ),
                format!(
                    "{} static and {:?} time-series inputs",
                    background.static_dim(),
                    background.timeseries_shape()
                ),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let draws: Vec<(usize, f64)> = (0..self.samples)
            .map(|_| (rng.gen_range(0..background.len()), rng.gen::<f64>()))
            .collect();

        let terms = draws
            .par_iter()
            .map(|&(index, alpha)| {
                let static_delta = &static_input - &background.static_sample(index);
                let ts_delta = &timeseries - &background.timeseries_sample(index);
                let static_point = &background.static_sample(index) + &(&static_delta * alpha);
                let ts_point = &background.timeseries_sample(index) + &(&ts_delta * alpha);
                let (g_static, g_ts) = model.gradients(static_point.view(), ts_point.view())?;
                Ok((static_delta * g_static, ts_delta * g_ts))
            })
            .collect::<Result<Vec<(Array1<f64>, Array2<f64>)>>>()?;

        let mut static_shap = Array1::zeros(static_input.len());
        let mut timeseries_shap_raw = Array2::zeros(timeseries.dim());
        for (s, t) in &terms {
            static_shap += s;
            timeseries_shap_raw += t;
        }
        let factor = self.output_scale / terms.len().max(1) as f64;
        static_shap *= factor;
        timeseries_shap_raw *= factor;

        log::debug!(
            "Expected gradients over {} draws: total attribution {:.4}",
            terms.len(),
            static_shap.sum() + timeseries_shap_raw.sum()
        );

        Ok(AttributionResult {
            static_shap,
            timeseries_shap_raw,
        })
    }
}
