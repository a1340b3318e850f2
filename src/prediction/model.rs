//! Two-input risk model seam.

use crate::core::constants::OBSERVATION_HOURS;
use crate::core::error::{Result, SepsisVisionError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;

/// A trained binary classifier over a static vector and an
/// (hours x features) time-series tensor, both already scaled.
///
/// Implementations are shared read-only across sessions.
pub trait RiskModel: Send + Sync + Debug {
    /// Length of the static input vector
    fn static_dim(&self) -> usize;

    /// Number of time-series features (tensor columns)
    fn timeseries_dim(&self) -> usize;

    /// Probability of the positive class
    fn predict_proba(
        &self,
        static_input: ArrayView1<'_, f64>,
        timeseries: ArrayView2<'_, f64>,
    ) -> Result<f64>;

    /// Gradient of the predicted probability with respect to both inputs
    fn gradients(
        &self,
        static_input: ArrayView1<'_, f64>,
        timeseries: ArrayView2<'_, f64>,
    ) -> Result<(Array1<f64>, Array2<f64>)>;

    /// Check input shapes against the model dimensions
    fn check_inputs(
        &self,
        static_input: ArrayView1<'_, f64>,
        timeseries: ArrayView2<'_, f64>,
    ) -> Result<()> {
        if static_input.len() != self.static_dim() {
            return Err(SepsisVisionError::dimension_mismatch(
                format!("{} static inputs", self.static_dim()),
                static_input.len().to_string(),
            ));
        }
        let expected = (OBSERVATION_HOURS, self.timeseries_dim());
        if timeseries.dim() != expected {
            return Err(SepsisVisionError::dimension_mismatch(
                format!("time-series tensor {:?}", expected),
                format!("{:?}", timeseries.dim()),
            ));
        }
        Ok(())
    }
}

/// Logistic model over both inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRiskModel {
    static_weights: Array1<f64>,
    timeseries_weights: Array2<f64>,
    bias: f64,
}

impl LogisticRiskModel {
    /// Create a model; time-series weights must span the observation window
    pub fn new(static_weights: Array1<f64>, timeseries_weights: Array2<f64>, bias: f64) -> Result<Self> {
        if timeseries_weights.nrows() != OBSERVATION_HOURS {
            return Err(SepsisVisionError::dimension_mismatch(
                format!("{} weight rows", OBSERVATION_HOURS),
                timeseries_weights.nrows().to_string(),
            ));
        }
        if !bias.is_finite()
            || static_weights.iter().chain(timeseries_weights.iter()).any(|w| !w.is_finite())
        {
            return Err(SepsisVisionError::invalid_parameter(
                "weights",
                "non-finite",
                "model weights must be finite",
            ));
        }
        Ok(LogisticRiskModel {
            static_weights,
            timeseries_weights,
            bias,
        })
    }

    /// Load weights from JSON
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SepsisVisionError::data_loading(format!("Failed to read model {}: {}", path.display(), e))
        })?;
        let raw: LogisticRiskModel = serde_json::from_str(&content)?;
        let model = Self::new(raw.static_weights, raw.timeseries_weights, raw.bias)?;
        log::info!(
            "Loaded logistic risk model ({} static, {} time-series features) from {}",
            model.static_dim(),
            model.timeseries_dim(),
            path.display()
        );
        Ok(model)
    }

    fn logit(&self, static_input: ArrayView1<'_, f64>, timeseries: ArrayView2<'_, f64>) -> f64 {
        self.bias
            + self.static_weights.dot(&static_input)
            + (&self.timeseries_weights * &timeseries).sum()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl RiskModel for LogisticRiskModel {
    fn static_dim(&self) -> usize {
        self.static_weights.len()
    }

    fn timeseries_dim(&self) -> usize {
        self.timeseries_weights.ncols()
    }

    fn predict_proba(
        &self,
        static_input: ArrayView1<'_, f64>,
        timeseries: ArrayView2<'_, f64>,
    ) -> Result<f64> {
        self.check_inputs(static_input, timeseries)?;
        Ok(sigmoid(self.logit(static_input, timeseries)))
    }

    fn gradients(
        &self,
        static_input: ArrayView1<'_, f64>,
        timeseries: ArrayView2<'_, f64>,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        self.check_inputs(static_input, timeseries)?;
        let p = sigmoid(self.logit(static_input, timeseries));
        let slope = p * (1.0 - p);
        Ok((&self.static_weights * slope, &self.timeseries_weights * slope))
    }
}
