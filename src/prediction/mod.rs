//! Risk prediction and attribution.
//!
//! - [`scaler`]: fitted scalers and their [`ExpectedColumnOrder`]
//! - [`model`]: the [`RiskModel`] seam and a logistic implementation
//! - [`shap`]: expected-gradients attribution
//! - [`predictor`]: the [`RiskPredictor`] tying them together

pub mod model;
pub mod predictor;
pub mod scaler;
pub mod shap;

pub use model::{LogisticRiskModel, RiskModel};
pub use predictor::RiskPredictor;
pub use scaler::{hourly_column, ExpectedColumnOrder, FeatureRow, FittedScaler, ScalerTransform};
pub use shap::{AttributionResult, Background, ExpectedGradients};
