//! Fitted feature scalers and their authoritative column orders.
//!
//! Each scaler remembers the column order it was fit on. That order is the
//! input contract of the model: rows are reindexed to it before scaling,
//! and it is checked against the feature catalog when the predictor is
//! built so that a catalog or artifact mismatch fails at startup.

use crate::core::constants::OBSERVATION_HOURS;
use crate::core::error::{Result, SepsisVisionError};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Name of one hourly column in a flattened time-series row
pub fn hourly_column(feature: &str, hour: usize) -> String {
    format!("{}_{}", feature, hour)
}

/// Unscaled values keyed by column name. Absent and `None` entries are
/// both treated as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    values: HashMap<String, Option<f64>>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Option<f64>) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Option<f64>)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (S, Option<f64>)>>(iter: I) -> Self {
        FeatureRow {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Column order a scaler was fit on.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedColumnOrder {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ExpectedColumnOrder {
    /// Create an order; duplicate columns are a contract violation
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if positions.insert(column.clone(), i).is_some() {
                return Err(SepsisVisionError::contract(format!(
                    "scaler column '{}' appears more than once",
                    column
                )));
            }
        }
        Ok(ExpectedColumnOrder { columns, positions })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// Values in this order. Columns absent from the row become NaN and are
    /// reported as degraded coverage.
    pub fn reindex(&self, row: &FeatureRow) -> Array1<f64> {
        let absent: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| !row.contains(c))
            .map(String::as_str)
            .collect();
        if !absent.is_empty() {
            log::warn!(
                "{} expected columns are absent after reindexing and will be filled as missing (first: '{}')",
                absent.len(),
                absent[0]
            );
        }
        self.columns
            .iter()
            .map(|c| row.get(c).unwrap_or(f64::NAN))
            .collect()
    }

    /// For each column in this order, its index in `declared`.
    ///
    /// Fails when the two name sets differ.
    pub fn permutation_from(&self, declared: &[String]) -> Result<Vec<usize>> {
        let declared_positions: HashMap<&str, usize> = declared
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        if let Some(extra) = declared.iter().find(|name| self.position(name).is_none()) {
            return Err(SepsisVisionError::contract(format!(
                "feature '{}' is declared but the fitted scaler has no such column",
                extra
            )));
        }
        if declared_positions.len() != self.columns.len() {
            return Err(SepsisVisionError::dimension_mismatch(
                format!("{} scaler columns", self.columns.len()),
                format!("{} declared features", declared.len()),
            ));
        }
        self.columns
            .iter()
            .map(|column| {
                declared_positions.get(column.as_str()).copied().ok_or_else(|| {
                    SepsisVisionError::contract(format!(
                        "fitted scaler expects column '{}' that is not declared",
                        column
                    ))
                })
            })
            .collect()
    }

    /// Stream names of a flattened time-series order.
    ///
    /// The columns must be feature-major: every stream contributes
    /// `<stream>_0` to `<stream>_23` consecutively.
    pub fn feature_major_streams(&self) -> Result<Vec<String>> {
        if self.columns.len() % OBSERVATION_HOURS != 0 {
            return Err(SepsisVisionError::dimension_mismatch(
                format!("a multiple of {} columns", OBSERVATION_HOURS),
                self.columns.len().to_string(),
            ));
        }
        self.columns
            .chunks(OBSERVATION_HOURS)
            .map(|block| {
                let stream = block[0].strip_suffix("_0").ok_or_else(|| {
                    SepsisVisionError::contract(format!(
                        "time-series column '{}' does not start an hourly block",
                        block[0]
                    ))
                })?;
                for (hour, column) in block.iter().enumerate() {
                    if *column != hourly_column(stream, hour) {
                        return Err(SepsisVisionError::contract(format!(
                            "time-series scaler is not feature-major: expected '{}', found '{}'",
                            hourly_column(stream, hour),
                            column
                        )));
                    }
                }
                Ok(stream.to_string())
            })
            .collect()
    }
}

/// Per-column transform parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScalerTransform {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl ScalerTransform {
    fn parameters(&self) -> (&[f64], &[f64]) {
        match self {
            ScalerTransform::Standard { mean, scale } => (mean, scale),
            ScalerTransform::MinMax { min, scale } => (min, scale),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ScalerFile {
    feature_names_in: Vec<String>,
    transform: ScalerTransform,
}

/// A fitted scaler with its column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedScaler {
    order: ExpectedColumnOrder,
    transform: ScalerTransform,
}

impl FittedScaler {
    /// Create a scaler, checking parameter lengths and scales
    pub fn new(columns: Vec<String>, transform: ScalerTransform) -> Result<Self> {
        let order = ExpectedColumnOrder::new(columns)?;
        let (offset, scale) = transform.parameters();
        if offset.len() != order.len() || scale.len() != order.len() {
            return Err(SepsisVisionError::dimension_mismatch(
                format!("{} scaler parameters", order.len()),
                format!("{} offsets and {} scales", offset.len(), scale.len()),
            ));
        }
        if let Some(i) = scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
            return Err(SepsisVisionError::invalid_parameter(
                "scale",
                scale[i].to_string(),
                format!("column '{}' needs a finite non-zero scale", order.columns()[i]),
            ));
        }
        Ok(FittedScaler { order, transform })
    }

    /// Standard scaler from means and standard deviations
    pub fn standard(columns: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        Self::new(columns, ScalerTransform::Standard { mean, scale })
    }

    /// Load a scaler from its JSON export
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SepsisVisionError::data_loading(format!(
                "Failed to read scaler {}: {}",
                path.display(),
                e
            ))
        })?;
        let scaler = Self::from_json_str(&content)?;
        log::info!(
            "Loaded scaler with {} columns from {}",
            scaler.order.len(),
            path.display()
        );
        Ok(scaler)
    }

    /// Parse a scaler from JSON
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: ScalerFile = serde_json::from_str(content)?;
        Self::new(file.feature_names_in, file.transform)
    }

    /// Serialize to JSON
    pub fn to_json_string(&self) -> Result<String> {
        let file = ScalerFile {
            feature_names_in: self.order.columns().to_vec(),
            transform: self.transform.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Authoritative column order
    pub fn expected_columns(&self) -> &ExpectedColumnOrder {
        &self.order
    }

    /// Scale a row already in column order. NaN inputs stay NaN.
    pub fn transform(&self, row: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        if row.len() != self.order.len() {
            return Err(SepsisVisionError::dimension_mismatch(
                format!("{} columns", self.order.len()),
                row.len().to_string(),
            ));
        }
        let scaled = match &self.transform {
            ScalerTransform::Standard { mean, scale } => row
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (m, s))| (x - m) / s)
                .collect(),
            ScalerTransform::MinMax { min, scale } => row
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(x, (m, s))| x * s + m)
                .collect(),
        };
        Ok(scaled)
    }

    /// Reindex a named row to the fitted order, then scale it
    pub fn transform_row(&self, row: &FeatureRow) -> Result<Array1<f64>> {
        self.transform(self.order.reindex(row).view())
    }
}
