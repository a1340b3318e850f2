//! Hourly time-series streams over the observation window.

use crate::core::constants::OBSERVATION_HOURS;
use crate::core::error::{Result, SepsisVisionError};
use serde::{Deserialize, Serialize};

/// One stream of hourly readings; any hour may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    values: [Option<f64>; OBSERVATION_HOURS],
}

impl HourlySeries {
    /// Create a series from a full window of readings
    pub fn new(values: [Option<f64>; OBSERVATION_HOURS]) -> Self {
        HourlySeries { values }
    }

    /// A series with every hour missing
    pub fn missing() -> Self {
        Self::default()
    }

    /// A series with the same value in every hour
    pub fn constant(value: f64) -> Self {
        HourlySeries {
            values: [Some(value); OBSERVATION_HOURS],
        }
    }

    /// Create a series from a slice that must cover the whole window
    pub fn from_slice(values: &[Option<f64>]) -> Result<Self> {
        let values: [Option<f64>; OBSERVATION_HOURS] = values.try_into().map_err(|_| {
            SepsisVisionError::dimension_mismatch(
                format!("{} hourly values", OBSERVATION_HOURS),
                values.len().to_string(),
            )
        })?;
        Ok(HourlySeries { values })
    }

    /// Readings in hour order
    pub fn values(&self) -> &[Option<f64>; OBSERVATION_HOURS] {
        &self.values
    }

    /// Reading at an hour, `None` when missing or out of range
    pub fn get(&self, hour: usize) -> Option<f64> {
        self.values.get(hour).copied().flatten()
    }

    /// Overwrite the reading at an hour
    pub fn set(&mut self, hour: usize, value: Option<f64>) -> Result<()> {
        let slot = self.values.get_mut(hour).ok_or_else(|| {
            SepsisVisionError::invalid_parameter(
                "hour",
                hour.to_string(),
                format!("must be below {}", OBSERVATION_HOURS),
            )
        })?;
        *slot = value;
        Ok(())
    }

    /// Present readings in hour order
    pub fn present(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(|v| *v)
    }

    /// Number of present readings
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Mean over present readings, `None` when every hour is missing
    pub fn mean(&self) -> Option<f64> {
        let count = self.present_count();
        (count > 0).then(|| self.present().sum::<f64>() / count as f64)
    }

    /// Apply a function to every present reading; missing hours stay missing
    pub fn map_present<F: Fn(f64) -> f64>(&self, f: F) -> HourlySeries {
        HourlySeries {
            values: self.values.map(|v| v.map(&f)),
        }
    }
}
