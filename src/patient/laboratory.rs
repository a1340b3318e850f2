//! Laboratory summary statistics.

use crate::core::types::LabStat;
use serde::{Deserialize, Serialize};

/// Summary of one laboratory test over the observation window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LabSummary {
    pub count: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    /// Absent with fewer than two observations
    pub slope: Option<f64>,
}

impl LabSummary {
    /// Read one statistic
    pub fn get(&self, stat: LabStat) -> Option<f64> {
        match stat {
            LabStat::Count => self.count,
            LabStat::Mean => self.mean,
            LabStat::Max => self.max,
            LabStat::Min => self.min,
            LabStat::Slope => self.slope,
        }
    }

    /// Overwrite one statistic
    pub fn set(&mut self, stat: LabStat, value: Option<f64>) {
        let slot = match stat {
            LabStat::Count => &mut self.count,
            LabStat::Mean => &mut self.mean,
            LabStat::Max => &mut self.max,
            LabStat::Min => &mut self.min,
            LabStat::Slope => &mut self.slope,
        };
        *slot = value;
    }
}
