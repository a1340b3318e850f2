//! Explanation configuration and its builder.
//!
//! Holds every threshold used by the aggregation, table and counterfactual
//! code so that the study team can tune them without a rebuild.

use crate::core::constants::*;
use crate::core::error::{Result, SepsisVisionError};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for attribution aggregation, table building and
/// counterfactual solving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationConfig {
    // Table construction
    /// Rows with |contribution| at or below this are dropped
    pub noise_floor: f64,
    /// |contribution| above this reads as "much"
    pub strong_contribution: f64,
    /// |contribution| above this reads as "slightly"
    pub moderate_contribution: f64,
    /// Rows kept before the "Others" row
    pub truncate_top_n: usize,
    /// Folded rows at or above this |contribution| are counted
    pub others_cutoff: f64,

    // Model inputs
    /// Fill value for missing model inputs after scaling
    pub missing_sentinel: f64,

    // Attribution
    /// Multiplier applied to raw attributions (probability -> percentage points)
    pub output_scale: f64,
    /// Interpolation samples drawn for expected gradients
    pub background_samples: usize,
    /// Seed for background sampling
    pub random_seed: u64,
    /// Background values beyond this magnitude trigger a scaling warning
    pub background_scale_guard: f64,

    // Counterfactual solver
    /// Accepted distance between achieved and target mean
    pub bisection_tolerance: f64,
    /// Maximum number of bisection steps
    pub bisection_max_iterations: usize,
    /// Series means below this fall back to uniform assignment
    pub near_zero_mean: f64,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        ExplanationConfig {
            noise_floor: DEFAULT_NOISE_FLOOR,
            strong_contribution: DEFAULT_STRONG_CONTRIBUTION,
            moderate_contribution: DEFAULT_MODERATE_CONTRIBUTION,
            truncate_top_n: DEFAULT_TRUNCATE_TOP_N,
            others_cutoff: DEFAULT_OTHERS_CUTOFF,
            missing_sentinel: DEFAULT_MISSING_SENTINEL,
            output_scale: DEFAULT_OUTPUT_SCALE,
            background_samples: DEFAULT_BACKGROUND_SAMPLES,
            random_seed: DEFAULT_RANDOM_SEED,
            background_scale_guard: DEFAULT_BACKGROUND_SCALE_GUARD,
            bisection_tolerance: DEFAULT_BISECTION_TOLERANCE,
            bisection_max_iterations: DEFAULT_BISECTION_MAX_ITERATIONS,
            near_zero_mean: DEFAULT_NEAR_ZERO_MEAN,
        }
    }
}

impl ExplanationConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.noise_floor >= 0.0) {
            return Err(SepsisVisionError::invalid_parameter(
                "noise_floor",
                self.noise_floor.to_string(),
                "must be non-negative",
            ));
        }

        if !(self.moderate_contribution >= 0.0)
            || self.strong_contribution < self.moderate_contribution
        {
            return Err(SepsisVisionError::invalid_parameter(
                "strong_contribution",
                self.strong_contribution.to_string(),
                format!(
                    "must be at least moderate_contribution ({}) and both non-negative",
                    self.moderate_contribution
                ),
            ));
        }

        if self.truncate_top_n == 0 {
            return Err(SepsisVisionError::invalid_parameter(
                "truncate_top_n",
                "0",
                "must keep at least one row",
            ));
        }

        if !self.output_scale.is_finite() || self.output_scale <= 0.0 {
            return Err(SepsisVisionError::invalid_parameter(
                "output_scale",
                self.output_scale.to_string(),
                "must be positive",
            ));
        }

        if self.background_samples == 0 {
            return Err(SepsisVisionError::invalid_parameter(
                "background_samples",
                "0",
                "must draw at least one sample",
            ));
        }

        if !(self.bisection_tolerance > 0.0) {
            return Err(SepsisVisionError::invalid_parameter(
                "bisection_tolerance",
                self.bisection_tolerance.to_string(),
                "must be positive",
            ));
        }

        if self.bisection_max_iterations == 0 {
            return Err(SepsisVisionError::invalid_parameter(
                "bisection_max_iterations",
                "0",
                "must be at least 1",
            ));
        }

        if !self.missing_sentinel.is_finite() {
            return Err(SepsisVisionError::invalid_parameter(
                "missing_sentinel",
                self.missing_sentinel.to_string(),
                "must be finite",
            ));
        }

        Ok(())
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SepsisVisionError::config(format!("Failed to read config file: {}", e)))?;

        let config: ExplanationConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                SepsisVisionError::config(format!("Failed to parse JSON config: {}", e))
            })?,
            Some("toml") => toml::from_str(&content).map_err(|e| {
                SepsisVisionError::config(format!("Failed to parse TOML config: {}", e))
            })?,
            _ => {
                return Err(SepsisVisionError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.validate()?;
        log::info!("Loaded explanation config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a `.json` or `.toml` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self).map_err(|e| {
                SepsisVisionError::config(format!("Failed to serialize to TOML: {}", e))
            })?,
            _ => {
                return Err(SepsisVisionError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `SEPSIS_VISION_*` environment variable overrides
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        override_from_env("SEPSIS_VISION_NOISE_FLOOR", &mut self.noise_floor)?;
        override_from_env("SEPSIS_VISION_TRUNCATE_TOP_N", &mut self.truncate_top_n)?;
        override_from_env("SEPSIS_VISION_OUTPUT_SCALE", &mut self.output_scale)?;
        override_from_env(
            "SEPSIS_VISION_BACKGROUND_SAMPLES",
            &mut self.background_samples,
        )?;
        override_from_env("SEPSIS_VISION_RANDOM_SEED", &mut self.random_seed)?;
        self.validate()
    }
}

fn override_from_env<T: std::str::FromStr>(name: &str, target: &mut T) -> Result<()> {
    if let Ok(val) = std::env::var(name) {
        *target = val
            .parse()
            .map_err(|_| SepsisVisionError::config(format!("Invalid {}: '{}'", name, val)))?;
        log::debug!("{} overridden from environment", name);
    }
    Ok(())
}

/// Builder for [`ExplanationConfig`]
#[derive(Debug, Clone, Default)]
pub struct ExplanationConfigBuilder {
    config: ExplanationConfig,
}

impl ExplanationConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the noise floor
    pub fn noise_floor(mut self, floor: f64) -> Self {
        self.config.noise_floor = floor;
        self
    }

    /// Set the strength thresholds (strong, moderate)
    pub fn strength_thresholds(mut self, strong: f64, moderate: f64) -> Self {
        self.config.strong_contribution = strong;
        self.config.moderate_contribution = moderate;
        self
    }

    /// Set the number of rows kept before "Others"
    pub fn truncate_top_n(mut self, top_n: usize) -> Self {
        self.config.truncate_top_n = top_n;
        self
    }

    /// Set the "Others" counting cutoff
    pub fn others_cutoff(mut self, cutoff: f64) -> Self {
        self.config.others_cutoff = cutoff;
        self
    }

    /// Set the missing-value sentinel
    pub fn missing_sentinel(mut self, sentinel: f64) -> Self {
        self.config.missing_sentinel = sentinel;
        self
    }

    /// Set the attribution output scale
    pub fn output_scale(mut self, scale: f64) -> Self {
        self.config.output_scale = scale;
        self
    }

    /// Set the number of expected-gradients samples
    pub fn background_samples(mut self, samples: usize) -> Self {
        self.config.background_samples = samples;
        self
    }

    /// Set the random seed
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the bisection tolerance
    pub fn bisection_tolerance(mut self, tolerance: f64) -> Self {
        self.config.bisection_tolerance = tolerance;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ExplanationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
