//! System constants and default thresholds for SepsisVision.
//!
//! The thresholds mirror what the study interfaces display; every one of
//! them can be overridden through [`crate::config::ExplanationConfig`].

use static_assertions::const_assert;

/// Length of the hourly observation window for time-series features.
pub const OBSERVATION_HOURS: usize = 24;

const_assert!(OBSERVATION_HOURS > 0);

/// Value substituted for missing model inputs after scaling.
pub const DEFAULT_MISSING_SENTINEL: f64 = -1.0;

/// Rows with an absolute contribution at or below this are noise.
pub const DEFAULT_NOISE_FLOOR: f64 = 0.02;

/// Absolute contribution above which a parameter contributes "much".
pub const DEFAULT_STRONG_CONTRIBUTION: f64 = 5.0;

/// Absolute contribution above which a parameter contributes "slightly".
pub const DEFAULT_MODERATE_CONTRIBUTION: f64 = 3.0;

/// Rows kept before the synthetic "Others" row is appended.
pub const DEFAULT_TRUNCATE_TOP_N: usize = 9;

/// Folded rows at or above this absolute contribution are counted in the
/// "Others" description.
pub const DEFAULT_OTHERS_CUTOFF: f64 = 2.0;

/// Attributions are reported in risk percentage points.
pub const DEFAULT_OUTPUT_SCALE: f64 = 100.0;

/// Number of interpolation samples drawn for expected gradients.
pub const DEFAULT_BACKGROUND_SAMPLES: usize = 200;

/// Default random seed for reproducible attributions.
pub const DEFAULT_RANDOM_SEED: u64 = 0;

/// Mean tolerance for the counterfactual scale-factor search.
pub const DEFAULT_BISECTION_TOLERANCE: f64 = 1e-4;

/// Iteration cap for the counterfactual scale-factor search.
pub const DEFAULT_BISECTION_MAX_ITERATIONS: usize = 100;

/// Series means below this are treated as zero.
pub const DEFAULT_NEAR_ZERO_MEAN: f64 = 1e-9;

/// Scaled background values beyond this magnitude look unscaled.
pub const DEFAULT_BACKGROUND_SCALE_GUARD: f64 = 50.0;

/// Group key for the sum of all positive contributions.
pub const RISK_INCREASING_EVIDENCE: &str = "Risk ↑ Evidence";

/// Group key for the sum of all negative contributions.
pub const RISK_DECREASING_EVIDENCE: &str = "Risk ↓ Evidence";

/// Parameter name of the synthetic aggregate row.
pub const OTHERS_ROW: &str = "Others";
