//! Configuration management for SepsisVision.
//!
//! Thresholds can be set programmatically through
//! [`ExplanationConfigBuilder`], loaded from JSON or TOML files, and
//! overridden from `SEPSIS_VISION_*` environment variables.

pub mod core;

pub use self::core::{ExplanationConfig, ExplanationConfigBuilder};
