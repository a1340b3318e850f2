//! Error handling and error types for SepsisVision.
//!
//! Errors fall into two families. Contract violations (catalog, scaler and
//! model out of sync, tensor shape mismatches) are fatal and abort the
//! operation. Missing statistics and missing patient values are recoverable
//! and are degraded inline by the row that hit them.

use std::io;
use thiserror::Error;

/// Main error type for the SepsisVision library.
#[derive(Error, Debug)]
pub enum SepsisVisionError {
    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Feature catalog, scaler and model disagree about their inputs
    #[error("Contract violation: {message}")]
    Contract { message: String },

    /// Tensor or vector shape mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Population statistics are not available for a feature
    #[error("Statistics not available for feature '{feature}'")]
    MissingStatistics { feature: String },

    /// A patient value needed by an operation is absent
    #[error("Value not available for feature '{feature}'")]
    MissingValue { feature: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Model inference or attribution errors
    #[error("Prediction error: {message}")]
    Prediction { message: String },

    /// Data loading and parsing errors
    #[error("Data loading error: {message}")]
    DataLoading { message: String },

    /// File I/O errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// CSV parsing errors
    #[error("CSV parsing error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML error: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },
}

/// Type alias for Results using SepsisVisionError
pub type Result<T> = std::result::Result<T, SepsisVisionError>;

impl SepsisVisionError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        SepsisVisionError::Config {
            message: message.into(),
        }
    }

    /// Create a contract violation error
    pub fn contract<S: Into<String>>(message: S) -> Self {
        SepsisVisionError::Contract {
            message: message.into(),
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        SepsisVisionError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a missing statistics error
    pub fn missing_statistics<S: Into<String>>(feature: S) -> Self {
        SepsisVisionError::MissingStatistics {
            feature: feature.into(),
        }
    }

    /// Create a missing value error
    pub fn missing_value<S: Into<String>>(feature: S) -> Self {
        SepsisVisionError::MissingValue {
            feature: feature.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        SepsisVisionError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a prediction error
    pub fn prediction<S: Into<String>>(message: S) -> Self {
        SepsisVisionError::Prediction {
            message: message.into(),
        }
    }

    /// Create a data loading error
    pub fn data_loading<S: Into<String>>(message: S) -> Self {
        SepsisVisionError::DataLoading {
            message: message.into(),
        }
    }

    /// Check if this error can be degraded locally instead of aborting
    pub fn is_recoverable(&self) -> bool {
        match self {
            SepsisVisionError::MissingStatistics { .. } => true,
            SepsisVisionError::MissingValue { .. } => true,
            SepsisVisionError::Config { .. } => false,
            SepsisVisionError::Contract { .. } => false,
            SepsisVisionError::DimensionMismatch { .. } => false,
            SepsisVisionError::InvalidParameter { .. } => false,
            SepsisVisionError::Prediction { .. } => false,
            SepsisVisionError::DataLoading { .. } => false,
            SepsisVisionError::Io { .. } => false,
            SepsisVisionError::Csv { .. } => false,
            SepsisVisionError::Json { .. } => false,
            SepsisVisionError::Toml { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            SepsisVisionError::Config { .. } => "config",
            SepsisVisionError::Contract { .. } => "contract",
            SepsisVisionError::DimensionMismatch { .. } => "dimension_mismatch",
            SepsisVisionError::MissingStatistics { .. } => "missing_statistics",
            SepsisVisionError::MissingValue { .. } => "missing_value",
            SepsisVisionError::InvalidParameter { .. } => "invalid_parameter",
            SepsisVisionError::Prediction { .. } => "prediction",
            SepsisVisionError::DataLoading { .. } => "data_loading",
            SepsisVisionError::Io { .. } => "io",
            SepsisVisionError::Csv { .. } => "csv",
            SepsisVisionError::Json { .. } => "json",
            SepsisVisionError::Toml { .. } => "toml",
        }
    }
}

/// Convenience macro for contract violations
#[macro_export]
macro_rules! contract_error {
    ($msg:expr) => {
        $crate::core::error::SepsisVisionError::contract($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::SepsisVisionError::contract(format!($fmt, $($arg)*))
    };
}
