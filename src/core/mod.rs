//! Core infrastructure module for SepsisVision.
//!
//! - [`types`]: shared enumerations and small helpers
//! - [`constants`]: default thresholds and fixed dimensions
//! - [`error`]: error taxonomy and the crate `Result` alias

pub mod constants;
pub mod error;
pub mod types;

pub use constants::*;
pub use error::{Result, SepsisVisionError};
pub use types::*;

use std::sync::Once;

static LOGGING_INIT: Once = Once::new();

/// Initialize logging. Safe to call repeatedly.
pub fn initialize_core() -> Result<()> {
    LOGGING_INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or("info");
        // Another logger may already be installed by the host application
        let _ = env_logger::Builder::from_env(env).try_init();
        log::debug!("SepsisVision core initialized");
    });
    Ok(())
}

/// Check if logging has been initialized
pub fn is_core_initialized() -> bool {
    LOGGING_INIT.is_completed()
}
