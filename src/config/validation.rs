//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (parsing handles syntactic)
//! - Validate value ranges (sample rate is a number, timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Endpoints are not checked here; a malformed endpoint is reported by the
//!   telemetry setup that tries to use it

use thiserror::Error;

use crate::config::schema::BootstrapConfig;

/// A semantic problem with an otherwise well-formed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("tracing sample rate must be a number")]
    SampleRateNotANumber,

    #[error("shutdown timeout must be greater than zero")]
    ZeroShutdownTimeout,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BootstrapConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.tracing.sample_rate.is_nan() {
        errors.push(ValidationError::SampleRateNotANumber);
    }

    if config.shutdown.timeout_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
