//! Error types for Credence.
//!
//! All errors in Credence are strongly typed using thiserror.
//! This enables pattern matching on specific error conditions
//! and provides clear error messages carrying the offending id or value.

use thiserror::Error;

/// Validation errors that occur during input validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be in [0.0, 1.0], got {value}")]
    ProbabilityOutOfRange {
        field: &'static str,
        value: f64,
    },

    #[error("{field} must be a finite number, got {value}")]
    NonFinite {
        field: &'static str,
        value: f64,
    },

    #[error("{field} cannot be empty")]
    EmptyCollection {
        field: &'static str,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Malformed identifier: {value}")]
    MalformedId {
        value: String,
    },

    #[error("Malformed record '{id}': {reason}")]
    MalformedRecord {
        id: String,
        reason: String,
    },
}

impl ValidationError {
    /// Validates that `value` is a finite probability in `[0, 1]`.
    pub fn check_probability(field: &'static str, value: f64) -> Result<(), Self> {
        if !value.is_finite() {
            return Err(Self::NonFinite { field, value });
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(Self::ProbabilityOutOfRange { field, value });
        }
        Ok(())
    }
}

/// Failures of the external hypothesis generator.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Hypothesis generator failed: {message}")]
    GeneratorFailed {
        message: String,
        transient: bool,
    },

    #[error("Generator call timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Generator call was cancelled")]
    Cancelled,

    #[error("Generator output could not be parsed: {reason} (output: {excerpt})")]
    MalformedOutput {
        reason: String,
        excerpt: String,
    },

    #[error("No hypothesis generator is configured")]
    NotConfigured,
}

/// Configuration errors: weights, profiles, engine settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Evaluation weights must sum to 1.0, got {sum}")]
    WeightsDoNotSumToOne {
        sum: f64,
    },

    #[error("Evaluation weight '{name}' must be finite and non-negative, got {value}")]
    InvalidWeight {
        name: &'static str,
        value: f64,
    },

    #[error("Profile '{profile}' produced out-of-range likelihoods: P(E|H)={if_true}, P(E|¬H)={if_false}")]
    LikelihoodOutOfRange {
        profile: String,
        if_true: f64,
        if_false: f64,
    },

    #[error("Invalid setting '{field}': {reason}")]
    InvalidSetting {
        field: &'static str,
        reason: String,
    },
}

/// Top-level error type for Credence.
///
/// Variants follow the engine's taxonomy: invalid input, missing records,
/// unsupported operations, upstream failures and configuration problems.
#[derive(Debug, Error)]
pub enum CredenceError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("{kind} not found: {id}")]
    NotFound {
        kind: &'static str,
        id: String,
    },

    #[error("Unsupported operation '{operation}' (supported: {supported})")]
    UnsupportedOperation {
        operation: String,
        supported: &'static str,
    },

    #[error("Upstream failure: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl CredenceError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a not-found error for a record of the given kind.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Returns true if this is an input validation error.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Returns true if a referenced record does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if an unknown operator or method was requested.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedOperation { .. })
    }

    /// Returns true if the external generator failed.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true if this error is retryable by the caller.
    ///
    /// The engine itself never retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream(e) => match e {
                UpstreamError::Timeout { .. } => true,
                UpstreamError::GeneratorFailed { transient, .. } => *transient,
                _ => false,
            },
            _ => false,
        }
    }
}

/// Result type alias for Credence operations.
pub type CredenceResult<T> = Result<T, CredenceError>;
