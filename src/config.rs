//! Engine configuration.
//!
//! Settings are plain serializable structs with defaults and an explicit
//! `validate()` step, checked once when an engine is constructed.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Relative importance of the criteria in the combined evaluation method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationWeights {
    pub explanatory_power: f64,
    pub parsimony: f64,
    pub prior_probability: f64,
}

impl Default for EvaluationWeights {
    fn default() -> Self {
        Self {
            explanatory_power: 0.4,
            parsimony: 0.3,
            prior_probability: 0.3,
        }
    }
}

impl EvaluationWeights {
    /// Validate weights.
    ///
    /// Each weight must be finite and non-negative and the sum must be 1.0
    /// within [`WEIGHT_TOLERANCE`].
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, value) in [
            ("explanatory_power", self.explanatory_power),
            ("parsimony", self.parsimony),
            ("prior_probability", self.prior_probability),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidWeight { name, value });
            }
        }

        let sum = self.explanatory_power + self.parsimony + self.prior_probability;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigurationError::WeightsDoNotSumToOne { sum });
        }
        Ok(())
    }
}

/// Settings for an [`crate::abductive::AbductiveEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbductiveConfig {
    /// Used when a generation request asks for 0 hypotheses.
    pub default_max_hypotheses: usize,
    /// Parsimony floor applied by the end-to-end inference pipeline.
    pub inference_min_parsimony: f64,
    /// Upper bound on a generator call when the caller sets no timeout.
    pub generator_timeout_ms: u64,
    /// Weights for the combined method in the end-to-end pipeline.
    pub weights: EvaluationWeights,
}

impl Default for AbductiveConfig {
    fn default() -> Self {
        Self {
            default_max_hypotheses: 3,
            inference_min_parsimony: 0.3,
            generator_timeout_ms: 30_000,
            weights: EvaluationWeights::default(),
        }
    }
}

impl AbductiveConfig {
    /// Validate the configuration.
    ///
    /// This must be called before constructing an engine.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.default_max_hypotheses == 0 {
            return Err(ConfigurationError::InvalidSetting {
                field: "default_max_hypotheses",
                reason: "must be > 0".to_string(),
            });
        }
        if !self.inference_min_parsimony.is_finite() || !(0.0..=1.0).contains(&self.inference_min_parsimony) {
            return Err(ConfigurationError::InvalidSetting {
                field: "inference_min_parsimony",
                reason: format!("must be in [0, 1], got {}", self.inference_min_parsimony),
            });
        }
        if self.generator_timeout_ms == 0 {
            return Err(ConfigurationError::InvalidSetting {
                field: "generator_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        self.weights.validate()
    }
}
