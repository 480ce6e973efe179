//! Likelihood estimation from evidence quality.
//!
//! An estimator converts an evidence score into the pair of conditional
//! probabilities `P(E|H)` and `P(E|¬H)` needed for a full Bayesian update.
//! Calibration is delegated to an [`EvidenceProfile`], which can be swapped
//! on a live estimator.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigurationError, CredenceError, CredenceResult, ValidationError};
use crate::evidence::Evidence;

/// Neutral base around which profile deltas are applied.
pub const NEUTRAL_LIKELIHOOD: f64 = 0.5;

/// Conditional likelihoods of a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Likelihoods {
    /// P(E|H)
    pub if_true: f64,
    /// P(E|¬H)
    pub if_false: f64,
}

impl Likelihoods {
    /// The likelihood ratio `P(E|H) / P(E|¬H)`, or `None` when `P(E|¬H)` is zero.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        if self.if_false > 0.0 {
            Some(self.if_true / self.if_false)
        } else {
            None
        }
    }
}

/// Deltas applied around the neutral base.
///
/// Supporting evidence: `P(E|H) = 0.5 + score·support_high`,
/// `P(E|¬H) = 0.5 − score·support_low`. Refuting evidence mirrors this
/// with the `refute_*` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileParameters {
    pub support_high: f64,
    pub support_low: f64,
    pub refute_high: f64,
    pub refute_low: f64,
}

/// A calibration strategy for likelihood estimation.
///
/// New domains add a profile type; the store and estimator never switch on names.
pub trait EvidenceProfile: Send + Sync + fmt::Debug {
    /// Short domain name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Calibration deltas for this profile.
    fn parameters(&self) -> ProfileParameters;
}

/// General-purpose calibration: `P(E|H)` spans 0.5–0.9, `P(E|¬H)` 0.5–0.2.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProfile;

impl EvidenceProfile for DefaultProfile {
    fn name(&self) -> &str {
        "default"
    }

    fn parameters(&self) -> ProfileParameters {
        ProfileParameters {
            support_high: 0.4,
            support_low: 0.3,
            refute_high: 0.4,
            refute_low: 0.3,
        }
    }
}

/// Wider separation for rigorously sourced evidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScientificProfile;

impl EvidenceProfile for ScientificProfile {
    fn name(&self) -> &str {
        "scientific"
    }

    fn parameters(&self) -> ProfileParameters {
        ProfileParameters {
            support_high: 0.45,
            support_low: 0.35,
            refute_high: 0.45,
            refute_low: 0.35,
        }
    }
}

/// Narrower separation for anecdotal evidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnecdotalProfile;

impl EvidenceProfile for AnecdotalProfile {
    fn name(&self) -> &str {
        "anecdotal"
    }

    fn parameters(&self) -> ProfileParameters {
        ProfileParameters {
            support_high: 0.25,
            support_low: 0.20,
            refute_high: 0.25,
            refute_low: 0.20,
        }
    }
}

/// A caller-defined profile.
///
/// Parameters are not range-checked up front; an estimate that leaves
/// `[0, 1]` fails with a configuration error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomProfile {
    pub name: String,
    pub parameters: ProfileParameters,
}

impl CustomProfile {
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: ProfileParameters) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

impl EvidenceProfile for CustomProfile {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> ProfileParameters {
        self.parameters
    }
}

/// Profiles shipped with the crate.
#[must_use]
pub fn shipped_profiles() -> Vec<Arc<dyn EvidenceProfile>> {
    vec![
        Arc::new(DefaultProfile),
        Arc::new(ScientificProfile),
        Arc::new(AnecdotalProfile),
    ]
}

/// Converts evidence into conditional likelihoods.
pub trait LikelihoodEstimator: Send + Sync {
    /// Returns `P(E|H)` and `P(E|¬H)` for the evidence.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the evidence score is not in `[0, 1]`
    /// - `Configuration` if the active calibration yields likelihoods outside `[0, 1]`
    fn estimate_likelihoods(&self, evidence: &Evidence) -> CredenceResult<Likelihoods>;

    /// Returns the active calibration profile.
    ///
    /// # Errors
    ///
    /// `Internal` if the profile lock is poisoned.
    fn profile(&self) -> CredenceResult<Arc<dyn EvidenceProfile>>;

    /// Replaces the calibration profile for subsequent estimates.
    ///
    /// # Errors
    ///
    /// `Internal` if the profile lock is poisoned.
    fn set_profile(&self, profile: Arc<dyn EvidenceProfile>) -> CredenceResult<()>;
}

/// Applies profile deltas to a score.
///
/// # Errors
///
/// See [`LikelihoodEstimator::estimate_likelihoods`].
pub fn estimate_with_profile(
    profile: &dyn EvidenceProfile,
    overall_score: f64,
    supports_claim: bool,
) -> CredenceResult<Likelihoods> {
    ValidationError::check_probability("evidence overall_score", overall_score)?;

    let p = profile.parameters();
    let (if_true, if_false) = if supports_claim {
        (
            NEUTRAL_LIKELIHOOD + overall_score * p.support_high,
            NEUTRAL_LIKELIHOOD - overall_score * p.support_low,
        )
    } else {
        (
            NEUTRAL_LIKELIHOOD - overall_score * p.refute_high,
            NEUTRAL_LIKELIHOOD + overall_score * p.refute_low,
        )
    };

    let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
    if !in_range(if_true) || !in_range(if_false) {
        return Err(ConfigurationError::LikelihoodOutOfRange {
            profile: profile.name().to_string(),
            if_true,
            if_false,
        }
        .into());
    }

    Ok(Likelihoods { if_true, if_false })
}

/// Profile-driven estimator whose profile can be swapped at runtime.
pub struct StandardEstimator {
    profile: RwLock<Arc<dyn EvidenceProfile>>,
}

impl fmt::Debug for StandardEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .profile
            .read()
            .map(|p| p.name().to_string())
            .unwrap_or_else(|_| "<poisoned>".to_string());
        f.debug_struct("StandardEstimator")
            .field("profile", &name)
            .finish()
    }
}

impl Default for StandardEstimator {
    fn default() -> Self {
        Self::new(Arc::new(DefaultProfile))
    }
}

impl StandardEstimator {
    /// Creates an estimator with the given profile.
    #[must_use]
    pub fn new(profile: Arc<dyn EvidenceProfile>) -> Self {
        Self {
            profile: RwLock::new(profile),
        }
    }

    /// Returns the active profile.
    pub fn profile(&self) -> CredenceResult<Arc<dyn EvidenceProfile>> {
        let guard = self
            .profile
            .read()
            .map_err(|_| CredenceError::internal("estimator profile lock poisoned"))?;
        Ok(Arc::clone(&guard))
    }

    /// Replaces the active profile; subsequent estimates use the new calibration.
    pub fn set_profile(&self, profile: Arc<dyn EvidenceProfile>) -> CredenceResult<()> {
        let mut guard = self
            .profile
            .write()
            .map_err(|_| CredenceError::internal("estimator profile lock poisoned"))?;
        info!(from = guard.name(), to = profile.name(), "evidence profile swapped");
        *guard = profile;
        Ok(())
    }
}

impl LikelihoodEstimator for StandardEstimator {
    fn estimate_likelihoods(&self, evidence: &Evidence) -> CredenceResult<Likelihoods> {
        // Clone the Arc so estimation does not hold the profile lock.
        let profile = self.profile()?;
        estimate_with_profile(profile.as_ref(), evidence.overall_score, evidence.supports_claim)
    }

    fn profile(&self) -> CredenceResult<Arc<dyn EvidenceProfile>> {
        StandardEstimator::profile(self)
    }

    fn set_profile(&self, profile: Arc<dyn EvidenceProfile>) -> CredenceResult<()> {
        StandardEstimator::set_profile(self, profile)
    }
}
