//! Hypothesis evaluation and ranking.
//!
//! Evaluation is pure: it reads caller-supplied observations and hypotheses
//! and returns a fresh ranked list. It is safe to run concurrently.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::abductive::{Hypothesis, HypothesisStatus, Observation, RankedHypothesis};
use crate::config::EvaluationWeights;
use crate::error::{CredenceError, CredenceResult, ValidationError};

/// How hypotheses are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMethod {
    /// `prior × explanatory power`, normalized to sum to 1 across the set.
    Bayesian,
    /// Simplicity only.
    Parsimony,
    /// Explanatory power only.
    Explanatory,
    /// Weighted sum of explanatory power, parsimony and prior.
    Combined,
}

impl EvaluationMethod {
    const SUPPORTED: &'static str = "bayesian, parsimony, explanatory, combined";
}

impl Default for EvaluationMethod {
    fn default() -> Self {
        Self::Combined
    }
}

impl fmt::Display for EvaluationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bayesian => write!(f, "bayesian"),
            Self::Parsimony => write!(f, "parsimony"),
            Self::Explanatory => write!(f, "explanatory"),
            Self::Combined => write!(f, "combined"),
        }
    }
}

impl FromStr for EvaluationMethod {
    type Err = CredenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bayesian" => Ok(Self::Bayesian),
            "parsimony" => Ok(Self::Parsimony),
            "explanatory" => Ok(Self::Explanatory),
            "combined" => Ok(Self::Combined),
            other => Err(CredenceError::UnsupportedOperation {
                operation: other.to_string(),
                supported: Self::SUPPORTED,
            }),
        }
    }
}

/// Share of total observation confidence accounted for by the hypothesis.
///
/// 0 when the hypothesis explains nothing or total confidence is 0.
#[must_use]
pub fn calculate_explanatory_power(hypothesis: &Hypothesis, observations: &[Observation]) -> f64 {
    if hypothesis.observations.is_empty() {
        return 0.0;
    }

    let mut seen = HashSet::new();
    let mut explained = 0.0;
    let mut total = 0.0;
    for obs in observations {
        // Duplicate IDs count once.
        if !seen.insert(obs.id.as_str()) {
            continue;
        }
        total += obs.confidence;
        if hypothesis.observations.contains(&obs.id) {
            explained += obs.confidence;
        }
    }

    if total <= 0.0 {
        return 0.0;
    }
    (explained / total).clamp(0.0, 1.0)
}

/// Simplicity in `[0, 1]`: the mean of an assumption penalty
/// `1 / (1 + assumptions)` and a description penalty `1 / (1 + ln(1 + words))`.
#[must_use]
pub fn calculate_parsimony(hypothesis: &Hypothesis) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let assumptions = hypothesis.assumptions.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let words = hypothesis.description.split_whitespace().count() as f64;

    let assumption_score = 1.0 / (1.0 + assumptions);
    let description_score = 1.0 / (1.0 + (1.0 + words).ln());

    ((assumption_score + description_score) / 2.0).clamp(0.0, 1.0)
}

fn validate_inputs(observations: &[Observation], hypotheses: &[Hypothesis]) -> Result<(), ValidationError> {
    if hypotheses.is_empty() {
        return Err(ValidationError::EmptyCollection { field: "hypotheses" });
    }
    for obs in observations {
        obs.validate()?;
    }
    for h in hypotheses {
        ValidationError::check_probability("hypothesis prior_probability", h.prior_probability)?;
    }
    Ok(())
}

/// Scores and ranks hypotheses, highest posterior first.
///
/// Parsimony and explanatory power are recomputed for every hypothesis.
/// `weights` applies to [`EvaluationMethod::Combined`] and defaults to
/// `(0.4, 0.3, 0.3)`. Ties keep input order.
///
/// # Errors
///
/// - `InvalidInput` if `hypotheses` is empty or a probability is out of range
/// - `Configuration` if combined weights are invalid
pub fn evaluate_hypotheses(
    observations: &[Observation],
    hypotheses: &[Hypothesis],
    method: EvaluationMethod,
    weights: Option<&EvaluationWeights>,
) -> CredenceResult<Vec<RankedHypothesis>> {
    validate_inputs(observations, hypotheses)?;
    let weights = weights.copied().unwrap_or_default();
    if method == EvaluationMethod::Combined {
        weights.validate()?;
    }

    let now = Utc::now();
    let mut scored: Vec<(Hypothesis, f64, f64)> = hypotheses
        .iter()
        .map(|h| {
            let mut h = h.clone();
            let explanatory = calculate_explanatory_power(&h, observations);
            h.parsimony = calculate_parsimony(&h);
            h.status = HypothesisStatus::Evaluated;
            h.updated_at = now;

            let score = match method {
                EvaluationMethod::Bayesian => h.prior_probability * explanatory,
                EvaluationMethod::Parsimony => h.parsimony,
                EvaluationMethod::Explanatory => explanatory,
                EvaluationMethod::Combined => {
                    weights.explanatory_power * explanatory
                        + weights.parsimony * h.parsimony
                        + weights.prior_probability * h.prior_probability
                }
            };
            (h, explanatory, score)
        })
        .collect();

    if method == EvaluationMethod::Bayesian {
        normalize(&mut scored);
    }

    // Stable sort keeps input order among equal scores.
    scored.sort_by(|a, b| b.2.total_cmp(&a.2));

    let ranked: Vec<RankedHypothesis> = scored
        .into_iter()
        .enumerate()
        .map(|(i, (hypothesis, explanatory_power, score))| RankedHypothesis {
            hypothesis,
            posterior_probability: score.clamp(0.0, 1.0),
            explanatory_power,
            rank: i + 1,
            method,
        })
        .collect();

    debug!(
        method = %method,
        hypotheses = ranked.len(),
        observations = observations.len(),
        top = ranked.first().map_or(0.0, |r| r.posterior_probability),
        "hypotheses evaluated"
    );
    Ok(ranked)
}

/// Treats the set as mutually exclusive explanations: scores sum to 1.
///
/// When every unnormalized score is 0 the mass is spread uniformly.
fn normalize(scored: &mut [(Hypothesis, f64, f64)]) {
    let total: f64 = scored.iter().map(|s| s.2).sum();
    #[allow(clippy::cast_precision_loss)]
    let n = scored.len() as f64;
    for s in scored.iter_mut() {
        s.2 = if total > 0.0 { s.2 / total } else { 1.0 / n };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations() -> Vec<Observation> {
        vec![
            Observation::new("Lights flicker", 0.9).with_id("o1"),
            Observation::new("Breaker trips", 0.6).with_id("o2"),
            Observation::new("Burning smell", 0.5).with_id("o3"),
        ]
    }

    #[test]
    fn explanatory_power_is_confidence_share() {
        let obs = observations();
        let h = Hypothesis::new("Faulty wiring", 0.5).explaining(["o1", "o2"]);
        assert!((calculate_explanatory_power(&h, &obs) - 1.5 / 2.0).abs() < 1e-12);

        let all = Hypothesis::new("Faulty wiring", 0.5).explaining(["o1", "o2", "o3"]);
        assert!((calculate_explanatory_power(&all, &obs) - 1.0).abs() < 1e-12);

        let none = Hypothesis::new("Ghosts", 0.5);
        assert_eq!(calculate_explanatory_power(&none, &obs), 0.0);

        let unknown = Hypothesis::new("Ghosts", 0.5).explaining(["o9"]);
        assert_eq!(calculate_explanatory_power(&unknown, &obs), 0.0);
    }

    #[test]
    fn parsimony_is_bounded_and_decreasing() {
        let bare = Hypothesis::new("", 0.5);
        assert!((calculate_parsimony(&bare) - 1.0).abs() < 1e-12);

        let wordy = Hypothesis::new(
            "A long and winding explanation involving several interacting subsystems",
            0.5,
        );
        assert!(calculate_parsimony(&wordy) < calculate_parsimony(&Hypothesis::new("Short", 0.5)));

        let loaded = Hypothesis::new("Short", 0.5).with_assumptions(["a", "b", "c", "d"]);
        let p = calculate_parsimony(&loaded);
        assert!(p > 0.0 && p < calculate_parsimony(&Hypothesis::new("Short", 0.5)));
    }

    #[test]
    fn combined_prefers_broad_simple_explanation() {
        let obs = observations();
        let broad = Hypothesis::new("Overloaded circuit", 0.3)
            .explaining(["o1", "o2", "o3"])
            .with_assumptions(["many appliances on"]);
        let narrow = Hypothesis::new("Loose bulb socket", 0.3)
            .explaining(["o1"])
            .with_assumptions(["a", "b", "c", "d"]);

        let ranked = evaluate_hypotheses(&obs, &[narrow, broad.clone()], EvaluationMethod::Combined, None).unwrap();
        assert_eq!(ranked[0].hypothesis.id, broad.id);
        assert!(ranked[0].posterior_probability > ranked[1].posterior_probability);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[0].hypothesis.status, HypothesisStatus::Evaluated);
    }

    #[test]
    fn bayesian_scores_sum_to_one() {
        let obs = observations();
        let hs = vec![
            Hypothesis::new("A", 0.6).explaining(["o1"]),
            Hypothesis::new("B", 0.2).explaining(["o1", "o2", "o3"]),
            Hypothesis::new("C", 0.9),
        ];
        let ranked = evaluate_hypotheses(&obs, &hs, EvaluationMethod::Bayesian, None).unwrap();
        let sum: f64 = ranked.iter().map(|r| r.posterior_probability).sum();
        assert!((sum - 1.0).abs() < 1e-9);

        // A: 0.6 × 0.45 = 0.27, B: 0.2 × 1.0 = 0.2, C: 0
        assert_eq!(ranked[0].hypothesis.description, "A");
        assert!((ranked[0].posterior_probability - 0.27 / 0.47).abs() < 1e-9);
        assert_eq!(ranked[2].posterior_probability, 0.0);
    }

    #[test]
    fn bayesian_all_zero_is_uniform() {
        let obs = observations();
        let hs = vec![Hypothesis::new("A", 0.0), Hypothesis::new("B", 0.4)];
        let ranked = evaluate_hypotheses(&obs, &hs, EvaluationMethod::Bayesian, None).unwrap();
        assert!(ranked.iter().all(|r| (r.posterior_probability - 0.5).abs() < 1e-12));
        // Ties keep input order.
        assert_eq!(ranked[0].hypothesis.description, "A");
    }

    #[test]
    fn parsimony_method_ignores_explanatory_power() {
        let obs = observations();
        let fewer = Hypothesis::new("Same words here", 0.1).with_assumptions(["a"]);
        let more = Hypothesis::new("Same words here", 0.9)
            .explaining(["o1", "o2", "o3"])
            .with_assumptions(["a", "b"]);
        let ranked = evaluate_hypotheses(&obs, &[more, fewer.clone()], EvaluationMethod::Parsimony, None).unwrap();
        assert_eq!(ranked[0].hypothesis.id, fewer.id);
    }

    #[test]
    fn explanatory_method() {
        let obs = observations();
        let hs = vec![
            Hypothesis::new("A", 0.9).explaining(["o3"]),
            Hypothesis::new("B", 0.1).explaining(["o1", "o2"]),
        ];
        let ranked = evaluate_hypotheses(&obs, &hs, EvaluationMethod::Explanatory, None).unwrap();
        assert_eq!(ranked[0].hypothesis.description, "B");
        assert!((ranked[0].posterior_probability - 0.75).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_input() {
        let obs = observations();
        assert!(evaluate_hypotheses(&obs, &[], EvaluationMethod::Combined, None)
            .unwrap_err()
            .is_invalid_input());

        let bad_weights = EvaluationWeights {
            explanatory_power: 0.5,
            parsimony: 0.5,
            prior_probability: 0.5,
        };
        let hs = vec![Hypothesis::new("A", 0.5)];
        assert!(evaluate_hypotheses(&obs, &hs, EvaluationMethod::Combined, Some(&bad_weights))
            .unwrap_err()
            .is_configuration());
        // Weights only matter for the combined method.
        assert!(evaluate_hypotheses(&obs, &hs, EvaluationMethod::Parsimony, Some(&bad_weights)).is_ok());

        let bad_prior = vec![Hypothesis::new("A", 1.5)];
        assert!(evaluate_hypotheses(&obs, &bad_prior, EvaluationMethod::Combined, None)
            .unwrap_err()
            .is_invalid_input());

        let bad_obs = vec![Observation::new("x", -0.2)];
        assert!(evaluate_hypotheses(&bad_obs, &hs, EvaluationMethod::Combined, None)
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn parse_methods() {
        assert_eq!("Bayesian".parse::<EvaluationMethod>().unwrap(), EvaluationMethod::Bayesian);
        assert_eq!("combined".parse::<EvaluationMethod>().unwrap(), EvaluationMethod::Combined);
        assert!("vibes".parse::<EvaluationMethod>().unwrap_err().is_unsupported());
    }
}
