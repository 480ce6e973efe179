//! Bayesian update arithmetic.
//!
//! `P(H|E) = P(E|H)·P(H) / [P(E|H)·P(H) + P(E|¬H)·(1 − P(H))]`
//!
//! Both conditional likelihoods are required. A single likelihood cannot
//! normalize the posterior and reintroduces the base-rate fallacy.

use crate::likelihood::Likelihoods;

/// Likelihoods closer than this are treated as equal.
pub const UNINFORMATIVE_TOLERANCE: f64 = 1e-10;

/// Result of applying one piece of evidence to a prior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BayesOutcome {
    /// Posterior computed by Bayes' theorem, clamped to `[0, 1]`.
    Updated(f64),

    /// `P(E|H) ≈ P(E|¬H)`: the evidence carries no information; the prior stands.
    Uninformative,

    /// The evidence is impossible under both hypotheses; the prior stands.
    ImpossibleEvidence,
}

impl BayesOutcome {
    /// The resulting probability given the prior it was computed from.
    #[must_use]
    pub fn probability(self, prior: f64) -> f64 {
        match self {
            Self::Updated(p) => p,
            Self::Uninformative | Self::ImpossibleEvidence => prior,
        }
    }
}

/// Applies Bayes' theorem to `prior`.
///
/// Inputs are assumed validated to `[0, 1]`.
#[must_use]
pub fn bayes_update(prior: f64, likelihoods: Likelihoods) -> BayesOutcome {
    let Likelihoods { if_true, if_false } = likelihoods;

    if (if_true - if_false).abs() < UNINFORMATIVE_TOLERANCE {
        return BayesOutcome::Uninformative;
    }

    let numerator = if_true * prior;
    let denominator = numerator + if_false * (1.0 - prior);
    if denominator <= 0.0 {
        return BayesOutcome::ImpossibleEvidence;
    }

    BayesOutcome::Updated((numerator / denominator).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lk(if_true: f64, if_false: f64) -> Likelihoods {
        Likelihoods { if_true, if_false }
    }

    #[test]
    fn medical_test_base_rate() {
        // 1% prevalence, 99% sensitivity, 5% false positive rate.
        let BayesOutcome::Updated(p) = bayes_update(0.01, lk(0.99, 0.05)) else {
            panic!("expected an informative update");
        };
        assert!((p - 0.0099 / 0.0594).abs() < 1e-12);
        assert!((p - 0.1667).abs() < 1e-3);
    }

    #[test]
    fn equal_likelihoods_are_uninformative() {
        assert_eq!(bayes_update(0.3, lk(0.7, 0.7)), BayesOutcome::Uninformative);
        assert_eq!(
            bayes_update(0.3, lk(0.7, 0.7 + 1e-12)),
            BayesOutcome::Uninformative
        );
        assert!((BayesOutcome::Uninformative.probability(0.3) - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_denominator_keeps_prior() {
        // Prior 1 and P(E|H) = 0: evidence impossible under the only live hypothesis.
        assert_eq!(bayes_update(1.0, lk(0.0, 0.6)), BayesOutcome::ImpossibleEvidence);
        assert_eq!(bayes_update(0.0, lk(0.6, 0.0)), BayesOutcome::ImpossibleEvidence);
    }

    #[test]
    fn certain_priors_are_fixed_points() {
        assert_eq!(bayes_update(1.0, lk(0.2, 0.9)), BayesOutcome::Updated(1.0));
        assert_eq!(bayes_update(0.0, lk(0.9, 0.2)), BayesOutcome::Updated(0.0));
    }

    #[test]
    fn updates_are_order_sensitive_only_through_the_prior() {
        let a = lk(0.9, 0.3);
        let b = lk(0.2, 0.6);
        let ab = bayes_update(bayes_update(0.5, a).probability(0.5), b);
        let p_a = bayes_update(0.5, a).probability(0.5);
        assert!(matches!(ab, BayesOutcome::Updated(_)));
        assert!(p_a > 0.5);
        assert!(ab.probability(p_a) < p_a);
    }
}
