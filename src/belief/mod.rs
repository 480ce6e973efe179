//! Probabilistic beliefs and their revision.
//!
//! A [`Belief`] is a statement paired with a probability of truth. Beliefs
//! are created once, then revised in place by Bayesian updates as evidence
//! arrives. The store never deletes them.

pub mod combine;
pub mod store;
pub mod update;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use combine::{combine_probabilities, CombineOp};
pub use store::BeliefStore;
pub use update::{bayes_update, BayesOutcome, UNINFORMATIVE_TOLERANCE};

/// Metadata key set on every update; `true` when the last update carried no information.
pub const META_LAST_UPDATE_UNINFORMATIVE: &str = "last_update_uninformative";

/// Metadata key naming why the last update was uninformative.
pub const META_UNINFORMATIVE_REASON: &str = "uninformative_reason";

/// Store-assigned belief identifier, rendered as `belief-<n>`.
///
/// Identifiers increase monotonically in creation order within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BeliefId(u64);

impl BeliefId {
    const PREFIX: &'static str = "belief-";

    pub(crate) const fn from_sequence(n: u64) -> Self {
        Self(n)
    }

    /// The creation sequence number.
    #[must_use]
    pub const fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BeliefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

impl FromStr for BeliefId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(Self::PREFIX)
            .and_then(|n| n.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .map(Self)
            .ok_or_else(|| ValidationError::MalformedId {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for BeliefId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BeliefId> for String {
    fn from(id: BeliefId) -> Self {
        id.to_string()
    }
}

/// A statement with a revisable probability of truth.
///
/// `probability` and `prior_prob` are always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Belief {
    pub id: BeliefId,
    pub statement: String,

    /// Current (posterior) probability.
    pub probability: f64,

    /// Probability at creation.
    pub prior_prob: f64,

    /// Evidence IDs in the order they were applied.
    pub evidence: Vec<String>,

    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Belief {
    /// Returns true if the most recent update was uninformative.
    #[must_use]
    pub fn last_update_uninformative(&self) -> bool {
        self.metadata
            .get(META_LAST_UPDATE_UNINFORMATIVE)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Net change from the prior.
    #[must_use]
    pub fn shift(&self) -> f64 {
        self.probability - self.prior_prob
    }

    /// Checks the probability invariants; used when restoring persisted beliefs.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_probability("belief probability", self.probability)?;
        ValidationError::check_probability("belief prior_prob", self.prior_prob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn belief_id_round_trips_through_string() {
        let id = BeliefId::from_sequence(17);
        assert_eq!(id.to_string(), "belief-17");
        assert_eq!("belief-17".parse::<BeliefId>().unwrap(), id);
    }

    #[test]
    fn belief_id_rejects_malformed() {
        assert!("belief-".parse::<BeliefId>().is_err());
        assert!("belief-0".parse::<BeliefId>().is_err());
        assert!("hyp-3".parse::<BeliefId>().is_err());
        assert!("belief-x".parse::<BeliefId>().is_err());
    }

    #[test]
    fn belief_ids_order_by_sequence() {
        assert!(BeliefId::from_sequence(2) < BeliefId::from_sequence(10));
    }

    #[test]
    fn belief_serializes_id_as_string() {
        let belief = Belief {
            id: BeliefId::from_sequence(3),
            statement: "it will rain".to_string(),
            probability: 0.4,
            prior_prob: 0.3,
            evidence: vec!["e1".to_string()],
            updated_at: Utc::now(),
            metadata: serde_json::Map::new(),
        };
        let json = serde_json::to_value(&belief).unwrap();
        assert_eq!(json["id"], "belief-3");
        let back: Belief = serde_json::from_value(json).unwrap();
        assert_eq!(back, belief);
        assert!((back.shift() - 0.1).abs() < 1e-12);
        assert!(!back.last_update_uninformative());
    }
}
