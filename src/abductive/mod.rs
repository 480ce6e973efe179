//! Abductive reasoning: inference to the best explanation.
//!
//! Generation and evaluation are separate stages. Generation calls an
//! external [`HypothesisGenerator`] and filters what it proposes;
//! evaluation is a pure ranking of hypotheses against observations and can
//! be used without any generator.

pub mod engine;
pub mod evaluation;
pub mod generator;
pub mod prompt;
pub mod themes;

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::storage::{RecordKind, RecordStore, StorageError};

pub use engine::{AbductiveEngine, GenerateRequest};
pub use evaluation::{
    calculate_explanatory_power, calculate_parsimony, evaluate_hypotheses, EvaluationMethod,
};
pub use generator::{CancellationToken, FixedResponseGenerator, GenerationContext, HypothesisGenerator};

/// Unique identifier for a hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HypothesisId(uuid::Uuid);

impl HypothesisId {
    /// Creates a new random hypothesis ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for HypothesisId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HypothesisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hyp-{}", self.0)
    }
}

/// A fact that needs explaining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub description: String,

    /// How certain we are about this observation (0-1).
    pub confidence: f64,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Observation {
    /// Creates an observation with a generated ID, timestamped now.
    #[must_use]
    pub fn new(description: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: format!("obs-{}", uuid::Uuid::new_v4()),
            description: description.into(),
            confidence,
            timestamp: Utc::now(),
            context: None,
        }
    }

    /// Replaces the generated ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the observation time.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Validates the confidence value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_probability("observation confidence", self.confidence)
    }
}

/// Lifecycle of a hypothesis within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisStatus {
    Proposed,
    Evaluated,
}

impl Default for HypothesisStatus {
    fn default() -> Self {
        Self::Proposed
    }
}

/// A candidate explanation for a set of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: HypothesisId,
    pub description: String,

    /// IDs of the observations this hypothesis claims to explain.
    pub observations: BTreeSet<String>,

    #[serde(default)]
    pub assumptions: Vec<String>,

    /// Testable predictions.
    #[serde(default)]
    pub predictions: Vec<String>,

    /// Simplicity score (0-1, higher = simpler).
    pub parsimony: f64,

    /// Prior plausibility (0-1).
    pub prior_probability: f64,

    #[serde(default)]
    pub status: HypothesisStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Hypothesis {
    /// Creates a proposed hypothesis; parsimony is computed from its shape.
    #[must_use]
    pub fn new(description: impl Into<String>, prior_probability: f64) -> Self {
        let now = Utc::now();
        let mut hypothesis = Self {
            id: HypothesisId::new(),
            description: description.into(),
            observations: BTreeSet::new(),
            assumptions: Vec::new(),
            predictions: Vec::new(),
            parsimony: 0.0,
            prior_probability,
            status: HypothesisStatus::Proposed,
            created_at: now,
            updated_at: now,
            metadata: serde_json::Map::new(),
        };
        hypothesis.parsimony = calculate_parsimony(&hypothesis);
        hypothesis
    }

    /// Adds explained observation IDs.
    #[must_use]
    pub fn explaining<I, S>(mut self, observation_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observations.extend(observation_ids.into_iter().map(Into::into));
        self
    }

    /// Sets the assumptions and recomputes parsimony.
    #[must_use]
    pub fn with_assumptions<I, S>(mut self, assumptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assumptions = assumptions.into_iter().map(Into::into).collect();
        self.parsimony = calculate_parsimony(&self);
        self
    }

    /// Sets the testable predictions.
    #[must_use]
    pub fn with_predictions<I, S>(mut self, predictions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predictions = predictions.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if the hypothesis makes at least one testable prediction.
    #[must_use]
    pub fn is_testable(&self) -> bool {
        !self.predictions.is_empty()
    }

    /// Validates the numeric fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_probability("hypothesis parsimony", self.parsimony)?;
        ValidationError::check_probability("hypothesis prior_probability", self.prior_probability)
    }
}

/// A hypothesis with its evaluation scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHypothesis {
    #[serde(flatten)]
    pub hypothesis: Hypothesis,

    pub posterior_probability: f64,
    pub explanatory_power: f64,

    /// 1-based position in the ranking.
    pub rank: usize,

    pub method: EvaluationMethod,
}

/// Result of the end-to-end abductive pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbductiveInference {
    pub id: uuid::Uuid,
    pub observations: Vec<Observation>,

    /// Hypotheses as generated, before ranking.
    pub hypotheses: Vec<Hypothesis>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_hypothesis: Option<RankedHypothesis>,

    /// Descending by posterior probability.
    pub ranked_hypotheses: Vec<RankedHypothesis>,

    pub method: EvaluationMethod,

    /// Posterior probability of the best hypothesis, 0 when there is none.
    pub confidence: f64,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AbductiveInference {
    /// Persists the inference and its ranked hypotheses.
    pub fn save_to(&self, records: &dyn RecordStore) -> Result<(), StorageError> {
        for ranked in &self.ranked_hypotheses {
            records.put(
                RecordKind::Hypothesis,
                &ranked.hypothesis.id.to_string(),
                serde_json::to_value(ranked)?,
            )?;
        }
        records.put(RecordKind::Inference, &self.id.to_string(), serde_json::to_value(self)?)
    }
}

/// Persists hypotheses, e.g. the output of a generation request.
pub fn save_hypotheses(records: &dyn RecordStore, hypotheses: &[Hypothesis]) -> Result<(), StorageError> {
    for hypothesis in hypotheses {
        records.put(
            RecordKind::Hypothesis,
            &hypothesis.id.to_string(),
            serde_json::to_value(hypothesis)?,
        )?;
    }
    Ok(())
}

/// Loads a previously saved hypothesis.
pub fn load_hypothesis(records: &dyn RecordStore, id: HypothesisId) -> Result<Option<Hypothesis>, StorageError> {
    records
        .get(RecordKind::Hypothesis, &id.to_string())?
        .map(serde_json::from_value::<Hypothesis>)
        .transpose()
        .map_err(StorageError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRecordStore;

    #[test]
    fn observation_validates_confidence() {
        assert!(Observation::new("x", 0.5).validate().is_ok());
        assert!(Observation::new("x", 1.1).validate().is_err());
        assert_eq!(Observation::new("x", 0.5).with_id("o1").id, "o1");
    }

    #[test]
    fn hypothesis_builders() {
        let h = Hypothesis::new("A leaking valve", 0.4)
            .explaining(["o1", "o2", "o1"])
            .with_assumptions(["valve is old"])
            .with_predictions(["pressure drops overnight"]);
        assert_eq!(h.observations.len(), 2);
        assert!(h.is_testable());
        assert_eq!(h.status, HypothesisStatus::Proposed);
        assert!(h.parsimony > 0.0 && h.parsimony <= 1.0);
        h.validate().unwrap();
    }

    #[test]
    fn more_assumptions_lower_parsimony() {
        let simple = Hypothesis::new("A leaking valve", 0.4).with_assumptions(["a"]);
        let complex = Hypothesis::new("A leaking valve", 0.4).with_assumptions(["a", "b", "c"]);
        assert!(simple.parsimony > complex.parsimony);
    }

    #[test]
    fn hypotheses_persist_and_load() {
        let records = InMemoryRecordStore::new();
        let h = Hypothesis::new("Fuse blew", 0.3).explaining(["o1"]);
        save_hypotheses(&records, std::slice::from_ref(&h)).unwrap();

        let loaded = load_hypothesis(&records, h.id).unwrap().unwrap();
        assert_eq!(loaded, h);
        assert!(load_hypothesis(&records, HypothesisId::new()).unwrap().is_none());
    }

    #[test]
    fn hypothesis_id_display() {
        assert!(HypothesisId::new().to_string().starts_with("hyp-"));
    }
}
