//! Thread-safe belief store with Bayesian revision.
//!
//! All state lives behind a single reader/writer lock: the belief map and
//! the ID counter. Reads run concurrently; writes are exclusive. No
//! operation takes the lock twice or calls out while holding it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::belief::combine::{combine_probabilities, CombineOp};
use crate::belief::update::{bayes_update, BayesOutcome};
use crate::belief::{Belief, BeliefId, META_LAST_UPDATE_UNINFORMATIVE, META_UNINFORMATIVE_REASON};
use crate::error::{CredenceError, CredenceResult, ValidationError};
use crate::evidence::{estimate_confidence, Evidence};
use crate::likelihood::{LikelihoodEstimator, Likelihoods, StandardEstimator};
use crate::storage::{RecordKind, RecordStore};

#[derive(Debug, Default)]
struct StoreState {
    beliefs: HashMap<BeliefId, Belief>,
    last_id: u64,
}

/// Process-scoped, in-memory store of probabilistic beliefs.
pub struct BeliefStore {
    state: RwLock<StoreState>,
    estimator: Arc<dyn LikelihoodEstimator>,
}

impl std::fmt::Debug for BeliefStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeliefStore")
            .field("len", &self.len().unwrap_or_default())
            .finish_non_exhaustive()
    }
}

impl Default for BeliefStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BeliefStore {
    /// Creates an empty store using a [`StandardEstimator`] with the default profile.
    #[must_use]
    pub fn new() -> Self {
        Self::with_estimator(Arc::new(StandardEstimator::default()))
    }

    /// Creates an empty store with a custom likelihood estimator.
    #[must_use]
    pub fn with_estimator(estimator: Arc<dyn LikelihoodEstimator>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            estimator,
        }
    }

    /// The estimator used by [`Self::update_belief_with_evidence`].
    ///
    /// Its profile can be swapped while the store is in use.
    #[must_use]
    pub fn estimator(&self) -> &Arc<dyn LikelihoodEstimator> {
        &self.estimator
    }

    fn read(&self, context: &'static str) -> CredenceResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| CredenceError::internal(format!("poisoned lock: {context}")))
    }

    fn write(&self, context: &'static str) -> CredenceResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| CredenceError::internal(format!("poisoned lock: {context}")))
    }

    /// Registers a new belief with the given prior.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if `prior_prob` is not in `[0, 1]`; nothing is registered.
    pub fn create_belief(&self, statement: impl Into<String>, prior_prob: f64) -> CredenceResult<Belief> {
        ValidationError::check_probability("prior probability", prior_prob)?;

        let mut state = self.write("belief.create")?;
        state.last_id += 1;
        let belief = Belief {
            id: BeliefId::from_sequence(state.last_id),
            statement: statement.into(),
            probability: prior_prob,
            prior_prob,
            evidence: Vec::new(),
            updated_at: Utc::now(),
            metadata: serde_json::Map::new(),
        };
        state.beliefs.insert(belief.id, belief.clone());
        drop(state);

        debug!(belief_id = %belief.id, prior = prior_prob, "belief created");
        Ok(belief)
    }

    /// Applies a full Bayesian update with both conditional likelihoods.
    ///
    /// When the likelihoods are equal (within [`crate::belief::UNINFORMATIVE_TOLERANCE`])
    /// the probability is left unchanged, the evidence ID is still recorded
    /// and the belief is tagged `last_update_uninformative = true`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if either likelihood is not in `[0, 1]`
    /// - `NotFound` if the belief does not exist
    pub fn update_belief_full(
        &self,
        belief_id: BeliefId,
        evidence_id: impl Into<String>,
        likelihood_if_true: f64,
        likelihood_if_false: f64,
    ) -> CredenceResult<Belief> {
        ValidationError::check_probability("P(E|H)", likelihood_if_true)?;
        ValidationError::check_probability("P(E|¬H)", likelihood_if_false)?;
        let likelihoods = Likelihoods {
            if_true: likelihood_if_true,
            if_false: likelihood_if_false,
        };
        let evidence_id = evidence_id.into();

        let mut state = self.write("belief.update")?;
        let belief = state
            .beliefs
            .get_mut(&belief_id)
            .ok_or_else(|| CredenceError::not_found("Belief", belief_id))?;

        let prior = belief.probability;
        let outcome = bayes_update(prior, likelihoods);
        belief.probability = outcome.probability(prior);
        belief.evidence.push(evidence_id.clone());
        belief.updated_at = Utc::now();

        let uninformative = outcome == BayesOutcome::Uninformative;
        belief.metadata.insert(
            META_LAST_UPDATE_UNINFORMATIVE.to_string(),
            JsonValue::Bool(uninformative),
        );
        if uninformative {
            belief.metadata.insert(
                META_UNINFORMATIVE_REASON.to_string(),
                JsonValue::String("likelihoods_equal".to_string()),
            );
        } else {
            belief.metadata.remove(META_UNINFORMATIVE_REASON);
        }
        let updated = belief.clone();
        drop(state);

        match outcome {
            BayesOutcome::Uninformative => warn!(
                belief_id = %belief_id,
                evidence_id = %evidence_id,
                p_e_given_h = likelihood_if_true,
                p_e_given_not_h = likelihood_if_false,
                "uninformative evidence: likelihoods equal, prior kept"
            ),
            BayesOutcome::ImpossibleEvidence => debug!(
                belief_id = %belief_id,
                evidence_id = %evidence_id,
                "evidence impossible under both hypotheses, prior kept"
            ),
            BayesOutcome::Updated(posterior) => debug!(
                belief_id = %belief_id,
                evidence_id = %evidence_id,
                prior,
                posterior,
                "belief updated"
            ),
        }

        Ok(updated)
    }

    /// Updates a belief from an evidence object.
    ///
    /// This is the only path that turns evidence into likelihoods; it uses the
    /// store's [`LikelihoodEstimator`] and then [`Self::update_belief_full`].
    ///
    /// # Errors
    ///
    /// - `NotFound` if the belief does not exist
    /// - `InvalidInput` / `Configuration` from the estimator
    pub fn update_belief_with_evidence(&self, belief_id: BeliefId, evidence: &Evidence) -> CredenceResult<Belief> {
        if !self.read("belief.update_with_evidence")?.beliefs.contains_key(&belief_id) {
            return Err(CredenceError::not_found("Belief", belief_id));
        }

        let likelihoods = self.estimator.estimate_likelihoods(evidence)?;
        self.update_belief_full(belief_id, evidence.id.clone(), likelihoods.if_true, likelihoods.if_false)
    }

    /// Returns a snapshot of a belief.
    ///
    /// # Errors
    ///
    /// `NotFound` if the belief does not exist.
    pub fn get_belief(&self, belief_id: BeliefId) -> CredenceResult<Belief> {
        self.read("belief.get")?
            .beliefs
            .get(&belief_id)
            .cloned()
            .ok_or_else(|| CredenceError::not_found("Belief", belief_id))
    }

    /// Returns snapshots of all beliefs in creation order.
    pub fn list_beliefs(&self) -> CredenceResult<Vec<Belief>> {
        let mut beliefs: Vec<Belief> = self.read("belief.list")?.beliefs.values().cloned().collect();
        beliefs.sort_by_key(|b| b.id);
        Ok(beliefs)
    }

    /// Number of registered beliefs.
    pub fn len(&self) -> CredenceResult<usize> {
        Ok(self.read("belief.len")?.beliefs.len())
    }

    /// Returns true if no beliefs are registered.
    pub fn is_empty(&self) -> CredenceResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Combines independent beliefs.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `belief_ids` is empty
    /// - `NotFound` for the first missing belief
    pub fn combine_beliefs(&self, belief_ids: &[BeliefId], op: CombineOp) -> CredenceResult<f64> {
        if belief_ids.is_empty() {
            return Err(ValidationError::EmptyCollection { field: "belief ids" }.into());
        }

        let probabilities = {
            let state = self.read("belief.combine")?;
            belief_ids
                .iter()
                .map(|id| {
                    state
                        .beliefs
                        .get(id)
                        .map(|b| b.probability)
                        .ok_or_else(|| CredenceError::not_found("Belief", id))
                })
                .collect::<CredenceResult<Vec<f64>>>()?
        };

        let result = combine_probabilities(op, probabilities).clamp(0.0, 1.0);
        debug!(op = %op, count = belief_ids.len(), result, "beliefs combined");
        Ok(result)
    }

    /// Combines beliefs with an operator given by name (`"and"` / `"or"`).
    ///
    /// # Errors
    ///
    /// As [`Self::combine_beliefs`], plus `UnsupportedOperation` for an unknown operator.
    pub fn combine_beliefs_named(&self, belief_ids: &[BeliefId], operation: &str) -> CredenceResult<f64> {
        if belief_ids.is_empty() {
            return Err(ValidationError::EmptyCollection { field: "belief ids" }.into());
        }
        let op: CombineOp = operation.parse()?;
        self.combine_beliefs(belief_ids, op)
    }

    /// Confidence in a conclusion from a body of evidence.
    ///
    /// See [`estimate_confidence`].
    #[must_use]
    pub fn estimate_confidence(&self, evidence: &[Evidence]) -> f64 {
        estimate_confidence(evidence)
    }

    /// Writes every belief to a record store.
    ///
    /// Snapshots are taken under the read lock; the store is written after it is released.
    pub fn save_to(&self, records: &dyn RecordStore) -> CredenceResult<usize> {
        let beliefs = self.list_beliefs()?;
        for belief in &beliefs {
            let value = serde_json::to_value(belief).map_err(crate::storage::StorageError::from)?;
            records.put(RecordKind::Belief, &belief.id.to_string(), value)?;
        }
        debug!(count = beliefs.len(), "beliefs saved");
        Ok(beliefs.len())
    }

    /// Rebuilds a store from persisted beliefs.
    ///
    /// New IDs continue after the highest restored ID.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if a record is malformed or violates the probability bounds.
    pub fn restore_from(
        records: &dyn RecordStore,
        estimator: Arc<dyn LikelihoodEstimator>,
    ) -> CredenceResult<Self> {
        let mut state = StoreState::default();
        for (key, value) in records.list(RecordKind::Belief)? {
            let belief: Belief = serde_json::from_value(value).map_err(|e| ValidationError::MalformedRecord {
                id: key.clone(),
                reason: e.to_string(),
            })?;
            belief.validate()?;
            state.last_id = state.last_id.max(belief.id.sequence());
            state.beliefs.insert(belief.id, belief);
        }
        debug!(count = state.beliefs.len(), "beliefs restored");

        Ok(Self {
            state: RwLock::new(state),
            estimator,
        })
    }
}
