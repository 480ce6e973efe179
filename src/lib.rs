//! # Credence - Probabilistic Belief Revision and Abductive Reasoning
//!
//! Credence keeps a set of probabilistic beliefs, revises them with Bayes'
//! rule as evidence arrives, combines independent beliefs, and generates and
//! ranks candidate explanations for observations.
//!
//! ## Core Concepts
//!
//! - **Belief**: A statement with a current probability, its original prior and the evidence applied to it
//! - **Evidence**: An externally scored input that supports or refutes a claim
//! - **Likelihood estimation**: Maps evidence quality to `P(E|H)` and `P(E|¬H)` through a swappable profile
//! - **Abduction**: Inference to the best explanation; hypotheses are generated externally and ranked here
//!
//! ## Usage
//!
//! ```rust,ignore
//! use credence::{BeliefStore, CombineOp, Evidence};
//!
//! let store = BeliefStore::new();
//! let belief = store.create_belief("The bridge is structurally sound", 0.5)?;
//!
//! // Direct update with explicit likelihoods
//! let belief = store.update_belief_full(belief.id, "inspection-1", 0.8, 0.2)?;
//!
//! // Update from scored evidence via the store's estimator
//! let evidence = Evidence::supporting("survey-7", "Load test passed", 0.9);
//! let belief = store.update_belief_with_evidence(belief.id, &evidence)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod abductive;
pub mod belief;
pub mod config;
pub mod error;
pub mod evidence;
pub mod likelihood;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use abductive::{
    AbductiveEngine, AbductiveInference, CancellationToken, EvaluationMethod, GenerateRequest,
    GenerationContext, Hypothesis, HypothesisGenerator, HypothesisId, HypothesisStatus, Observation,
    RankedHypothesis,
};
pub use belief::{Belief, BeliefId, BeliefStore, CombineOp};
pub use config::{AbductiveConfig, EvaluationWeights};
pub use error::{ConfigurationError, CredenceError, CredenceResult, UpstreamError, ValidationError};
pub use evidence::Evidence;
pub use likelihood::{
    AnecdotalProfile, CustomProfile, DefaultProfile, EvidenceProfile, LikelihoodEstimator, Likelihoods,
    ProfileParameters, ScientificProfile, StandardEstimator,
};
pub use storage::{InMemoryRecordStore, RecordKind, RecordStore, StorageError};
