//! The abductive engine: generation, evaluation and the end-to-end pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::abductive::evaluation::{self, EvaluationMethod};
use crate::abductive::generator::{call_with_deadline, GenerationContext, HypothesisGenerator};
use crate::abductive::{prompt, themes, AbductiveInference, Hypothesis, Observation, RankedHypothesis};
use crate::config::{AbductiveConfig, EvaluationWeights};
use crate::error::{CredenceResult, UpstreamError, ValidationError};

/// Input to hypothesis generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub observations: Vec<Observation>,

    /// 0 means the engine default.
    #[serde(default)]
    pub max_hypotheses: usize,

    /// Candidates below this parsimony are discarded.
    #[serde(default)]
    pub min_parsimony: f64,

    /// Discard candidates without testable predictions.
    #[serde(default)]
    pub require_testable: bool,

    /// Free-form domain hint passed to the generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl GenerateRequest {
    #[must_use]
    pub fn new(observations: Vec<Observation>) -> Self {
        Self {
            observations,
            max_hypotheses: 0,
            min_parsimony: 0.0,
            require_testable: false,
            context: None,
        }
    }

    #[must_use]
    pub fn with_max_hypotheses(mut self, max: usize) -> Self {
        self.max_hypotheses = max;
        self
    }

    #[must_use]
    pub fn with_min_parsimony(mut self, min: f64) -> Self {
        self.min_parsimony = min;
        self
    }

    #[must_use]
    pub fn require_testable(mut self, required: bool) -> Self {
        self.require_testable = required;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.observations.is_empty() {
            return Err(ValidationError::EmptyCollection { field: "observations" });
        }
        for obs in &self.observations {
            obs.validate()?;
        }
        ValidationError::check_probability("min_parsimony", self.min_parsimony)
    }
}

/// Generates and ranks explanations for observations.
///
/// The engine holds no per-request state and can be shared across threads.
pub struct AbductiveEngine {
    generator: Option<Arc<dyn HypothesisGenerator>>,
    config: AbductiveConfig,
}

impl std::fmt::Debug for AbductiveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbductiveEngine")
            .field("generator", &self.generator.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl AbductiveEngine {
    /// Creates an engine backed by `generator`.
    ///
    /// # Errors
    ///
    /// `Configuration` if `config` fails validation.
    pub fn new(generator: Arc<dyn HypothesisGenerator>, config: AbductiveConfig) -> CredenceResult<Self> {
        config.validate()?;
        Ok(Self {
            generator: Some(generator),
            config,
        })
    }

    /// Creates an engine that can only evaluate.
    ///
    /// # Errors
    ///
    /// `Configuration` if `config` fails validation.
    pub fn without_generator(config: AbductiveConfig) -> CredenceResult<Self> {
        config.validate()?;
        Ok(Self {
            generator: None,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AbductiveConfig {
        &self.config
    }

    #[must_use]
    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    fn resolve_max(&self, requested: usize) -> usize {
        if requested == 0 {
            self.config.default_max_hypotheses
        } else {
            requested
        }
    }

    fn generator_timeout(&self, ctx: &GenerationContext) -> Duration {
        ctx.timeout()
            .unwrap_or_else(|| Duration::from_millis(self.config.generator_timeout_ms))
    }

    /// Asks the generator for candidate explanations.
    ///
    /// Candidates below `min_parsimony`, or without predictions when
    /// `require_testable` is set, are discarded. The rest are ordered by
    /// parsimony then prior, both descending, and truncated to
    /// `max_hypotheses`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for empty observations or out-of-range confidences
    /// - `Upstream` if no generator is configured, the call fails, times out,
    ///   is cancelled, or returns unparseable output
    pub fn generate_hypotheses(
        &self,
        ctx: &GenerationContext,
        request: &GenerateRequest,
    ) -> CredenceResult<Vec<Hypothesis>> {
        request.validate()?;
        let generator = self.generator.as_ref().ok_or(UpstreamError::NotConfigured)?;

        let max = self.resolve_max(request.max_hypotheses);
        let themes = themes::find_common_themes(&request.observations);
        let temporal = themes::has_temporal_pattern(&request.observations);
        let rendered = prompt::render_prompt(request, max, &themes, temporal);

        let response = call_with_deadline(generator, ctx, rendered, self.generator_timeout(ctx))?;
        let candidates = prompt::parse_candidates(&response, &request.observations)?;
        let proposed = candidates.len();

        let mut hypotheses: Vec<Hypothesis> = candidates
            .into_iter()
            .filter(|h| h.parsimony >= request.min_parsimony)
            .filter(|h| !request.require_testable || h.is_testable())
            .collect();

        hypotheses.sort_by(|a, b| {
            b.parsimony
                .total_cmp(&a.parsimony)
                .then_with(|| b.prior_probability.total_cmp(&a.prior_probability))
        });
        hypotheses.truncate(max);

        debug!(
            observations = request.observations.len(),
            proposed,
            kept = hypotheses.len(),
            max,
            "hypotheses generated"
        );
        Ok(hypotheses)
    }

    /// Ranks hypotheses against observations. See [`evaluation::evaluate_hypotheses`].
    ///
    /// # Errors
    ///
    /// As [`evaluation::evaluate_hypotheses`].
    pub fn evaluate_hypotheses(
        &self,
        observations: &[Observation],
        hypotheses: &[Hypothesis],
        method: EvaluationMethod,
        weights: Option<&EvaluationWeights>,
    ) -> CredenceResult<Vec<RankedHypothesis>> {
        evaluation::evaluate_hypotheses(observations, hypotheses, method, weights)
    }

    /// Generates, evaluates and selects the best explanation.
    ///
    /// Uses the configured parsimony floor and the combined method with the
    /// configured weights.
    ///
    /// # Errors
    ///
    /// As [`Self::generate_hypotheses`], plus `InvalidInput` when no
    /// hypothesis survives generation.
    pub fn perform_abductive_inference(
        &self,
        ctx: &GenerationContext,
        observations: &[Observation],
        max_hypotheses: usize,
    ) -> CredenceResult<AbductiveInference> {
        let request = GenerateRequest::new(observations.to_vec())
            .with_max_hypotheses(max_hypotheses)
            .with_min_parsimony(self.config.inference_min_parsimony);

        let hypotheses = self.generate_hypotheses(ctx, &request)?;
        let method = EvaluationMethod::Combined;

        if hypotheses.is_empty() {
            warn!(
                observations = observations.len(),
                "no hypotheses survived generation"
            );
        }
        let ranked = self.evaluate_hypotheses(observations, &hypotheses, method, Some(&self.config.weights))?;

        let best = ranked.first().cloned();
        let confidence = best.as_ref().map_or(0.0, |b| b.posterior_probability);

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "themes".to_string(),
            Value::from(themes::find_common_themes(observations)),
        );
        metadata.insert(
            "temporal_pattern".to_string(),
            Value::Bool(themes::has_temporal_pattern(observations)),
        );

        let inference = AbductiveInference {
            id: uuid::Uuid::new_v4(),
            observations: observations.to_vec(),
            hypotheses,
            best_hypothesis: best,
            ranked_hypotheses: ranked,
            method,
            confidence,
            timestamp: Utc::now(),
            metadata,
        };

        info!(
            inference = %inference.id,
            observations = observations.len(),
            hypotheses = inference.hypotheses.len(),
            confidence,
            "abductive inference complete"
        );
        Ok(inference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abductive::generator::FixedResponseGenerator;

    const RESPONSE: &str = r#"{"hypotheses": [
        {"description": "Overloaded circuit", "assumptions": ["old wiring"],
         "predictions": ["breaker trips under load"], "parsimony": 0.6, "prior_probability": 0.4},
        {"description": "Failing transformer", "assumptions": ["utility fault"],
         "predictions": [], "parsimony": 0.8, "prior_probability": 0.2},
        {"description": "Loose neutral", "assumptions": ["a", "b", "c"],
         "predictions": ["voltage swings"], "parsimony": 0.2, "prior_probability": 0.5},
        {"description": "Ghosts", "assumptions": [],
         "predictions": ["cold spots"], "parsimony": 0.8, "prior_probability": 0.6}
    ]}"#;

    fn engine(response: &str) -> AbductiveEngine {
        AbductiveEngine::new(
            Arc::new(FixedResponseGenerator::new(response)),
            AbductiveConfig::default(),
        )
        .unwrap()
    }

    fn observations() -> Vec<Observation> {
        vec![
            Observation::new("Lights flicker at dusk", 0.9).with_id("o1"),
            Observation::new("Breaker trips weekly", 0.7).with_id("o2"),
        ]
    }

    #[test]
    fn generation_filters_sorts_and_truncates() {
        let engine = engine(RESPONSE);
        let request = GenerateRequest::new(observations())
            .with_min_parsimony(0.3)
            .with_max_hypotheses(2);
        let hs = engine.generate_hypotheses(&GenerationContext::new(), &request).unwrap();
        let names: Vec<&str> = hs.iter().map(|h| h.description.as_str()).collect();
        // Equal parsimony broken by higher prior; "Loose neutral" is below the floor.
        assert_eq!(names, vec!["Ghosts", "Failing transformer"]);
    }

    #[test]
    fn generation_can_require_testable() {
        let engine = engine(RESPONSE);
        let request = GenerateRequest::new(observations()).require_testable(true);
        let hs = engine.generate_hypotheses(&GenerationContext::new(), &request).unwrap();
        assert!(hs.iter().all(Hypothesis::is_testable));
        assert_eq!(hs.len(), 3);
    }

    #[test]
    fn zero_max_uses_default() {
        let engine = engine(RESPONSE);
        let hs = engine
            .generate_hypotheses(&GenerationContext::new(), &GenerateRequest::new(observations()))
            .unwrap();
        assert_eq!(hs.len(), AbductiveConfig::default().default_max_hypotheses);
    }

    #[test]
    fn input_validated_before_generator() {
        let engine = AbductiveEngine::without_generator(AbductiveConfig::default()).unwrap();
        let err = engine
            .generate_hypotheses(&GenerationContext::new(), &GenerateRequest::new(Vec::new()))
            .unwrap_err();
        assert!(err.is_invalid_input());

        let err = engine
            .generate_hypotheses(&GenerationContext::new(), &GenerateRequest::new(observations()))
            .unwrap_err();
        assert!(err.is_upstream());
        assert!(!engine.has_generator());
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = AbductiveConfig::default();
        config.weights.parsimony = 0.9;
        let err = AbductiveEngine::without_generator(config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn inference_selects_best() {
        let engine = engine(RESPONSE);
        let inference = engine
            .perform_abductive_inference(&GenerationContext::new(), &observations(), 5)
            .unwrap();
        assert_eq!(inference.hypotheses.len(), 3);
        assert_eq!(inference.method, EvaluationMethod::Combined);
        let best = inference.best_hypothesis.as_ref().unwrap();
        assert_eq!(best.rank, 1);
        assert!((inference.confidence - best.posterior_probability).abs() < 1e-12);
        assert!(inference.metadata.contains_key("themes"));
        assert_eq!(inference.metadata.get("temporal_pattern"), Some(&Value::Bool(false)));
    }

    #[test]
    fn inference_with_nothing_generated_is_invalid_input() {
        let engine = engine(r#"{"hypotheses": []}"#);
        let err = engine
            .perform_abductive_inference(&GenerationContext::new(), &observations(), 3)
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(err.to_string().contains("hypotheses"));

        // Everything below the configured parsimony floor behaves the same.
        let engine = self::engine(
            r#"{"hypotheses": [{"description": "Ghosts", "predictions": ["cold spots"], "parsimony": 0.1}]}"#,
        );
        let err = engine
            .perform_abductive_inference(&GenerationContext::new(), &observations(), 3)
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn min_parsimony_must_be_a_score() {
        let engine = engine(RESPONSE);
        for bad in [1.5, -0.2] {
            let request = GenerateRequest::new(observations()).with_min_parsimony(bad);
            let err = engine
                .generate_hypotheses(&GenerationContext::new(), &request)
                .unwrap_err();
            assert!(err.is_invalid_input());
            assert!(err.to_string().contains("min_parsimony"));
        }

        let request = GenerateRequest::new(observations()).with_min_parsimony(1.0);
        assert!(engine.generate_hypotheses(&GenerationContext::new(), &request).is_ok());
    }
}
