//! Prompt rendering and generator output parsing.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::abductive::engine::GenerateRequest;
use crate::abductive::{Hypothesis, Observation};
use crate::error::UpstreamError;

/// Prior assigned to candidates that do not state one.
pub const DEFAULT_CANDIDATE_PRIOR: f64 = 0.5;

const EXCERPT_CHARS: usize = 200;

static FENCE: OnceLock<Option<Regex>> = OnceLock::new();

fn fence_regex() -> Option<&'static Regex> {
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").ok())
        .as_ref()
}

/// Returns the contents of the first fenced code block, or the trimmed input.
#[must_use]
pub fn strip_code_fence(response: &str) -> &str {
    fence_regex()
        .and_then(|re| re.captures(response))
        .and_then(|caps| caps.get(1))
        .map_or(response, |m| m.as_str())
        .trim()
}

/// Renders the generation prompt for a request.
///
/// `max_hypotheses` is the already-resolved count the generator is asked for.
#[must_use]
pub fn render_prompt(
    request: &GenerateRequest,
    max_hypotheses: usize,
    themes: &[String],
    temporal_pattern: bool,
) -> String {
    let mut prompt = String::from(
        "You are an expert at abductive reasoning: generating plausible explanations for observations.\n\n\
         Given these observations:\n",
    );

    for (i, obs) in request.observations.iter().enumerate() {
        let _ = write!(prompt, "{}. {}", i + 1, obs.description);
        if obs.confidence > 0.0 {
            let _ = write!(prompt, " (confidence: {:.2})", obs.confidence);
        }
        if let Some(context) = obs.context.as_deref().filter(|c| !c.is_empty()) {
            let _ = write!(prompt, " [{context}]");
        }
        prompt.push('\n');
    }

    if let Some(context) = request.context.as_deref().filter(|c| !c.is_empty()) {
        let _ = write!(prompt, "\nContext: {context}\n");
    }
    if !themes.is_empty() {
        let _ = write!(prompt, "\nRecurring themes: {}\n", themes.join(", "));
    }
    if temporal_pattern {
        prompt.push_str("\nThe observations occur at regular intervals; consider periodic causes.\n");
    }

    let _ = write!(
        prompt,
        "\nGenerate {max_hypotheses} distinct, domain-specific hypotheses that could explain these observations.\n"
    );
    prompt.push_str(
        "\nFor each hypothesis, provide:\n\
         1. A clear, specific explanation\n\
         2. Assumptions required for this explanation to hold\n\
         3. Testable predictions this hypothesis makes\n\
         4. Parsimony score (0-1, higher = simpler)\n\
         5. Prior probability (0-1, how likely before evidence)\n\
         6. Which observations it explains, by number\n",
    );
    if request.require_testable {
        prompt.push_str("\nEvery hypothesis must make at least one testable prediction.\n");
    }
    prompt.push_str(
        "\nReturn ONLY valid JSON in this format:\n\
         {\n\
         \x20 \"hypotheses\": [\n\
         \x20   {\n\
         \x20     \"description\": \"specific explanation here\",\n\
         \x20     \"assumptions\": [\"assumption 1\"],\n\
         \x20     \"predictions\": [\"testable prediction 1\"],\n\
         \x20     \"parsimony\": 0.7,\n\
         \x20     \"prior_probability\": 0.5,\n\
         \x20     \"explains\": [1, 2]\n\
         \x20   }\n\
         \x20 ]\n\
         }\n",
    );
    prompt
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExplainRef {
    Position(f64),
    Id(String),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct Candidate {
    description: String,
    #[serde(default)]
    assumptions: Vec<String>,
    #[serde(default)]
    predictions: Vec<String>,
    #[serde(default)]
    parsimony: Option<f64>,
    #[serde(default)]
    prior_probability: Option<f64>,
    #[serde(default)]
    explains: Vec<ExplainRef>,
}

fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}

fn malformed(reason: impl Into<String>, text: &str) -> UpstreamError {
    UpstreamError::MalformedOutput {
        reason: reason.into(),
        excerpt: excerpt(text),
    }
}

/// Zero-based index for a 1-based position; `None` unless `n` is a whole number >= 1.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
fn position_index(n: f64) -> Option<usize> {
    if n.is_finite() && n >= 1.0 && n.fract() == 0.0 {
        Some(n as usize - 1)
    } else {
        None
    }
}

/// Resolves `explains` entries to observation IDs.
///
/// Numbers are 1-based positions. An empty or unresolvable list means the
/// candidate explains every observation.
fn resolve_explained(refs: &[ExplainRef], observations: &[Observation]) -> Vec<String> {
    let resolved: Vec<String> = refs
        .iter()
        .filter_map(|r| match r {
            ExplainRef::Position(n) => position_index(*n)
                .and_then(|i| observations.get(i))
                .map(|o| o.id.clone()),
            ExplainRef::Id(id) => observations.iter().find(|o| &o.id == id).map(|o| o.id.clone()),
            ExplainRef::Other(_) => None,
        })
        .collect();

    if resolved.is_empty() {
        if !refs.is_empty() {
            debug!(refs = refs.len(), "no explained observation resolved; assuming all");
        }
        return observations.iter().map(|o| o.id.clone()).collect();
    }
    resolved
}

fn in_unit_range(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

fn into_hypothesis(candidate: Candidate, observations: &[Observation]) -> Option<Hypothesis> {
    let description = candidate.description.trim();
    if description.is_empty() {
        warn!("dropping generated hypothesis with empty description");
        return None;
    }

    let prior = candidate.prior_probability.unwrap_or(DEFAULT_CANDIDATE_PRIOR);
    if !in_unit_range(prior) {
        warn!(description, prior, "dropping generated hypothesis with out-of-range prior");
        return None;
    }
    if let Some(p) = candidate.parsimony {
        if !p.is_finite() || p > 1.0 {
            warn!(description, parsimony = p, "dropping generated hypothesis with out-of-range parsimony");
            return None;
        }
    }

    let mut hypothesis = Hypothesis::new(description, prior)
        .explaining(resolve_explained(&candidate.explains, observations))
        .with_assumptions(candidate.assumptions)
        .with_predictions(candidate.predictions);

    // A stated score replaces the computed one; zero or below means "not given".
    if let Some(p) = candidate.parsimony.filter(|p| *p > 0.0) {
        hypothesis.parsimony = p;
    }
    hypothesis
        .metadata
        .insert("source".to_string(), Value::String("generator".to_string()));
    Some(hypothesis)
}

/// Parses generator output into proposed hypotheses.
///
/// Accepts `{"hypotheses": [...]}` or a bare array, optionally fenced.
/// Individual candidates that are malformed or out of range are dropped.
///
/// # Errors
///
/// `MalformedOutput` if the text is not JSON of either accepted shape.
pub fn parse_candidates(response: &str, observations: &[Observation]) -> Result<Vec<Hypothesis>, UpstreamError> {
    let body = strip_code_fence(response);
    let parsed: Value = serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {e}"), body))?;

    let items = match parsed {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("hypotheses") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(malformed("'hypotheses' is not an array", body)),
            None => return Err(malformed("missing 'hypotheses' field", body)),
        },
        _ => return Err(malformed("expected an object or array", body)),
    };

    let total = items.len();
    let hypotheses: Vec<Hypothesis> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Candidate>(item) {
            Ok(candidate) => into_hypothesis(candidate, observations),
            Err(e) => {
                warn!(error = %e, "dropping malformed generated hypothesis");
                None
            }
        })
        .collect();

    debug!(candidates = total, accepted = hypotheses.len(), "parsed generator output");
    Ok(hypotheses)
}
