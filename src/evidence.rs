//! Evidence: the external input that drives belief revision.
//!
//! Evidence is supplied by callers; the engine only reads its overall
//! quality score and polarity. The remaining fields are carried for
//! provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A scored piece of evidence for or against a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    pub content: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// true = supports the claim, false = refutes it.
    pub supports_claim: bool,

    /// Combined quality score in [0, 1].
    pub overall_score: f64,

    #[serde(default)]
    pub reliability: f64,

    #[serde(default)]
    pub relevance: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<String>,

    #[serde(default)]
    pub metadata: serde_json::Value,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Evidence {
    /// Creates supporting evidence with the given score.
    #[must_use]
    pub fn supporting(id: impl Into<String>, content: impl Into<String>, overall_score: f64) -> Self {
        Self::new(id, content, true, overall_score)
    }

    /// Creates refuting evidence with the given score.
    #[must_use]
    pub fn refuting(id: impl Into<String>, content: impl Into<String>, overall_score: f64) -> Self {
        Self::new(id, content, false, overall_score)
    }

    fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        supports_claim: bool,
        overall_score: f64,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source: String::new(),
            supports_claim,
            overall_score,
            reliability: overall_score,
            relevance: overall_score,
            claim_id: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Sets the source attribution.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Links the evidence to the claim it bears on.
    #[must_use]
    pub fn for_claim(mut self, claim_id: impl Into<String>) -> Self {
        self.claim_id = Some(claim_id.into());
        self
    }

    /// Validates the overall score.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::check_probability("evidence overall_score", self.overall_score)
    }
}

/// Estimates confidence in a conclusion from a body of evidence.
///
/// Returns the share of total evidence score contributed by supporting
/// evidence, or 0.5 when there is no evidence or the total score is zero.
#[must_use]
pub fn estimate_confidence(evidence: &[Evidence]) -> f64 {
    if evidence.is_empty() {
        return 0.5;
    }

    let mut supporting = 0.0;
    let mut refuting = 0.0;
    for ev in evidence {
        // Out-of-range scores are clamped, not rejected.
        let score = if ev.overall_score.is_finite() {
            ev.overall_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if ev.supports_claim {
            supporting += score;
        } else {
            refuting += score;
        }
    }

    let total = supporting + refuting;
    if total <= 0.0 {
        return 0.5;
    }
    (supporting / total).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_only_required_fields() {
        let before = Utc::now();
        let ev: Evidence = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "content": "lab report",
            "supports_claim": true,
            "overall_score": 0.8
        }))
        .unwrap();
        assert!(ev.created_at >= before);
        assert!(ev.source.is_empty());
        assert!((estimate_confidence(&[ev]) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_evidence_is_neutral() {
        assert!((estimate_confidence(&[]) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_scores_are_neutral() {
        let ev = vec![
            Evidence::supporting("e1", "a", 0.0),
            Evidence::refuting("e2", "b", 0.0),
        ];
        assert!((estimate_confidence(&ev) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn confidence_is_supporting_share() {
        let ev = vec![
            Evidence::supporting("e1", "trial A", 0.9),
            Evidence::supporting("e2", "trial B", 0.3),
            Evidence::refuting("e3", "trial C", 0.3),
        ];
        let c = estimate_confidence(&ev);
        assert!((c - 0.8).abs() < 1e-12);
    }

    #[test]
    fn only_refuting_gives_zero() {
        let ev = vec![Evidence::refuting("e1", "x", 0.7)];
        assert!(estimate_confidence(&ev).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_bad_score() {
        assert!(Evidence::supporting("e", "x", 1.2).validate().is_err());
        assert!(Evidence::supporting("e", "x", f64::NAN).validate().is_err());
        assert!(Evidence::supporting("e", "x", 0.4).validate().is_ok());
    }

    #[test]
    fn builders_set_provenance() {
        let ev = Evidence::supporting("e1", "x", 0.5)
            .with_source("journal")
            .for_claim("belief-1");
        assert_eq!(ev.source, "journal");
        assert_eq!(ev.claim_id.as_deref(), Some("belief-1"));
        assert!(ev.supports_claim);
    }
}
