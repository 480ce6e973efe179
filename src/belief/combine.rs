//! Combination of independent beliefs.
//!
//! Beliefs are treated as statistically independent events. This is not a
//! general joint model: correlated beliefs will be over- or under-counted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CredenceError;

/// Logical operator for combining beliefs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineOp {
    /// `P(A ∧ B) = P(A)·P(B)`; never exceeds the smallest input.
    And,
    /// `P(A ∨ B) = 1 − (1 − P(A))·(1 − P(B))`; never below the largest input.
    Or,
}

impl CombineOp {
    const SUPPORTED: &'static str = "and, or";
}

impl fmt::Display for CombineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
        }
    }
}

impl FromStr for CombineOp {
    type Err = CredenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(CredenceError::UnsupportedOperation {
                operation: other.to_string(),
                supported: Self::SUPPORTED,
            }),
        }
    }
}

/// Combines probabilities under the independence assumption.
///
/// An empty iterator yields the identity of the operator (1 for `And`, 0 for `Or`).
pub fn combine_probabilities<I>(op: CombineOp, probabilities: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    match op {
        CombineOp::And => probabilities.into_iter().product(),
        CombineOp::Or => 1.0 - probabilities.into_iter().map(|p| 1.0 - p).product::<f64>(),
    }
}
