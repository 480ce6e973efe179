//! Abstract persistence contract for Credence.
//!
//! The reasoning core never requires persistence. Embedding applications that
//! want beliefs or hypotheses to survive restarts inject a [`RecordStore`]
//! and call the explicit save/restore helpers.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CredenceError;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<StorageError> for CredenceError {
    fn from(err: StorageError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Kind of record held by a [`RecordStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Belief,
    Hypothesis,
    Inference,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Belief => write!(f, "belief"),
            Self::Hypothesis => write!(f, "hypothesis"),
            Self::Inference => write!(f, "inference"),
        }
    }
}

/// Key/value persistence keyed by record kind and id.
///
/// # Safety Considerations
/// - `put` overwrites any existing value for the same key
/// - Implementations should handle concurrent access safely
pub trait RecordStore: Send + Sync {
    /// Insert or replace a record.
    fn put(&self, kind: RecordKind, id: &str, value: serde_json::Value) -> Result<(), StorageError>;

    /// Get a record by kind and id.
    fn get(&self, kind: RecordKind, id: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// List all records of a kind as `(id, value)` pairs, ordered by id.
    fn list(&self, kind: RecordKind) -> Result<Vec<(String, serde_json::Value)>, StorageError>;
}
