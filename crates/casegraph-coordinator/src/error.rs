//! Error types for coordinator operations

use casegraph_domain::{CaseId, EntityId};
use casegraph_store::StoreError;
use thiserror::Error;

/// Errors that can occur while staging, querying, committing or clearing
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// A different class is already committed under this identifier
    #[error("Identifier collision: {0} is already committed with different content")]
    IdentifierCollision(String),

    /// A durable write failed; the operation was rolled back
    #[error("Storage write failed and was rolled back: {0}")]
    StorageWriteFailure(String),

    /// Lock contention or document version mismatch outlasted the retry budget
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// A case tried to act on an entity staged only by another case
    #[error("Case {case_id} cannot access {entity_id}: it is staged by another case")]
    VisibilityViolation {
        /// Requesting case
        case_id: CaseId,
        /// Entity that belongs to another case
        entity_id: EntityId,
    },

    /// Candidate rejected at the staging boundary
    #[error("Candidate {identifier} rejected: {}", reasons.join("; "))]
    Validation {
        /// Candidate identifier
        identifier: String,
        /// Human-readable rejection reasons
        reasons: Vec<String>,
    },

    /// Entity not staged by any case
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-transient store error
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Restoring the pre-operation snapshot failed too
    #[error("Rollback failed after error ({original}): {rollback}")]
    RollbackFailed {
        /// The error that triggered the rollback
        original: String,
        /// The error raised while rolling back
        rollback: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The blocking task running an operation panicked or was aborted
    #[error("Task failed: {0}")]
    Task(String),
}

impl CoordinatorError {
    /// Whether the caller may retry the whole operation later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoordinatorError::ConcurrencyConflict(_) | CoordinatorError::StorageWriteFailure(_)
        )
    }

    /// Map an error raised on a durable write path
    ///
    /// Version mismatches are concurrency conflicts; anything else failed the write.
    pub fn write_failure(e: StoreError) -> Self {
        match e {
            StoreError::VersionConflict { .. } => CoordinatorError::ConcurrencyConflict(e.to_string()),
            other => CoordinatorError::StorageWriteFailure(other.to_string()),
        }
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::IdentifierCollision(id) => CoordinatorError::IdentifierCollision(id),
            StoreError::VersionConflict { .. } => CoordinatorError::ConcurrencyConflict(e.to_string()),
            StoreError::NotFound(what) => CoordinatorError::NotFound(what),
            other => CoordinatorError::Store(other),
        }
    }
}

impl From<tokio::task::JoinError> for CoordinatorError {
    fn from(e: tokio::task::JoinError) -> Self {
        CoordinatorError::Task(e.to_string())
    }
}
