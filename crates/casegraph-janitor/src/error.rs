//! Error types for Janitor operations

use casegraph_coordinator::CoordinatorError;
use casegraph_store::StoreError;
use thiserror::Error;

/// Errors that can occur during clear operations
#[derive(Error, Debug)]
pub enum JanitorError {
    /// Locking, write or rollback failure
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// Storage layer error outside a write path
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The blocking task panicked or was aborted
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for JanitorError {
    fn from(e: tokio::task::JoinError) -> Self {
        JanitorError::Worker(e.to_string())
    }
}
