//! Gatekeeper error types

use casegraph_store::embedding::EmbeddingError;
use casegraph_store::vector_index::VectorIndexError;
use casegraph_store::StoreError;
use thiserror::Error;

/// Errors that can occur during gatekeeper operations
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Store error while reading committed entities
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Embedding failure
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector index failure
    #[error("Vector index error: {0}")]
    VectorIndex(#[from] VectorIndexError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
