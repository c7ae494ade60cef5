//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Staging, query, commit or reconcile error
    #[error(transparent)]
    Coordinator(#[from] casegraph_coordinator::CoordinatorError),

    /// Clear error
    #[error(transparent)]
    Janitor(#[from] casegraph_janitor::JanitorError),

    /// Duplicate search error
    #[error("Duplicate search error: {0}")]
    Gatekeeper(#[from] casegraph_gatekeeper::GatekeeperError),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] casegraph_store::StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
