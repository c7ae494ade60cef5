//! Casegraph Storage Layer
//!
//! Two-tier storage for staged and committed entities.
//!
//! # Architecture
//!
//! - SQLite for the mutable per-case staging workspace ([`SqliteStagingStore`])
//! - Versioned JSON documents for committed entities ([`PermanentStore`]):
//!   one shared classes document, one individuals document per case
//! - Local embedding model and HNSW index for duplicate candidate search
//!
//! # Examples
//!
//! ```no_run
//! use casegraph_store::{PermanentStore, SqliteStagingStore};
//!
//! let staging = SqliteStagingStore::new(":memory:").unwrap();
//! let permanent = PermanentStore::open("data/documents").unwrap();
//! // Stores are now ready to be handed to the coordinator
//! ```

#![warn(missing_docs)]

pub mod documents;
pub mod embedding;
pub mod permanent;
pub mod staging;
pub mod vector_index;

pub use documents::{DocumentBackend, DocumentKey, DocumentVersion, FsBackend, MemoryBackend, WriterLock};
pub use permanent::{ClassesDocument, DocumentSnapshot, IndividualsDocument, PermanentStore, RetractOutcome};
pub use staging::SqliteStagingStore;

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity or document not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Identifier already present in the target document
    #[error("Identifier already committed: {0}")]
    IdentifierCollision(String),

    /// Staging row is committed and can no longer be replaced
    #[error("Entity already committed for this case: {0}")]
    AlreadyCommitted(String),

    /// Document head moved since it was loaded
    #[error("Version conflict on {document}: expected head {expected}, found {actual}")]
    VersionConflict {
        /// Document name
        document: String,
        /// Head version the writer loaded
        expected: u64,
        /// Head version found at write time
        actual: u64,
    },

    /// A lock guarding in-memory state was poisoned
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    /// Whether retrying the operation may succeed
    ///
    /// Interrupted or timed-out I/O and busy/locked SQLite databases are
    /// transient; everything else is surfaced immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            StoreError::Database(e) => matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }
}
