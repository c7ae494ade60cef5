//! Casegraph Domain Layer
//!
//! Core data model for the entity staging-and-commit subsystem. Everything
//! else in the workspace depends on the types and traits defined here.
//!
//! ## Key Concepts
//!
//! - **Entity**: an ontology class or individual identified by a URI
//! - **Provenance**: which case(s), pass and section discovered an entity
//! - **Staging record**: an uncommitted candidate, visible only to its case
//! - **Committed class**: promoted to the shared store, visible to all cases
//! - **Committed individual**: promoted to its case's store, visible only there
//!
//! ## Architecture
//!
//! This crate holds plain data and trait seams only. Storage, validation and
//! coordination live in the other crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod case;
pub mod entity;
pub mod operation;
pub mod provenance;
pub mod record;
pub mod traits;

// Re-exports for convenience
pub use case::{CaseId, ExtractionPass, SectionType};
pub use entity::{CommitState, Entity, EntityId, EntityKind};
pub use operation::OperationId;
pub use provenance::ProvenanceRecord;
pub use record::{Candidate, CommittedClass, CommittedIndividual, StagingKey, StagingRecord};
pub use traits::{StagingClearCounts, StagingFilter, StagingStore};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current timestamp in seconds since Unix epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
