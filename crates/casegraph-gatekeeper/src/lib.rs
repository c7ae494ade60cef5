//! Casegraph Gatekeeper
//!
//! Quality control at the edges of the staging workspace.
//!
//! The Gatekeeper provides:
//! - Candidate validation before anything is staged
//! - Duplicate candidate search against committed classes
//!
//! # Examples
//!
//! ```no_run
//! use casegraph_gatekeeper::{CandidateValidator, ValidationConfig};
//!
//! let validator = CandidateValidator::new(ValidationConfig::default());
//! // let result = validator.validate(&record);
//! ```

#![warn(missing_docs)]

mod config;
mod dedup;
mod error;
mod validator;

pub use config::{DedupConfig, ValidationConfig};
pub use dedup::{DeduplicationIndex, DuplicateCandidate};
pub use error::GatekeeperError;
pub use validator::{CandidateValidator, RejectionReason, ValidationResult, ValidationStatus};
