//! Casegraph Janitor
//!
//! Removal of staged and committed entities on a curator's request.
//!
//! # Overview
//!
//! [`ClearService`] offers two operations:
//! - **Pass/section clear**: drop a case's uncommitted work for one pass and
//!   section before re-running extraction. Committed entities stay, and the
//!   returned [`ClearReport`] says how many remain so the caller can explain
//!   why the prompt still shows them.
//! - **Whole-case clear**: remove every trace of a case. Staging rows and the
//!   case's individuals document go; the case is retracted from every shared
//!   class, and classes no other case discovered are deleted. Runs under the
//!   same lock, snapshot and rollback discipline as a commit.
//!
//! # Usage
//!
//! ```no_run
//! use casegraph_coordinator::{CoordinatorConfig, LockRegistry, StoreHandles};
//! use casegraph_domain::{CaseId, ExtractionPass, SectionType};
//! use casegraph_janitor::ClearService;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), casegraph_janitor::JanitorError> {
//! let config = CoordinatorConfig::default();
//! let handles = StoreHandles::open("data", &config)?;
//! let locks = Arc::new(LockRegistry::new(config.clone()));
//! let janitor = ClearService::new(handles, locks, config);
//!
//! let report = janitor
//!     .clear_pass_section(CaseId::new(7), ExtractionPass::First, SectionType::Facts)
//!     .await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod clear;
mod error;
mod report;

pub use clear::ClearService;
pub use error::JanitorError;
pub use report::{CaseClearReport, ClearReport};
