//! Casegraph Coordinator
//!
//! Services that move entities between the staging workspace and the
//! permanent store without ever exposing one case's work to another.
//!
//! # Services
//!
//! - [`StagingService`]: validated writes into a case's staging workspace
//! - [`EntityQueryService`]: the entity set visible to a case's prompts
//! - [`CommitCoordinator`]: all-or-nothing promotion of staged entities
//! - [`Reconciler`]: startup repair of written-but-unflipped staging rows
//!
//! Every service is built from one shared [`StoreHandles`] and
//! [`LockRegistry`], constructed once per process.
//!
//! # Examples
//!
//! ```no_run
//! use casegraph_coordinator::{CommitCoordinator, CoordinatorConfig, LockRegistry, StoreHandles};
//! use casegraph_domain::{CaseId, EntityId};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), casegraph_coordinator::CoordinatorError> {
//! let config = CoordinatorConfig::default();
//! let handles = StoreHandles::open("data", &config)?;
//! let locks = Arc::new(LockRegistry::new(config.clone()));
//! let coordinator = CommitCoordinator::new(handles, locks, config);
//!
//! let ids = vec![EntityId::new("http://proethica.org/ontology/intermediate#EnvironmentalEngineerRole")];
//! let report = coordinator.commit(CaseId::new(7), &ids).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod commit;
mod config;
mod error;
mod handles;
mod locks;
mod query;
mod reconcile;
pub mod retry;
mod staging;

pub use commit::{CommitCoordinator, CommitReport};
pub use config::CoordinatorConfig;
pub use error::CoordinatorError;
pub use handles::{StagingHandle, StoreHandles};
pub use locks::{CaseGuard, ClassesGuard, LockRegistry};
pub use query::{EntityQueryService, PromptEntities, PromptEntity};
pub use reconcile::{ReconcileReport, Reconciler};
pub use staging::StagingService;
