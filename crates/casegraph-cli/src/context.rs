//! Services opened once per invocation.

use crate::config::Config;
use crate::error::Result;
use casegraph_coordinator::{
    CommitCoordinator, EntityQueryService, LockRegistry, Reconciler, StagingService, StoreHandles,
};
use casegraph_gatekeeper::{CandidateValidator, DedupConfig, DeduplicationIndex};
use casegraph_janitor::ClearService;
use std::sync::Arc;

/// Store handles, lock registry and configuration shared by every command.
pub struct Context {
    config: Config,
    handles: StoreHandles,
    locks: Arc<LockRegistry>,
}

impl Context {
    /// Open the stores under the configured data directory.
    pub fn open(config: Config) -> Result<Self> {
        let handles = StoreHandles::open(&config.data_dir, &config.coordinator)?;
        Ok(Self::with_handles(config, handles))
    }

    /// Build a context over already-open stores.
    pub fn with_handles(config: Config, handles: StoreHandles) -> Self {
        let locks = Arc::new(LockRegistry::new(config.coordinator.clone()));
        Self { config, handles, locks }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared store handles.
    pub fn handles(&self) -> &StoreHandles {
        &self.handles
    }

    /// Validated staging writes.
    pub fn staging(&self) -> StagingService {
        StagingService::new(self.handles.clone(), self.locks.clone(), CandidateValidator::default_config())
    }

    /// Prompt visibility queries.
    pub fn query(&self) -> EntityQueryService {
        EntityQueryService::new(self.handles.clone())
    }

    /// Commits.
    pub fn coordinator(&self) -> CommitCoordinator {
        CommitCoordinator::new(self.handles.clone(), self.locks.clone(), self.config.coordinator.clone())
    }

    /// Crash-window repair.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.handles.clone(), self.locks.clone(), self.config.coordinator.clone())
    }

    /// Clears.
    pub fn janitor(&self) -> ClearService {
        ClearService::new(self.handles.clone(), self.locks.clone(), self.config.coordinator.clone())
    }

    /// Duplicate search with the given settings.
    pub fn dedup(&self, config: DedupConfig) -> Result<DeduplicationIndex> {
        Ok(DeduplicationIndex::new(self.handles.permanent().clone(), config)?)
    }
}
