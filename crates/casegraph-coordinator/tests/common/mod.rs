//! Shared fixtures for coordinator integration tests

#![allow(dead_code)]

use casegraph_coordinator::{
    CommitCoordinator, CoordinatorConfig, EntityQueryService, LockRegistry, Reconciler, StagingService, StoreHandles,
};
use casegraph_domain::{Candidate, CaseId, EntityId, EntityKind, ExtractionPass, SectionType};
use casegraph_gatekeeper::{CandidateValidator, ValidationConfig};
use casegraph_store::MemoryBackend;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Harness {
    pub handles: StoreHandles,
    pub backend: Arc<MemoryBackend>,
    pub locks: Arc<LockRegistry>,
    pub config: CoordinatorConfig,
}

pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        lock_timeout_ms: 2_000,
        max_attempts: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        sqlite_busy_timeout_ms: 1_000,
    }
}

impl Harness {
    pub fn new() -> Self {
        let config = test_config();
        let (handles, backend) = StoreHandles::in_memory().unwrap();
        Self {
            handles,
            backend,
            locks: Arc::new(LockRegistry::new(config.clone())),
            config,
        }
    }

    pub fn staging(&self) -> StagingService {
        StagingService::new(
            self.handles.clone(),
            self.locks.clone(),
            CandidateValidator::new(ValidationConfig::default()),
        )
    }

    pub fn query(&self) -> EntityQueryService {
        EntityQueryService::new(self.handles.clone())
    }

    pub fn coordinator(&self) -> CommitCoordinator {
        CommitCoordinator::new(self.handles.clone(), self.locks.clone(), self.config.clone())
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.handles.clone(), self.locks.clone(), self.config.clone())
    }
}

pub fn class_id(name: &str) -> EntityId {
    EntityId::new(format!("http://proethica.org/ontology/intermediate#{}", name))
}

pub fn individual_id(case: u64, name: &str) -> EntityId {
    EntityId::new(format!("http://proethica.org/ontology/case/{}#{}", case, name))
}

pub fn class_candidate(case: u64, name: &str, label: &str, pass: ExtractionPass, section: SectionType) -> Candidate {
    Candidate {
        identifier: class_id(name).to_string(),
        kind: EntityKind::Class,
        label: label.to_string(),
        definition: format!("{} as described in the case", label),
        attributes: BTreeMap::new(),
        case_id: CaseId::new(case),
        pass,
        section,
        source_text: None,
        extensions: BTreeMap::new(),
    }
}

pub fn individual_candidate(case: u64, name: &str, label: &str) -> Candidate {
    Candidate {
        identifier: individual_id(case, name).to_string(),
        kind: EntityKind::Individual,
        label: label.to_string(),
        definition: String::new(),
        attributes: BTreeMap::new(),
        case_id: CaseId::new(case),
        pass: ExtractionPass::First,
        section: SectionType::Facts,
        source_text: None,
        extensions: BTreeMap::new(),
    }
}
