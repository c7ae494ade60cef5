//! Integration tests for pass/section and whole-case clears

use casegraph_coordinator::{
    CommitCoordinator, CoordinatorConfig, CoordinatorError, EntityQueryService, LockRegistry, StagingService,
    StoreHandles,
};
use casegraph_domain::traits::{StagingFilter, StagingStore};
use casegraph_domain::{Candidate, CaseId, EntityId, EntityKind, ExtractionPass, SectionType};
use casegraph_gatekeeper::{CandidateValidator, ValidationConfig};
use casegraph_janitor::{ClearService, JanitorError};
use casegraph_store::{DocumentKey, MemoryBackend};
use std::collections::BTreeMap;
use std::sync::Arc;

struct Fixture {
    handles: StoreHandles,
    backend: Arc<MemoryBackend>,
    staging: StagingService,
    coordinator: CommitCoordinator,
    janitor: ClearService,
}

fn fixture() -> Fixture {
    let config = CoordinatorConfig {
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        ..CoordinatorConfig::default()
    };
    let (handles, backend) = StoreHandles::in_memory().unwrap();
    let locks = Arc::new(LockRegistry::new(config.clone()));
    Fixture {
        staging: StagingService::new(
            handles.clone(),
            locks.clone(),
            CandidateValidator::new(ValidationConfig::default()),
        ),
        coordinator: CommitCoordinator::new(handles.clone(), locks.clone(), config.clone()),
        janitor: ClearService::new(handles.clone(), locks, config),
        handles,
        backend,
    }
}

fn class_id(name: &str) -> EntityId {
    EntityId::new(format!("http://proethica.org/ontology/intermediate#{}", name))
}

fn individual_id(case: u64, name: &str) -> EntityId {
    EntityId::new(format!("http://proethica.org/ontology/case/{}#{}", case, name))
}

fn candidate(case: u64, id: &EntityId, kind: EntityKind, pass: ExtractionPass, section: SectionType) -> Candidate {
    Candidate {
        identifier: id.to_string(),
        kind,
        label: id.local_name().to_string(),
        definition: match kind {
            EntityKind::Class => format!("{} as described in the case", id.local_name()),
            EntityKind::Individual => String::new(),
        },
        attributes: BTreeMap::new(),
        case_id: CaseId::new(case),
        pass,
        section,
        source_text: None,
        extensions: BTreeMap::new(),
    }
}

async fn stage_class(f: &Fixture, case: u64, name: &str, pass: ExtractionPass, section: SectionType) -> EntityId {
    let id = class_id(name);
    f.staging
        .stage(candidate(case, &id, EntityKind::Class, pass, section))
        .await
        .unwrap();
    id
}

async fn stage_individual(f: &Fixture, case: u64, name: &str) -> EntityId {
    let id = individual_id(case, name);
    f.staging
        .stage(candidate(case, &id, EntityKind::Individual, ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();
    id
}

fn staged_rows(f: &Fixture, case: u64) -> usize {
    f.handles
        .with_staging(|s| s.list(&StagingFilter::for_case(CaseId::new(case)).any_state()))
        .unwrap()
        .len()
}

#[tokio::test]
async fn test_clear_pass_section_keeps_committed() {
    let f = fixture();
    let (pass, facts) = (ExtractionPass::First, SectionType::Facts);

    let committed = stage_class(&f, 7, "EngineerRole", pass, facts).await;
    stage_class(&f, 7, "ClientRole", pass, facts).await;
    stage_class(&f, 7, "PublicSafety", pass, facts).await;
    stage_class(&f, 7, "Deliberation", pass, SectionType::Discussion).await;
    let individual = stage_individual(&f, 7, "EngineerA").await;
    f.coordinator
        .commit(CaseId::new(7), &[committed, individual])
        .await
        .unwrap();

    let other = stage_class(&f, 8, "RegulatorRole", pass, facts).await;
    f.coordinator.commit(CaseId::new(8), &[other]).await.unwrap();

    let report = f.janitor.clear_pass_section(CaseId::new(7), pass, facts).await.unwrap();
    assert_eq!(report.deleted_staged, 2);
    assert_eq!(report.remaining_committed_same_case, 2);
    assert_eq!(report.remaining_committed_other_cases, 1);

    // The discussion section and the committed markers survive
    let left = f
        .handles
        .with_staging(|s| s.list(&StagingFilter::for_case(CaseId::new(7))))
        .unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].entity.id, class_id("Deliberation"));
    assert_eq!(f.handles.permanent().classes().unwrap().len(), 2);

    // Committed entities are still in the case's prompt
    let prompt = EntityQueryService::new(f.handles.clone())
        .entities_for_prompt(CaseId::new(7), pass, facts)
        .unwrap();
    assert!(prompt.contains(&class_id("EngineerRole")));
    assert!(prompt.contains(&individual_id(7, "EngineerA")));
    assert!(!prompt.contains(&class_id("ClientRole")));
}

#[tokio::test]
async fn test_clear_pass_section_empty_is_noop() {
    let f = fixture();
    let report = f
        .janitor
        .clear_pass_section(CaseId::new(7), ExtractionPass::Third, SectionType::Conclusions)
        .await
        .unwrap();
    assert_eq!(report.deleted_staged, 0);
    assert_eq!(report.remaining_committed(), 0);
}

#[tokio::test]
async fn test_clear_all_case_data_sole_contributor() {
    let f = fixture();
    let class = stage_class(&f, 7, "EngineerRole", ExtractionPass::First, SectionType::Facts).await;
    let individual = stage_individual(&f, 7, "EngineerA").await;
    stage_class(&f, 7, "Uncommitted", ExtractionPass::Second, SectionType::Facts).await;
    f.coordinator.commit(CaseId::new(7), &[class, individual]).await.unwrap();

    let report = f.janitor.clear_all_case_data(CaseId::new(7)).await.unwrap();
    assert_eq!(report.deleted_staged, 3);
    assert_eq!(report.deleted_individuals, 1);
    assert_eq!(report.deleted_classes, 1);
    assert_eq!(report.retracted_classes, 0);

    let permanent = f.handles.permanent();
    assert!(permanent.classes().unwrap().is_empty());
    assert!(permanent.individuals(CaseId::new(7)).unwrap().is_empty());
    assert_eq!(staged_rows(&f, 7), 0);

    // The cleared state is a new version; the committed one stays in history
    assert_eq!(permanent.version_count(&DocumentKey::Classes).unwrap(), 2);
    assert_eq!(
        permanent.version_count(&DocumentKey::Individuals(CaseId::new(7))).unwrap(),
        2
    );
}

#[tokio::test]
async fn test_clear_all_case_data_shared_class_survives() {
    let f = fixture();
    let shared = stage_class(&f, 7, "SafetyObligation", ExtractionPass::Second, SectionType::Facts).await;
    f.coordinator.commit(CaseId::new(7), &[shared.clone()]).await.unwrap();
    stage_class(&f, 8, "SafetyObligation", ExtractionPass::Second, SectionType::Facts).await;
    f.coordinator.commit(CaseId::new(8), &[shared.clone()]).await.unwrap();

    let report = f.janitor.clear_all_case_data(CaseId::new(7)).await.unwrap();
    assert_eq!(report.retracted_classes, 1);
    assert_eq!(report.deleted_classes, 0);
    assert_eq!(report.deleted_staged, 1);

    let classes = f.handles.permanent().classes().unwrap();
    assert_eq!(classes.len(), 1);
    assert!(!classes[0].provenance.includes_case(CaseId::new(7)));
    assert!(classes[0].provenance.includes_case(CaseId::new(8)));
    assert_eq!(staged_rows(&f, 8), 1);

    // Clearing the last contributor removes the class
    let report = f.janitor.clear_all_case_data(CaseId::new(8)).await.unwrap();
    assert_eq!(report.deleted_classes, 1);
    assert!(f.handles.permanent().classes().unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_all_case_data_unknown_case() {
    let f = fixture();
    let report = f.janitor.clear_all_case_data(CaseId::new(42)).await.unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_clear_all_case_data_rolls_back_on_write_failure() {
    let f = fixture();
    let class = stage_class(&f, 7, "EngineerRole", ExtractionPass::First, SectionType::Facts).await;
    let individual = stage_individual(&f, 7, "EngineerA").await;
    f.coordinator.commit(CaseId::new(7), &[class, individual]).await.unwrap();

    let permanent = f.handles.permanent();
    let classes_before = permanent.read_raw(&DocumentKey::Classes, 1).unwrap();

    // Classes write lands, individuals write fails
    f.backend.fail_writes_after(1);
    let result = f.janitor.clear_all_case_data(CaseId::new(7)).await;
    f.backend.clear_failures();

    assert!(matches!(
        result,
        Err(JanitorError::Coordinator(CoordinatorError::StorageWriteFailure(_)))
    ));
    assert_eq!(permanent.version_count(&DocumentKey::Classes).unwrap(), 1);
    assert_eq!(permanent.read_raw(&DocumentKey::Classes, 1).unwrap(), classes_before);
    assert_eq!(permanent.individuals(CaseId::new(7)).unwrap().len(), 1);
    assert_eq!(staged_rows(&f, 7), 2);
}
