//! Commit atomicity, rollback and idempotence

mod common;

use casegraph_coordinator::{CommitCoordinator, CoordinatorError, LockRegistry, StagingService, StoreHandles};
use casegraph_domain::traits::{StagingClearCounts, StagingFilter, StagingStore};
use casegraph_domain::{
    CaseId, CommitState, EntityId, ExtractionPass, SectionType, StagingKey, StagingRecord,
};
use casegraph_gatekeeper::{CandidateValidator, ValidationConfig};
use casegraph_store::{DocumentKey, PermanentStore, SqliteStagingStore, StoreError};
use common::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn uncommitted(harness: &Harness, case: u64) -> Vec<StagingRecord> {
    harness
        .handles
        .with_staging(|s| s.list(&StagingFilter::for_case(CaseId::new(case))))
        .unwrap()
}

#[tokio::test]
async fn test_commit_appends_and_flips() {
    let harness = Harness::new();
    let staging = harness.staging();
    staging
        .stage(class_candidate(7, "SafetyObligation", "Safety Obligation", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();
    let individual = staging
        .stage(individual_candidate(7, "EngineerA", "Engineer A"))
        .await
        .unwrap();

    let report = harness
        .coordinator()
        .commit(CaseId::new(7), &[class_id("SafetyObligation"), individual_id(7, "EngineerA")])
        .await
        .unwrap();

    assert_eq!(report.classes_appended, 1);
    assert_eq!(report.individuals_appended, 1);
    assert_eq!(report.classes_merged, 0);
    assert_eq!(report.already_committed, 0);
    assert_eq!(report.rows_flipped, 2);
    assert_eq!(report.documents_written, 2);
    assert_eq!(report.committed(), 2);

    assert!(uncommitted(&harness, 7).is_empty());
    let marker = staging.get(&individual.key()).unwrap().unwrap();
    assert_eq!(marker.entity.commit_state, CommitState::Committed);
    assert!(marker.entity.committed_at.is_some());

    let permanent = harness.handles.permanent();
    assert_eq!(permanent.version_count(&DocumentKey::Classes).unwrap(), 1);
    let classes = permanent.classes().unwrap();
    assert_eq!(classes[0].entity.commit_state, CommitState::Committed);
    assert!(classes[0].provenance.includes_case(CaseId::new(7)));
}

#[tokio::test]
async fn test_empty_selection_is_noop() {
    let harness = Harness::new();
    let report = harness.coordinator().commit(CaseId::new(7), &[]).await.unwrap();
    assert_eq!(report.committed(), 0);
    assert_eq!(report.rows_flipped, 0);
}

#[tokio::test]
async fn test_failed_write_rolls_back_case9() {
    let harness = Harness::new();
    let staging = harness.staging();
    let coordinator = harness.coordinator();

    // An earlier commit gives the classes document some history
    staging
        .stage(class_candidate(7, "Existing", "Existing", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();
    coordinator.commit(CaseId::new(7), &[class_id("Existing")]).await.unwrap();
    let permanent = harness.handles.permanent();
    let before = permanent.read_raw(&DocumentKey::Classes, 1).unwrap();

    staging
        .stage(class_candidate(9, "RiskDisclosure", "Risk Disclosure", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();
    staging
        .stage(class_candidate(9, "ClientLoyalty", "Client Loyalty", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();

    harness.backend.fail_writes_after(0);
    let result = coordinator
        .commit(CaseId::new(9), &[class_id("RiskDisclosure"), class_id("ClientLoyalty")])
        .await;
    harness.backend.clear_failures();

    assert!(matches!(result, Err(CoordinatorError::StorageWriteFailure(_))));
    let pending = uncommitted(&harness, 9);
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|r| r.is_uncommitted()));
    assert_eq!(permanent.version_count(&DocumentKey::Classes).unwrap(), 1);
    assert_eq!(permanent.read_raw(&DocumentKey::Classes, 1).unwrap(), before);

    // The same selection commits once storage recovers
    let report = coordinator
        .commit(CaseId::new(9), &[class_id("RiskDisclosure"), class_id("ClientLoyalty")])
        .await
        .unwrap();
    assert_eq!(report.classes_appended, 2);
}

#[tokio::test]
async fn test_second_document_failure_removes_first_write() {
    let harness = Harness::new();
    let staging = harness.staging();
    staging
        .stage(class_candidate(9, "RiskDisclosure", "Risk Disclosure", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();
    staging
        .stage(individual_candidate(9, "EngineerA", "Engineer A"))
        .await
        .unwrap();

    // Classes write succeeds, individuals write fails
    harness.backend.fail_writes_after(1);
    let result = harness
        .coordinator()
        .commit(CaseId::new(9), &[class_id("RiskDisclosure"), individual_id(9, "EngineerA")])
        .await;
    harness.backend.clear_failures();

    assert!(matches!(result, Err(CoordinatorError::StorageWriteFailure(_))));
    let permanent = harness.handles.permanent();
    assert_eq!(permanent.version_count(&DocumentKey::Classes).unwrap(), 0);
    assert_eq!(permanent.version_count(&DocumentKey::Individuals(CaseId::new(9))).unwrap(), 0);
    assert_eq!(uncommitted(&harness, 9).len(), 2);
}

#[tokio::test]
async fn test_transient_write_failure_is_retried() {
    let harness = Harness::new();
    harness
        .staging()
        .stage(class_candidate(7, "SafetyObligation", "Safety Obligation", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();

    harness.backend.fail_next_writes_transiently(2);
    let report = harness
        .coordinator()
        .commit(CaseId::new(7), &[class_id("SafetyObligation")])
        .await
        .unwrap();

    assert_eq!(report.classes_appended, 1);
    assert_eq!(
        harness.handles.permanent().version_count(&DocumentKey::Classes).unwrap(),
        1
    );
}

#[tokio::test]
async fn test_recommit_is_idempotent() {
    let harness = Harness::new();
    harness
        .staging()
        .stage(class_candidate(7, "SafetyObligation", "Safety Obligation", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();
    let coordinator = harness.coordinator();
    coordinator
        .commit(CaseId::new(7), &[class_id("SafetyObligation")])
        .await
        .unwrap();

    let report = coordinator
        .commit(CaseId::new(7), &[class_id("SafetyObligation"), class_id("SafetyObligation")])
        .await
        .unwrap();
    assert_eq!(report.already_committed, 1);
    assert_eq!(report.rows_flipped, 0);
    assert_eq!(report.documents_written, 0);
    assert_eq!(
        harness.handles.permanent().version_count(&DocumentKey::Classes).unwrap(),
        1
    );

    // Replaying the flip directly changes nothing either
    let flipped = harness
        .handles
        .with_staging(|s| s.mark_committed(CaseId::new(7), &[class_id("SafetyObligation")], 1))
        .unwrap();
    assert_eq!(flipped, 0);
}

#[tokio::test]
async fn test_cross_case_selection_is_visibility_violation() {
    let harness = Harness::new();
    harness
        .staging()
        .stage(class_candidate(8, "PublicWelfareDuty", "Public Welfare Duty", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();

    let result = harness
        .coordinator()
        .commit(CaseId::new(7), &[class_id("PublicWelfareDuty")])
        .await;
    match result {
        Err(CoordinatorError::VisibilityViolation { case_id, entity_id }) => {
            assert_eq!(case_id, CaseId::new(7));
            assert_eq!(entity_id, class_id("PublicWelfareDuty"));
        }
        other => panic!("Expected VisibilityViolation, got {:?}", other),
    }
    assert_eq!(uncommitted(&harness, 8).len(), 1);

    let result = harness
        .coordinator()
        .commit(CaseId::new(7), &[class_id("NeverStaged")])
        .await;
    assert!(matches!(result, Err(CoordinatorError::NotFound(_))));
}

#[tokio::test]
async fn test_identical_class_merges_provenance() {
    let harness = Harness::new();
    let staging = harness.staging();
    let coordinator = harness.coordinator();
    for case in [7, 8] {
        staging
            .stage(class_candidate(case, "SafetyObligation", "Safety Obligation", ExtractionPass::First, SectionType::Facts))
            .await
            .unwrap();
    }

    coordinator
        .commit(CaseId::new(7), &[class_id("SafetyObligation")])
        .await
        .unwrap();
    let report = coordinator
        .commit(CaseId::new(8), &[class_id("SafetyObligation")])
        .await
        .unwrap();

    assert_eq!(report.classes_merged, 1);
    assert_eq!(report.classes_appended, 0);
    let classes = harness.handles.permanent().classes().unwrap();
    assert_eq!(classes.len(), 1);
    let cases: Vec<CaseId> = classes[0].provenance.discovered_in_cases.iter().copied().collect();
    assert_eq!(cases, vec![CaseId::new(7), CaseId::new(8)]);
    assert_eq!(classes[0].provenance.first_discovered_case, CaseId::new(7));
}

#[tokio::test]
async fn test_different_content_same_identifier_collides() {
    let harness = Harness::new();
    let staging = harness.staging();
    let coordinator = harness.coordinator();
    staging
        .stage(class_candidate(7, "SafetyObligation", "Safety Obligation", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();
    coordinator
        .commit(CaseId::new(7), &[class_id("SafetyObligation")])
        .await
        .unwrap();

    let mut different = class_candidate(8, "SafetyObligation", "Safety Obligation", ExtractionPass::First, SectionType::Facts);
    different.definition = "Something else entirely".to_string();
    staging.stage(different).await.unwrap();

    let result = coordinator.commit(CaseId::new(8), &[class_id("SafetyObligation")]).await;
    assert!(matches!(result, Err(CoordinatorError::IdentifierCollision(_))));
    assert_eq!(uncommitted(&harness, 8).len(), 1);
    assert_eq!(
        harness.handles.permanent().version_count(&DocumentKey::Classes).unwrap(),
        1
    );
}

#[tokio::test]
async fn test_earliest_staged_row_supplies_content() {
    let harness = Harness::new();
    let staging = harness.staging();
    staging
        .stage(class_candidate(7, "SafetyObligation", "Later Label", ExtractionPass::Second, SectionType::Facts))
        .await
        .unwrap();
    staging
        .stage(class_candidate(7, "SafetyObligation", "Earlier Label", ExtractionPass::First, SectionType::Discussion))
        .await
        .unwrap();

    let report = harness
        .coordinator()
        .commit(CaseId::new(7), &[class_id("SafetyObligation")])
        .await
        .unwrap();

    assert_eq!(report.classes_appended, 1);
    assert_eq!(report.rows_flipped, 2);
    let classes = harness.handles.permanent().classes().unwrap();
    assert_eq!(classes[0].entity.label, "Earlier Label");
    assert_eq!(classes[0].provenance.discovered_in_pass, ExtractionPass::First);
}

#[tokio::test]
async fn test_concurrent_commits_from_different_cases() {
    let harness = Harness::new();
    let staging = harness.staging();
    staging
        .stage(class_candidate(7, "A", "Alpha", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();
    staging
        .stage(class_candidate(8, "B", "Beta", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();

    let seven = harness.coordinator();
    let eight = harness.coordinator();
    let seven_ids = [class_id("A")];
    let eight_ids = [class_id("B")];
    let (a, b) = tokio::join!(
        seven.commit(CaseId::new(7), &seven_ids),
        eight.commit(CaseId::new(8), &eight_ids),
    );
    a.unwrap();
    b.unwrap();

    let permanent = harness.handles.permanent();
    assert_eq!(permanent.classes().unwrap().len(), 2);
    assert_eq!(permanent.version_count(&DocumentKey::Classes).unwrap(), 2);
}

#[tokio::test]
async fn test_dropped_commit_is_all_or_nothing() {
    let harness = Harness::new();
    harness
        .staging()
        .stage(class_candidate(7, "SafetyObligation", "Safety Obligation", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();

    let coordinator = harness.coordinator();
    let task = tokio::spawn(async move {
        coordinator
            .commit(CaseId::new(7), &[class_id("SafetyObligation")])
            .await
    });
    tokio::task::yield_now().await;
    task.abort();
    let _ = task.await;

    // Once the case lock is free, any started commit has finished
    let guard = harness.locks.lock_case(CaseId::new(7)).await.unwrap();
    let classes_written = harness
        .handles
        .permanent()
        .version_count(&DocumentKey::Classes)
        .unwrap();
    let still_staged = uncommitted(&harness, 7).len();
    drop(guard);

    assert!(
        (classes_written == 0 && still_staged == 1) || (classes_written == 1 && still_staged == 0),
        "partial commit: {} versions, {} staged",
        classes_written,
        still_staged
    );
}

/// Staging store whose flip can be made to fail
struct FlakyFlip {
    inner: SqliteStagingStore,
    fail: Arc<AtomicBool>,
}

impl StagingStore for FlakyFlip {
    type Error = StoreError;

    fn put(&mut self, record: StagingRecord) -> Result<StagingRecord, Self::Error> {
        self.inner.put(record)
    }

    fn get(&self, key: &StagingKey) -> Result<Option<StagingRecord>, Self::Error> {
        self.inner.get(key)
    }

    fn list(&self, filter: &StagingFilter) -> Result<Vec<StagingRecord>, Self::Error> {
        self.inner.list(filter)
    }

    fn clear(
        &mut self,
        case_id: CaseId,
        pass: ExtractionPass,
        section: SectionType,
    ) -> Result<StagingClearCounts, Self::Error> {
        self.inner.clear(case_id, pass, section)
    }

    fn records_for_ids(&self, case_id: CaseId, ids: &[EntityId]) -> Result<Vec<StagingRecord>, Self::Error> {
        self.inner.records_for_ids(case_id, ids)
    }

    fn owners_of(&self, id: &EntityId) -> Result<Vec<CaseId>, Self::Error> {
        self.inner.owners_of(id)
    }

    fn mark_committed(&mut self, case_id: CaseId, ids: &[EntityId], committed_at: u64) -> Result<usize, Self::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.mark_committed(case_id, ids, committed_at)
    }

    fn delete_case(&mut self, case_id: CaseId) -> Result<usize, Self::Error> {
        self.inner.delete_case(case_id)
    }

    fn cases_with_uncommitted(&self) -> Result<Vec<CaseId>, Self::Error> {
        self.inner.cases_with_uncommitted()
    }
}

#[tokio::test]
async fn test_failed_flip_rolls_back_documents() {
    let fail = Arc::new(AtomicBool::new(false));
    let staging_store = FlakyFlip {
        inner: SqliteStagingStore::new(":memory:").unwrap(),
        fail: fail.clone(),
    };
    let (permanent, _backend) = PermanentStore::in_memory();
    let handles = StoreHandles::new(staging_store, permanent);
    let config = test_config();
    let locks = Arc::new(LockRegistry::new(config.clone()));

    let staging = StagingService::new(
        handles.clone(),
        locks.clone(),
        CandidateValidator::new(ValidationConfig::default()),
    );
    staging
        .stage(class_candidate(9, "RiskDisclosure", "Risk Disclosure", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();

    let coordinator = CommitCoordinator::new(handles.clone(), locks, config);
    fail.store(true, Ordering::SeqCst);
    let result = coordinator.commit(CaseId::new(9), &[class_id("RiskDisclosure")]).await;

    assert!(matches!(result, Err(CoordinatorError::StorageWriteFailure(_))));
    assert_eq!(handles.permanent().version_count(&DocumentKey::Classes).unwrap(), 0);
    let pending = staging.list(&StagingFilter::for_case(CaseId::new(9))).unwrap();
    assert_eq!(pending.len(), 1);

    fail.store(false, Ordering::SeqCst);
    let report = coordinator.commit(CaseId::new(9), &[class_id("RiskDisclosure")]).await.unwrap();
    assert_eq!(report.classes_appended, 1);
    assert_eq!(report.rows_flipped, 1);
}

#[tokio::test]
async fn test_unflipped_class_write_counts_as_already_committed() {
    let harness = Harness::new();
    let staged = harness
        .staging()
        .stage(class_candidate(7, "SafetyObligation", "Safety Obligation", ExtractionPass::First, SectionType::Facts))
        .await
        .unwrap();

    // The class reached the document with case 7 in its provenance, but the flip never ran
    let permanent = harness.handles.permanent();
    permanent
        .append_class(staged.entity.clone(), staged.provenance.clone())
        .unwrap();

    let report = harness
        .coordinator()
        .commit(CaseId::new(7), &[class_id("SafetyObligation")])
        .await
        .unwrap();
    assert_eq!(report.classes_merged, 0);
    assert_eq!(report.classes_appended, 0);
    assert_eq!(report.already_committed, 1);
    assert_eq!(report.documents_written, 0);
    assert_eq!(report.rows_flipped, 1);
    assert_eq!(permanent.version_count(&DocumentKey::Classes).unwrap(), 1);
    assert!(uncommitted(&harness, 7).is_empty());
}
