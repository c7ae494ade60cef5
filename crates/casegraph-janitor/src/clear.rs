//! Clearing staged work and whole cases

use crate::{CaseClearReport, ClearReport, JanitorError};
use casegraph_coordinator::retry::retry_transient;
use casegraph_coordinator::{CoordinatorConfig, CoordinatorError, LockRegistry, StagingHandle, StoreHandles};
use casegraph_domain::{CaseId, ExtractionPass, OperationId, ProvenanceRecord, SectionType};
use casegraph_store::{DocumentKey, DocumentSnapshot, RetractOutcome, SqliteStagingStore};
use std::sync::Arc;

/// Removes staged or committed entities on request
///
/// Both operations hold the case lock and the cross-process writer lock
/// for their whole duration, so they never interleave with a commit for the
/// same case.
pub struct ClearService<S = SqliteStagingStore> {
    handles: StoreHandles<S>,
    locks: Arc<LockRegistry>,
    config: CoordinatorConfig,
}

impl<S: StagingHandle> ClearService<S> {
    /// Create the service
    pub fn new(handles: StoreHandles<S>, locks: Arc<LockRegistry>, config: CoordinatorConfig) -> Self {
        Self {
            handles,
            locks,
            config,
        }
    }

    /// Delete the uncommitted rows of one pass/section of a case
    ///
    /// Committed entities are never touched. The report counts the committed
    /// entities whose provenance points at the same pass/section, split by
    /// whether the case contributed them.
    pub async fn clear_pass_section(
        &self,
        case_id: CaseId,
        pass: ExtractionPass,
        section: SectionType,
    ) -> Result<ClearReport, JanitorError> {
        let guard = self.locks.lock_case(case_id).await?;
        let handles = self.handles.clone();
        let config = self.config.clone();

        let report = tokio::task::spawn_blocking(move || {
            let _held = guard;
            clear_staged(&handles, &config, case_id, pass, section)
        })
        .await??;

        tracing::info!("{}", report.summary());
        Ok(report)
    }

    /// Remove every trace of a case
    ///
    /// Deletes the case's staging rows (committed markers included) and its
    /// individuals, and retracts the case from every class it discovered.
    /// Classes left with no discovering case are deleted. Any failure
    /// restores both documents and leaves staging untouched.
    pub async fn clear_all_case_data(&self, case_id: CaseId) -> Result<CaseClearReport, JanitorError> {
        let case_guard = self.locks.lock_case(case_id).await?;
        let classes_guard = self.locks.lock_classes().await?;
        let handles = self.handles.clone();
        let config = self.config.clone();

        let report = tokio::task::spawn_blocking(move || {
            let _held = (case_guard, classes_guard);
            clear_case(&handles, &config, case_id)
        })
        .await??;

        tracing::info!("{}", report.summary());
        Ok(report)
    }
}

fn clear_staged<S: StagingHandle>(
    handles: &StoreHandles<S>,
    config: &CoordinatorConfig,
    case_id: CaseId,
    pass: ExtractionPass,
    section: SectionType,
) -> Result<ClearReport, JanitorError> {
    let _writer = handles.lock_writers(config)?;

    let counts = retry_transient(config, "clear staging rows", || {
        handles.with_staging(|s| s.clear(case_id, pass, section))
    })?;
    tracing::debug!(
        "Case {} {} {}: deleted {} staged rows, kept {} committed markers",
        case_id,
        pass,
        section,
        counts.deleted,
        counts.committed_retained
    );

    let permanent = handles.permanent();
    let classes = permanent.load_classes()?;
    let individuals = permanent.load_individuals(case_id)?;

    let from_slot = |p: &ProvenanceRecord| p.discovered_in_pass == pass && p.discovered_in_section == section;

    let (own_classes, other_classes): (Vec<_>, Vec<_>) = classes
        .iter()
        .filter(|class| from_slot(&class.provenance))
        .partition(|class| class.provenance.includes_case(case_id));
    let own_individuals = individuals
        .iter()
        .filter(|individual| from_slot(&individual.provenance))
        .count();

    Ok(ClearReport {
        case_id,
        pass,
        section,
        deleted_staged: counts.deleted,
        remaining_committed_same_case: own_classes.len() + own_individuals,
        remaining_committed_other_cases: other_classes.len(),
    })
}

fn clear_case<S: StagingHandle>(
    handles: &StoreHandles<S>,
    config: &CoordinatorConfig,
    case_id: CaseId,
) -> Result<CaseClearReport, CoordinatorError> {
    let _writer = handles.lock_writers(config)?;

    let keys = [DocumentKey::Classes, DocumentKey::Individuals(case_id)];
    let mut snapshot = retry_transient(config, "snapshot documents", || handles.permanent().snapshot(&keys))?;

    let mut report = CaseClearReport::new(case_id);
    match remove_case(handles, config, case_id, &mut snapshot, &mut report) {
        Ok(()) => Ok(report),
        Err(e) => Err(handles.rollback(config, &snapshot, e)),
    }
}

fn remove_case<S: StagingHandle>(
    handles: &StoreHandles<S>,
    config: &CoordinatorConfig,
    case_id: CaseId,
    snapshot: &mut DocumentSnapshot,
    report: &mut CaseClearReport,
) -> Result<(), CoordinatorError> {
    let permanent = handles.permanent();
    let operation_id = OperationId::new();

    let mut classes = retry_transient(config, "load classes", || permanent.load_classes())?;
    for id in classes.contributed_by(case_id) {
        match classes.retract_case(&id, case_id)? {
            RetractOutcome::Retracted { .. } => report.retracted_classes += 1,
            RetractOutcome::Deleted => report.deleted_classes += 1,
            RetractOutcome::NotContributed => {}
        }
    }

    // An emptied document is written as a new version so history keeps the old one
    let mut individuals = retry_transient(config, "load individuals", || permanent.load_individuals(case_id))?;
    report.deleted_individuals = individuals.clear();

    if classes.is_dirty() {
        let version = retry_transient(config, "write classes", || {
            permanent.save_classes(&mut classes, Some(operation_id))
        })
        .map_err(CoordinatorError::write_failure)?;
        snapshot.record_write(DocumentKey::Classes, version);
    }
    if individuals.is_dirty() {
        let version = retry_transient(config, "write individuals", || {
            permanent.save_individuals(&mut individuals, Some(operation_id))
        })
        .map_err(CoordinatorError::write_failure)?;
        snapshot.record_write(DocumentKey::Individuals(case_id), version);
    }

    // Staging goes last: once rows are deleted there is nothing to restore them from
    report.deleted_staged = retry_transient(config, "delete staging rows", || {
        handles.with_staging(|s| s.delete_case(case_id))
    })
    .map_err(CoordinatorError::write_failure)?;

    tracing::debug!("Clear {} of case {} finished", operation_id, case_id);
    Ok(())
}
