//! All-or-nothing promotion of staged entities
//!
//! A commit runs in two halves. The async half takes the case lock and the
//! classes lock. The blocking half takes the writer lock shared with other
//! processes, plans the batch, snapshots the touched documents, applies
//! appends and merges to in-memory copies, writes them, and only then flips
//! the staging rows in one transaction. Any failure after the snapshot
//! removes the versions this commit wrote, leaving the permanent store
//! byte-identical and the staging rows uncommitted.
//!
//! A save that finds the document head moved is rolled back the same way,
//! then reloaded and re-applied, up to `max_attempts` times.
//!
//! The blocking half owns the lock guards and is never aborted, so dropping
//! the caller's future cannot leave a half-applied commit behind.

use crate::retry::{retry_transient, Backoff};
use crate::{CoordinatorConfig, CoordinatorError, LockRegistry, StagingHandle, StoreHandles};
use casegraph_domain::{current_timestamp, CaseId, EntityId, EntityKind, OperationId, StagingRecord};
use casegraph_store::{DocumentKey, DocumentSnapshot, SqliteStagingStore};
use std::collections::HashSet;
use std::sync::Arc;

/// Exact outcome of a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// Operation identifier, recorded in every document version written
    pub operation_id: OperationId,

    /// Committing case
    pub case_id: CaseId,

    /// New classes added to the shared document
    pub classes_appended: usize,

    /// Identical existing classes that gained this case in their provenance
    pub classes_merged: usize,

    /// New individuals added to the case's document
    pub individuals_appended: usize,

    /// Selected identifiers that were already committed and were skipped
    pub already_committed: usize,

    /// Staging rows flipped to committed
    pub rows_flipped: usize,

    /// Document versions written
    pub documents_written: usize,
}

impl CommitReport {
    fn new(operation_id: OperationId, case_id: CaseId) -> Self {
        Self {
            operation_id,
            case_id,
            classes_appended: 0,
            classes_merged: 0,
            individuals_appended: 0,
            already_committed: 0,
            rows_flipped: 0,
            documents_written: 0,
        }
    }

    /// Entities committed by this operation
    pub fn committed(&self) -> usize {
        self.classes_appended + self.classes_merged + self.individuals_appended
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Case {}: {} classes appended, {} classes merged, {} individuals appended, \
             {} already committed ({} staging rows flipped, {} documents written)",
            self.case_id,
            self.classes_appended,
            self.classes_merged,
            self.individuals_appended,
            self.already_committed,
            self.rows_flipped,
            self.documents_written
        )
    }
}

/// Promotes selected staged entities into the permanent store
pub struct CommitCoordinator<S = SqliteStagingStore> {
    handles: StoreHandles<S>,
    locks: Arc<LockRegistry>,
    config: CoordinatorConfig,
}

impl<S: StagingHandle> CommitCoordinator<S> {
    /// Create the coordinator
    pub fn new(handles: StoreHandles<S>, locks: Arc<LockRegistry>, config: CoordinatorConfig) -> Self {
        Self {
            handles,
            locks,
            config,
        }
    }

    /// Commit the selected identifiers staged by `case_id` as one batch
    ///
    /// # Errors
    ///
    /// - `VisibilityViolation` if an identifier is staged only by another case
    /// - `NotFound` if an identifier is not staged anywhere
    /// - `IdentifierCollision` if a different class already uses an identifier
    /// - `StorageWriteFailure` if a write failed (the commit was rolled back)
    /// - `ConcurrencyConflict` if a lock could not be acquired in time, or
    ///   the documents kept moving under every attempt
    pub async fn commit(&self, case_id: CaseId, entity_ids: &[EntityId]) -> Result<CommitReport, CoordinatorError> {
        let operation_id = OperationId::new();

        let mut seen = HashSet::new();
        let selection: Vec<EntityId> = entity_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();

        if selection.is_empty() {
            return Ok(CommitReport::new(operation_id, case_id));
        }

        let case_guard = self.locks.lock_case(case_id).await?;
        let classes_guard = self.locks.lock_classes().await?;

        let handles = self.handles.clone();
        let config = self.config.clone();
        let report = tokio::task::spawn_blocking(move || {
            let _held = (case_guard, classes_guard);
            run_commit(&handles, &config, operation_id, case_id, &selection)
        })
        .await??;

        tracing::info!("Commit {} finished: {}", report.operation_id, report.summary());
        Ok(report)
    }
}

fn run_commit<S: StagingHandle>(
    handles: &StoreHandles<S>,
    config: &CoordinatorConfig,
    operation_id: OperationId,
    case_id: CaseId,
    selection: &[EntityId],
) -> Result<CommitReport, CoordinatorError> {
    let _writer = handles.lock_writers(config)?;

    let mut planned = CommitReport::new(operation_id, case_id);
    let plan = plan_commit(handles, config, case_id, selection, &mut planned)?;
    if plan.is_empty() {
        return Ok(planned);
    }

    let mut keys = Vec::new();
    if plan.iter().any(|r| r.entity.kind == EntityKind::Class) {
        keys.push(DocumentKey::Classes);
    }
    if plan.iter().any(|r| r.entity.kind == EntityKind::Individual) {
        keys.push(DocumentKey::Individuals(case_id));
    }

    let mut backoff = Backoff::from_config(config);
    let mut attempt = 1;
    loop {
        let mut snapshot = retry_transient(config, "snapshot documents", || handles.permanent().snapshot(&keys))?;
        tracing::debug!("Commit {} snapshot taken over {} documents", operation_id, keys.len());

        let mut report = planned.clone();
        let error = match apply_and_flip(handles, config, operation_id, case_id, &plan, &mut snapshot, &mut report) {
            Ok(()) => return Ok(report),
            Err(e) => handles.rollback(config, &snapshot, e),
        };

        match error {
            CoordinatorError::ConcurrencyConflict(reason) if attempt < config.max_attempts => {
                let delay = backoff.next_delay();
                tracing::warn!(
                    "Commit {} lost a document race (attempt {}/{}): {}; reloading in {:?}",
                    operation_id,
                    attempt,
                    config.max_attempts,
                    reason,
                    delay
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            other => return Err(other),
        }
    }
}

/// Resolve the selection to one staging record per identifier
///
/// When an identifier is staged in several pass/sections, the earliest
/// (pass, section, insertion) uncommitted row supplies the content.
fn plan_commit<S: StagingHandle>(
    handles: &StoreHandles<S>,
    config: &CoordinatorConfig,
    case_id: CaseId,
    selection: &[EntityId],
    report: &mut CommitReport,
) -> Result<Vec<StagingRecord>, CoordinatorError> {
    let rows = retry_transient(config, "read staging rows", || {
        handles.with_staging(|s| s.records_for_ids(case_id, selection))
    })?;

    let mut plan = Vec::with_capacity(selection.len());
    for id in selection {
        let for_id: Vec<&StagingRecord> = rows.iter().filter(|r| &r.entity.id == id).collect();

        if for_id.is_empty() {
            let owners = handles.with_staging(|s| s.owners_of(id))?;
            if owners.is_empty() {
                return Err(CoordinatorError::NotFound(format!("{} is not staged by any case", id)));
            }
            return Err(CoordinatorError::VisibilityViolation {
                case_id,
                entity_id: id.clone(),
            });
        }

        match for_id
            .into_iter()
            .filter(|r| r.is_uncommitted())
            .min_by_key(|r| r.prompt_order())
        {
            Some(record) => plan.push(record.clone()),
            None => report.already_committed += 1,
        }
    }
    Ok(plan)
}

fn apply_and_flip<S: StagingHandle>(
    handles: &StoreHandles<S>,
    config: &CoordinatorConfig,
    operation_id: OperationId,
    case_id: CaseId,
    plan: &[StagingRecord],
    snapshot: &mut DocumentSnapshot,
    report: &mut CommitReport,
) -> Result<(), CoordinatorError> {
    let permanent = handles.permanent();
    let mut classes = retry_transient(config, "load classes", || permanent.load_classes())?;
    let mut individuals = retry_transient(config, "load individuals", || permanent.load_individuals(case_id))?;
    let now = current_timestamp();

    for record in plan {
        let id = &record.entity.id;
        let mut entity = record.entity.clone();
        entity.mark_committed(now);

        match entity.kind {
            EntityKind::Class => match classes.get(id).map(|c| c.entity.same_content(&entity)) {
                Some(true) => {
                    if classes.merge_provenance(id, case_id)? {
                        report.classes_merged += 1;
                    } else {
                        // This case is already in the class's provenance
                        report.already_committed += 1;
                    }
                }
                Some(false) => return Err(CoordinatorError::IdentifierCollision(id.to_string())),
                None => {
                    classes.append_class(entity, record.provenance.clone())?;
                    report.classes_appended += 1;
                }
            },
            EntityKind::Individual => match individuals.get(id).map(|i| i.entity.same_content(&entity)) {
                // Written by an earlier commit whose flip never landed
                Some(true) => report.already_committed += 1,
                Some(false) => return Err(CoordinatorError::IdentifierCollision(id.to_string())),
                None => {
                    individuals.append_individual(entity, record.provenance.clone())?;
                    report.individuals_appended += 1;
                }
            },
        }
    }

    if classes.is_dirty() {
        let version = retry_transient(config, "write classes", || {
            permanent.save_classes(&mut classes, Some(operation_id))
        })
        .map_err(CoordinatorError::write_failure)?;
        snapshot.record_write(DocumentKey::Classes, version);
        report.documents_written += 1;
    }
    if individuals.is_dirty() {
        let version = retry_transient(config, "write individuals", || {
            permanent.save_individuals(&mut individuals, Some(operation_id))
        })
        .map_err(CoordinatorError::write_failure)?;
        snapshot.record_write(DocumentKey::Individuals(case_id), version);
        report.documents_written += 1;
    }

    let ids: Vec<EntityId> = plan.iter().map(|r| r.entity.id.clone()).collect();
    report.rows_flipped = retry_transient(config, "flip staging rows", || {
        handles.with_staging(|s| s.mark_committed(case_id, &ids, now))
    })
    .map_err(CoordinatorError::write_failure)?;

    tracing::debug!(
        "Commit {} wrote {} documents and flipped {} rows",
        operation_id,
        report.documents_written,
        report.rows_flipped
    );
    Ok(())
}
