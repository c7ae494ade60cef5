//! Startup repair of the crash window between document writes and the flip
//!
//! A staging row is flipped when its case's contribution is already in the
//! permanent store with identical content: for a class, the case is in the
//! class's provenance; for an individual, it is in the case's document.

use crate::retry::retry_transient;
use crate::{CoordinatorConfig, CoordinatorError, LockRegistry, StagingHandle, StoreHandles};
use casegraph_domain::traits::StagingFilter;
use casegraph_domain::{current_timestamp, CaseId, EntityId, EntityKind};
use casegraph_store::SqliteStagingStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Rows repaired by a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Cases that had uncommitted rows
    pub cases_scanned: usize,

    /// Rows flipped, per case (only cases with at least one flip)
    pub flipped: BTreeMap<CaseId, usize>,
}

impl ReconcileReport {
    /// Total rows flipped
    pub fn rows_flipped(&self) -> usize {
        self.flipped.values().sum()
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Scanned {} cases, flipped {} written-but-uncommitted rows in {} cases",
            self.cases_scanned,
            self.rows_flipped(),
            self.flipped.len()
        )
    }
}

/// Re-runs the idempotent flip for rows whose write already landed
pub struct Reconciler<S = SqliteStagingStore> {
    handles: StoreHandles<S>,
    locks: Arc<LockRegistry>,
    config: CoordinatorConfig,
}

impl<S: StagingHandle> Reconciler<S> {
    /// Create the reconciler
    pub fn new(handles: StoreHandles<S>, locks: Arc<LockRegistry>, config: CoordinatorConfig) -> Self {
        Self {
            handles,
            locks,
            config,
        }
    }

    /// Reconcile every case with uncommitted rows
    pub async fn run(&self) -> Result<ReconcileReport, CoordinatorError> {
        let cases = self.handles.with_staging(|s| s.cases_with_uncommitted())?;
        let mut report = ReconcileReport {
            cases_scanned: cases.len(),
            ..ReconcileReport::default()
        };

        for case_id in cases {
            let flipped = self.run_case(case_id).await?;
            if flipped > 0 {
                report.flipped.insert(case_id, flipped);
            }
        }

        if report.rows_flipped() > 0 {
            tracing::warn!("Reconciliation repaired partial commits: {}", report.summary());
        } else {
            tracing::info!("{}", report.summary());
        }
        Ok(report)
    }

    /// Reconcile one case, returning the number of rows flipped
    pub async fn run_case(&self, case_id: CaseId) -> Result<usize, CoordinatorError> {
        let guard = self.locks.lock_case(case_id).await?;
        let handles = self.handles.clone();
        let config = self.config.clone();

        let flipped = tokio::task::spawn_blocking(move || {
            let _held = guard;
            reconcile_case(&handles, &config, case_id)
        })
        .await??;
        Ok(flipped)
    }
}

fn reconcile_case<S: StagingHandle>(
    handles: &StoreHandles<S>,
    config: &CoordinatorConfig,
    case_id: CaseId,
) -> Result<usize, CoordinatorError> {
    let _writer = handles.lock_writers(config)?;

    let rows = handles.with_staging(|s| s.list(&StagingFilter::for_case(case_id)))?;
    if rows.is_empty() {
        return Ok(0);
    }

    let permanent = handles.permanent();
    let classes = permanent.load_classes()?;
    let individuals = permanent.load_individuals(case_id)?;

    let written: BTreeSet<EntityId> = rows
        .iter()
        .filter(|row| match row.entity.kind {
            EntityKind::Class => classes.get(&row.entity.id).is_some_and(|c| {
                c.provenance.includes_case(case_id) && c.entity.same_content(&row.entity)
            }),
            EntityKind::Individual => individuals
                .get(&row.entity.id)
                .is_some_and(|i| i.entity.same_content(&row.entity)),
        })
        .map(|row| row.entity.id.clone())
        .collect();

    if written.is_empty() {
        return Ok(0);
    }

    let ids: Vec<EntityId> = written.into_iter().collect();
    let flipped = retry_transient(config, "reconcile flip", || {
        handles.with_staging(|s| s.mark_committed(case_id, &ids, current_timestamp()))
    })?;

    tracing::debug!("Reconciled {} rows for case {}", flipped, case_id);
    Ok(flipped)
}
