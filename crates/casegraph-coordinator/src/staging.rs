//! Validated writes into a case's staging workspace
//!
//! Validation runs on the caller's task; the SQLite writes run on the
//! blocking pool under the case lock and the writer lock, so a row is never
//! replaced while another process is committing it.

use crate::{CoordinatorError, LockRegistry, StagingHandle, StoreHandles};
use casegraph_domain::traits::StagingFilter;
use casegraph_domain::{current_timestamp, Candidate, CaseId, StagingKey, StagingRecord};
use casegraph_gatekeeper::CandidateValidator;
use casegraph_store::SqliteStagingStore;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Entry point for extraction producers and curator edits
pub struct StagingService<S = SqliteStagingStore> {
    handles: StoreHandles<S>,
    locks: Arc<LockRegistry>,
    validator: CandidateValidator,
}

impl<S: StagingHandle> StagingService<S> {
    /// Create the service
    pub fn new(handles: StoreHandles<S>, locks: Arc<LockRegistry>, validator: CandidateValidator) -> Self {
        Self {
            handles,
            locks,
            validator,
        }
    }

    /// Convert and validate a candidate without storing it
    pub fn prepare(&self, candidate: Candidate) -> Result<StagingRecord, CoordinatorError> {
        let identifier = candidate.identifier.clone();
        let record = candidate.into_staging_record(current_timestamp());

        let result = self.validator.validate(&record);
        if !result.is_accepted() {
            return Err(CoordinatorError::Validation {
                identifier,
                reasons: result.reasons.iter().map(ToString::to_string).collect(),
            });
        }
        Ok(record)
    }

    /// Stage one candidate, replacing any record under the same key
    pub async fn stage(&self, candidate: Candidate) -> Result<StagingRecord, CoordinatorError> {
        let record = self.prepare(candidate)?;
        let guard = self.locks.lock_case(record.entity.case_id).await?;
        let handles = self.handles.clone();
        let config = self.locks.config().clone();

        let stored = tokio::task::spawn_blocking(move || {
            let _held = guard;
            let _writer = handles.lock_writers(&config)?;
            Ok::<_, CoordinatorError>(handles.with_staging(|s| s.put(record))?)
        })
        .await??;
        tracing::debug!(
            "Staged {} for case {} ({} / {})",
            stored.entity.id,
            stored.entity.case_id,
            stored.entity.extraction_pass,
            stored.entity.section_type
        );
        Ok(stored)
    }

    /// Stage a batch; nothing is written unless every candidate validates
    pub async fn stage_batch(&self, candidates: Vec<Candidate>) -> Result<Vec<StagingRecord>, CoordinatorError> {
        let records = candidates
            .into_iter()
            .map(|candidate| self.prepare(candidate))
            .collect::<Result<Vec<_>, _>>()?;

        // Ascending case order keeps lock acquisition deadlock-free
        let cases: BTreeSet<CaseId> = records.iter().map(|r| r.entity.case_id).collect();
        let mut guards = Vec::with_capacity(cases.len());
        for case_id in cases {
            guards.push(self.locks.lock_case(case_id).await?);
        }

        let handles = self.handles.clone();
        let config = self.locks.config().clone();
        let stored = tokio::task::spawn_blocking(move || {
            let _held = guards;
            let _writer = handles.lock_writers(&config)?;

            let mut stored = Vec::with_capacity(records.len());
            for record in records {
                stored.push(handles.with_staging(|s| s.put(record))?);
            }
            Ok::<_, CoordinatorError>(stored)
        })
        .await??;

        tracing::info!("Staged {} candidates", stored.len());
        Ok(stored)
    }

    /// Staged records matching the filter, in insertion order
    pub fn list(&self, filter: &StagingFilter) -> Result<Vec<StagingRecord>, CoordinatorError> {
        Ok(self.handles.with_staging(|s| s.list(filter))?)
    }

    /// One staged record by key
    pub fn get(&self, key: &StagingKey) -> Result<Option<StagingRecord>, CoordinatorError> {
        Ok(self.handles.with_staging(|s| s.get(key))?)
    }
}
