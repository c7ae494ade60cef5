//! Trait definitions for storage seams
//!
//! Infrastructure implementations live in other crates (casegraph-store).

use crate::{CaseId, CommitState, EntityId, ExtractionPass, SectionType, StagingKey, StagingRecord};

/// Per-case workspace of candidate entities
///
/// Implemented by the infrastructure layer (casegraph-store). Records are
/// keyed by (case, pass, section, identifier); `put` on an existing key
/// replaces the record while keeping its insertion position.
pub trait StagingStore {
    /// Error type for store operations
    type Error;

    /// Insert or replace a staged record, returning it with its sequence assigned
    fn put(&mut self, record: StagingRecord) -> Result<StagingRecord, Self::Error>;

    /// Get a record by key, in any commit state
    fn get(&self, key: &StagingKey) -> Result<Option<StagingRecord>, Self::Error>;

    /// List records matching the filter, in insertion order
    fn list(&self, filter: &StagingFilter) -> Result<Vec<StagingRecord>, Self::Error>;

    /// Delete the uncommitted records of one pass/section of a case
    fn clear(
        &mut self,
        case_id: CaseId,
        pass: ExtractionPass,
        section: SectionType,
    ) -> Result<StagingClearCounts, Self::Error>;

    /// All rows of a case (any state) whose identifier is in `ids`, in insertion order
    fn records_for_ids(&self, case_id: CaseId, ids: &[EntityId]) -> Result<Vec<StagingRecord>, Self::Error>;

    /// Cases that have staged the identifier, in any state
    fn owners_of(&self, id: &EntityId) -> Result<Vec<CaseId>, Self::Error>;

    /// Flip uncommitted rows of a case to committed in one transaction
    ///
    /// Rows already committed are left untouched, so replaying the flip is a
    /// no-op. Returns the number of rows that changed state.
    fn mark_committed(&mut self, case_id: CaseId, ids: &[EntityId], committed_at: u64) -> Result<usize, Self::Error>;

    /// Delete every row of a case, committed markers included
    fn delete_case(&mut self, case_id: CaseId) -> Result<usize, Self::Error>;

    /// Cases that currently have uncommitted rows
    fn cases_with_uncommitted(&self) -> Result<Vec<CaseId>, Self::Error>;
}

/// Filter for listing staged records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingFilter {
    /// Case to list (required; staging is never listed across cases)
    pub case_id: CaseId,

    /// Filter by extraction pass
    pub pass: Option<ExtractionPass>,

    /// Filter by section
    pub section: Option<SectionType>,

    /// Filter by commit state (`None` lists both)
    pub state: Option<CommitState>,
}

impl StagingFilter {
    /// Uncommitted records of a case
    pub fn for_case(case_id: CaseId) -> Self {
        Self {
            case_id,
            pass: None,
            section: None,
            state: Some(CommitState::Uncommitted),
        }
    }

    /// Restrict to one pass
    pub fn with_pass(mut self, pass: ExtractionPass) -> Self {
        self.pass = Some(pass);
        self
    }

    /// Restrict to one section
    pub fn with_section(mut self, section: SectionType) -> Self {
        self.section = Some(section);
        self
    }

    /// Include committed markers as well
    pub fn any_state(mut self) -> Self {
        self.state = None;
        self
    }
}

/// Counts returned by [`StagingStore::clear`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagingClearCounts {
    /// Uncommitted rows deleted
    pub deleted: usize,

    /// Committed rows in the same pass/section that were left in place
    pub committed_retained: usize,
}
