//! Structured results of clear operations

use casegraph_domain::{CaseId, ExtractionPass, SectionType};
use serde::Serialize;

/// Result of clearing one pass/section of a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    /// Case that was cleared
    pub case_id: CaseId,

    /// Pass that was cleared
    pub pass: ExtractionPass,

    /// Section that was cleared
    pub section: SectionType,

    /// Uncommitted staging rows deleted
    pub deleted_staged: usize,

    /// Committed entities from this pass/section the case still sees as its own
    ///
    /// Classes the case helped discover plus the case's individuals.
    pub remaining_committed_same_case: usize,

    /// Committed classes from this pass/section discovered only by other cases
    pub remaining_committed_other_cases: usize,
}

impl ClearReport {
    /// Committed entities left in place
    pub fn remaining_committed(&self) -> usize {
        self.remaining_committed_same_case + self.remaining_committed_other_cases
    }

    /// Generate a summary line
    pub fn summary(&self) -> String {
        format!(
            "Cleared case {} {} {}: {} staged deleted, {} committed remain ({} this case, {} other cases)",
            self.case_id,
            self.pass,
            self.section,
            self.deleted_staged,
            self.remaining_committed(),
            self.remaining_committed_same_case,
            self.remaining_committed_other_cases
        )
    }
}

/// Result of removing every trace of a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseClearReport {
    /// Case that was cleared
    pub case_id: CaseId,

    /// Staging rows deleted, committed markers included
    pub deleted_staged: usize,

    /// Individuals removed from the case's document
    pub deleted_individuals: usize,

    /// Classes the case was retracted from that other cases still hold
    pub retracted_classes: usize,

    /// Classes deleted because no other case discovered them
    pub deleted_classes: usize,
}

impl CaseClearReport {
    /// An empty report for a case
    pub fn new(case_id: CaseId) -> Self {
        Self {
            case_id,
            deleted_staged: 0,
            deleted_individuals: 0,
            retracted_classes: 0,
            deleted_classes: 0,
        }
    }

    /// Whether the case left no trace to remove
    pub fn is_empty(&self) -> bool {
        self.deleted_staged == 0
            && self.deleted_individuals == 0
            && self.retracted_classes == 0
            && self.deleted_classes == 0
    }

    /// Generate a summary line
    pub fn summary(&self) -> String {
        format!(
            "Cleared case {}: {} staged rows, {} individuals, {} classes deleted, {} classes retracted",
            self.case_id,
            self.deleted_staged,
            self.deleted_individuals,
            self.deleted_classes,
            self.retracted_classes
        )
    }
}
