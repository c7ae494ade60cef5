//! What a case's prompts may see
//!
//! The visible set for case X is every committed class, the committed
//! individuals X owns, and X's own uncommitted staging rows from any pass or
//! section. Nothing is cached; every call re-reads the stores.

use crate::{CoordinatorError, StagingHandle, StoreHandles};
use casegraph_domain::traits::StagingFilter;
use casegraph_domain::{
    CaseId, CommittedClass, CommittedIndividual, Entity, EntityId, ExtractionPass, SectionType, StagingRecord,
};
use casegraph_store::SqliteStagingStore;
use std::collections::HashSet;

/// One entry of the ordered prompt entity list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromptEntity<'a> {
    /// Committed class, visible to every case
    Class(&'a CommittedClass),
    /// Committed individual owned by the querying case
    Individual(&'a CommittedIndividual),
    /// Uncommitted record staged by the querying case
    Staged(&'a StagingRecord),
}

impl<'a> PromptEntity<'a> {
    /// The underlying entity
    pub fn entity(&self) -> &'a Entity {
        match self {
            PromptEntity::Class(c) => &c.entity,
            PromptEntity::Individual(i) => &i.entity,
            PromptEntity::Staged(r) => &r.entity,
        }
    }

    /// Whether the entry comes from the permanent store
    pub fn is_committed(&self) -> bool {
        !matches!(self, PromptEntity::Staged(_))
    }
}

/// Entities visible to one case, in prompt order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptEntities {
    /// Committed classes, by identifier
    pub classes: Vec<CommittedClass>,

    /// The case's committed individuals, by identifier
    pub individuals: Vec<CommittedIndividual>,

    /// The case's uncommitted records, by (pass, section, insertion order)
    pub staged: Vec<StagingRecord>,

    /// Staged records left out because a committed entity has the same identifier
    pub shadowed: usize,
}

impl PromptEntities {
    /// Classes, then individuals, then staged records
    pub fn iter(&self) -> impl Iterator<Item = PromptEntity<'_>> {
        self.classes
            .iter()
            .map(PromptEntity::Class)
            .chain(self.individuals.iter().map(PromptEntity::Individual))
            .chain(self.staged.iter().map(PromptEntity::Staged))
    }

    /// Number of visible entities
    pub fn len(&self) -> usize {
        self.classes.len() + self.individuals.len() + self.staged.len()
    }

    /// Whether nothing is visible
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an identifier is visible
    pub fn contains(&self, id: &EntityId) -> bool {
        self.iter().any(|e| &e.entity().id == id)
    }
}

/// Read-only visibility resolver used by prompt building
pub struct EntityQueryService<S = SqliteStagingStore> {
    handles: StoreHandles<S>,
}

impl<S: StagingHandle> EntityQueryService<S> {
    /// Create the service
    pub fn new(handles: StoreHandles<S>) -> Self {
        Self { handles }
    }

    /// Entities visible to `case_id` while extracting `pass` / `section`
    ///
    /// The pass and section do not narrow the result: earlier passes of the
    /// same case stay visible to later ones.
    pub fn entities_for_prompt(
        &self,
        case_id: CaseId,
        pass: ExtractionPass,
        section: SectionType,
    ) -> Result<PromptEntities, CoordinatorError> {
        // Staging first: a commit landing between the reads then shows up
        // as shadowed rather than vanishing from both lists
        let mut staged = self
            .handles
            .with_staging(|s| s.list(&StagingFilter::for_case(case_id)))?;

        let permanent = self.handles.permanent();
        let classes = permanent.classes()?;
        let individuals = permanent.individuals(case_id)?;

        let committed: HashSet<&EntityId> = classes
            .iter()
            .map(|c| &c.entity.id)
            .chain(individuals.iter().map(|i| &i.entity.id))
            .collect();

        let before = staged.len();
        staged.retain(|r| r.entity.case_id == case_id && !committed.contains(&r.entity.id));
        let shadowed = before - staged.len();
        staged.sort_by_key(|r| r.prompt_order());

        tracing::debug!(
            "Prompt entities for case {} ({} / {}): {} classes, {} individuals, {} staged, {} shadowed",
            case_id,
            pass,
            section,
            classes.len(),
            individuals.len(),
            staged.len(),
            shadowed
        );

        Ok(PromptEntities {
            classes,
            individuals,
            staged,
            shadowed,
        })
    }
}
