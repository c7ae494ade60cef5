//! Provenance tracking: which cases discovered an entity, and where

use crate::case::{CaseId, ExtractionPass, SectionType};
use crate::entity::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Origin record for an entity
///
/// `discovered_in_cases` only grows, except through explicit whole-case
/// retraction ([`ProvenanceRecord::remove_case`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Entity this record describes
    pub entity_id: EntityId,

    /// Case that first surfaced the entity
    pub first_discovered_case: CaseId,

    /// When it was first surfaced (timestamp)
    pub first_discovered_at: u64,

    /// Every case that has independently surfaced the entity
    pub discovered_in_cases: BTreeSet<CaseId>,

    /// Section of the first discovery
    pub discovered_in_section: SectionType,

    /// Pass of the first discovery
    pub discovered_in_pass: ExtractionPass,

    /// Optional excerpt of the text the entity was extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,

    /// Open extension metadata (e.g. extractor model, prompt version)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
}

impl ProvenanceRecord {
    /// Create a provenance record for a first discovery
    pub fn new(
        entity_id: EntityId,
        case_id: CaseId,
        pass: ExtractionPass,
        section: SectionType,
        discovered_at: u64,
    ) -> Self {
        Self {
            entity_id,
            first_discovered_case: case_id,
            first_discovered_at: discovered_at,
            discovered_in_cases: BTreeSet::from([case_id]),
            discovered_in_section: section,
            discovered_in_pass: pass,
            source_text: None,
            extensions: BTreeMap::new(),
        }
    }

    /// Attach a source text excerpt
    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    /// Attach an extension entry
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Record that another case discovered the entity
    ///
    /// Returns `false` if the case was already recorded.
    pub fn add_case(&mut self, case_id: CaseId) -> bool {
        self.discovered_in_cases.insert(case_id)
    }

    /// Retract a case's contribution
    ///
    /// Returns `false` if the case was not recorded.
    pub fn remove_case(&mut self, case_id: CaseId) -> bool {
        self.discovered_in_cases.remove(&case_id)
    }

    /// Whether the case contributed to this entity
    pub fn includes_case(&self, case_id: CaseId) -> bool {
        self.discovered_in_cases.contains(&case_id)
    }

    /// Whether no case supports this entity any longer
    pub fn is_orphaned(&self) -> bool {
        self.discovered_in_cases.is_empty()
    }
}
