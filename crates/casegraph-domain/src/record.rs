//! Staged and committed records

use crate::case::{CaseId, ExtractionPass, SectionType};
use crate::entity::{CommitState, Entity, EntityId, EntityKind};
use crate::provenance::ProvenanceRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of a staging record: (case, pass, section, identifier)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StagingKey {
    /// Owning case
    pub case_id: CaseId,
    /// Extraction pass
    pub pass: ExtractionPass,
    /// Document section
    pub section: SectionType,
    /// Entity identifier
    pub entity_id: EntityId,
}

/// A candidate entity in a case's staging workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingRecord {
    /// The staged entity
    pub entity: Entity,

    /// Where it came from
    pub provenance: ProvenanceRecord,

    /// Insertion sequence within the staging store (assigned by the store)
    #[serde(default)]
    pub sequence: u64,
}

impl StagingRecord {
    /// Create a staging record (sequence is assigned on insert)
    pub fn new(entity: Entity, provenance: ProvenanceRecord) -> Self {
        Self {
            entity,
            provenance,
            sequence: 0,
        }
    }

    /// The record's staging key
    pub fn key(&self) -> StagingKey {
        StagingKey {
            case_id: self.entity.case_id,
            pass: self.entity.extraction_pass,
            section: self.entity.section_type,
            entity_id: self.entity.id.clone(),
        }
    }

    /// Whether the record is still uncommitted
    pub fn is_uncommitted(&self) -> bool {
        self.entity.commit_state == CommitState::Uncommitted
    }

    /// Ordering used for prompts and commit selection: (pass, section, insertion)
    pub fn prompt_order(&self) -> (ExtractionPass, SectionType, u64) {
        (self.entity.extraction_pass, self.entity.section_type, self.sequence)
    }
}

/// A class promoted to the shared classes document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedClass {
    /// Class entity (commit_state is always `Committed`)
    pub entity: Entity,
    /// Provenance, including every case that discovered it
    pub provenance: ProvenanceRecord,
}

/// An individual promoted to its case's individuals document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedIndividual {
    /// Individual entity (commit_state is always `Committed`)
    pub entity: Entity,
    /// Provenance of the individual
    pub provenance: ProvenanceRecord,
}

impl CommittedIndividual {
    /// Case that owns the individual
    pub fn owner(&self) -> CaseId {
        self.entity.case_id
    }
}

/// Candidate entity as handed over by an extraction producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// URI identifier
    pub identifier: String,
    /// Class or individual
    pub kind: EntityKind,
    /// Human-readable label
    pub label: String,
    /// Definition text
    #[serde(default)]
    pub definition: String,
    /// Free-form attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Producing case
    pub case_id: CaseId,
    /// Extraction pass
    pub pass: ExtractionPass,
    /// Document section
    pub section: SectionType,
    /// Optional source excerpt
    #[serde(default)]
    pub source_text: Option<String>,
    /// Provenance extension metadata
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

impl Candidate {
    /// Convert into a staging record stamped with `now`
    ///
    /// The identifier is not validated here; the gatekeeper does that at the
    /// staging boundary.
    pub fn into_staging_record(self, now: u64) -> StagingRecord {
        let id = EntityId::new(self.identifier.trim());
        let mut entity = Entity::new(
            id.clone(),
            self.kind,
            self.label,
            self.definition,
            self.case_id,
            self.pass,
            self.section,
            now,
        );
        entity.attributes = self.attributes;

        let mut provenance = ProvenanceRecord::new(id, self.case_id, self.pass, self.section, now);
        provenance.source_text = self.source_text;
        provenance.extensions = self.extensions;

        StagingRecord::new(entity, provenance)
    }
}
