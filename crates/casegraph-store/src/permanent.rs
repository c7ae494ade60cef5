//! Permanent store: versioned documents of committed classes and individuals
//!
//! Documents are loaded into in-memory copies ([`ClassesDocument`],
//! [`IndividualsDocument`]), mutated, and saved as a new version. Saving is
//! optimistic: a copy loaded at version `n` can only be written as `n + 1`.

use crate::documents::{DocumentBackend, DocumentKey, FsBackend, MemoryBackend, WriterLock};
use crate::StoreError;
use casegraph_domain::{
    current_timestamp, CaseId, CommitState, CommittedClass, CommittedIndividual, Entity, EntityId, EntityKind,
    OperationId, ProvenanceRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// On-disk format revision written into every document
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ClassesFile {
    format: u32,
    version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operation: Option<String>,
    classes: Vec<CommittedClass>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndividualsFile {
    format: u32,
    version: u64,
    case_id: CaseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operation: Option<String>,
    individuals: Vec<CommittedIndividual>,
}

/// Result of retracting one case from a committed class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetractOutcome {
    /// The case never contributed to the class; nothing changed
    NotContributed,
    /// The case was removed; other cases still support the class
    Retracted {
        /// Cases still supporting the class
        remaining: usize,
    },
    /// The case was the last supporter; the class was deleted
    Deleted,
}

/// Check kind and provenance of an entity entering a document, stamping it committed
fn prepare_committed(
    mut entity: Entity,
    provenance: ProvenanceRecord,
    expected: EntityKind,
) -> Result<(Entity, ProvenanceRecord), StoreError> {
    if entity.kind != expected {
        return Err(StoreError::InvalidData(format!(
            "{} is a {}, expected a {}",
            entity.id, entity.kind, expected
        )));
    }
    if provenance.entity_id != entity.id {
        return Err(StoreError::InvalidData(format!(
            "Provenance for {} attached to {}",
            provenance.entity_id, entity.id
        )));
    }
    if provenance.is_orphaned() {
        return Err(StoreError::InvalidData(format!(
            "Provenance for {} names no discovering case",
            entity.id
        )));
    }
    if entity.commit_state != CommitState::Committed {
        entity.mark_committed(current_timestamp());
    }
    Ok((entity, provenance))
}

/// In-memory copy of the shared classes document
#[derive(Debug, Clone, PartialEq)]
pub struct ClassesDocument {
    version: u64,
    classes: BTreeMap<EntityId, CommittedClass>,
    dirty: bool,
}

impl ClassesDocument {
    /// An empty document that has never been written
    pub fn empty() -> Self {
        Self {
            version: 0,
            classes: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Version this copy was loaded at (0 if the document does not exist yet)
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the copy has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the document holds no classes
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Look up a class by identifier
    pub fn get(&self, id: &EntityId) -> Option<&CommittedClass> {
        self.classes.get(id)
    }

    /// Classes ordered by identifier
    pub fn iter(&self) -> impl Iterator<Item = &CommittedClass> {
        self.classes.values()
    }

    /// Identifiers of classes the case contributed to
    pub fn contributed_by(&self, case_id: CaseId) -> Vec<EntityId> {
        self.classes
            .values()
            .filter(|class| class.provenance.includes_case(case_id))
            .map(|class| class.entity.id.clone())
            .collect()
    }

    /// Add a new class
    ///
    /// Fails with `IdentifierCollision` if the identifier is already present,
    /// even when the content is identical; use
    /// [`ClassesDocument::merge_provenance`] for rediscoveries.
    pub fn append_class(&mut self, entity: Entity, provenance: ProvenanceRecord) -> Result<(), StoreError> {
        if self.classes.contains_key(&entity.id) {
            return Err(StoreError::IdentifierCollision(entity.id.to_string()));
        }

        let (entity, provenance) = prepare_committed(entity, provenance, EntityKind::Class)?;
        self.classes
            .insert(entity.id.clone(), CommittedClass { entity, provenance });
        self.dirty = true;
        Ok(())
    }

    /// Record that another case discovered an existing class
    ///
    /// Content is left untouched. Returns `false` if the case was already
    /// recorded.
    pub fn merge_provenance(&mut self, id: &EntityId, case_id: CaseId) -> Result<bool, StoreError> {
        let class = self
            .classes
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let added = class.provenance.add_case(case_id);
        if added {
            self.dirty = true;
        }
        Ok(added)
    }

    /// Remove a case from a class's provenance, deleting the class if no case remains
    pub fn retract_case(&mut self, id: &EntityId, case_id: CaseId) -> Result<RetractOutcome, StoreError> {
        let class = self
            .classes
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !class.provenance.remove_case(case_id) {
            return Ok(RetractOutcome::NotContributed);
        }
        self.dirty = true;

        if class.provenance.is_orphaned() {
            self.classes.remove(id);
            Ok(RetractOutcome::Deleted)
        } else {
            Ok(RetractOutcome::Retracted {
                remaining: class.provenance.discovered_in_cases.len(),
            })
        }
    }
}

/// In-memory copy of one case's individuals document
#[derive(Debug, Clone, PartialEq)]
pub struct IndividualsDocument {
    case_id: CaseId,
    version: u64,
    individuals: BTreeMap<EntityId, CommittedIndividual>,
    dirty: bool,
}

impl IndividualsDocument {
    /// An empty document for the case that has never been written
    pub fn empty(case_id: CaseId) -> Self {
        Self {
            case_id,
            version: 0,
            individuals: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Owning case
    pub fn case_id(&self) -> CaseId {
        self.case_id
    }

    /// Version this copy was loaded at (0 if the document does not exist yet)
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the copy has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of individuals
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// Whether the document holds no individuals
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Look up an individual by identifier
    pub fn get(&self, id: &EntityId) -> Option<&CommittedIndividual> {
        self.individuals.get(id)
    }

    /// Individuals ordered by identifier
    pub fn iter(&self) -> impl Iterator<Item = &CommittedIndividual> {
        self.individuals.values()
    }

    /// Add a new individual owned by this document's case
    pub fn append_individual(&mut self, entity: Entity, provenance: ProvenanceRecord) -> Result<(), StoreError> {
        if entity.case_id != self.case_id {
            return Err(StoreError::InvalidData(format!(
                "Individual {} belongs to case {}, not case {}",
                entity.id, entity.case_id, self.case_id
            )));
        }
        if self.individuals.contains_key(&entity.id) {
            return Err(StoreError::IdentifierCollision(entity.id.to_string()));
        }

        let (entity, provenance) = prepare_committed(entity, provenance, EntityKind::Individual)?;
        self.individuals
            .insert(entity.id.clone(), CommittedIndividual { entity, provenance });
        self.dirty = true;
        Ok(())
    }

    /// Remove every individual, returning how many were removed
    pub fn clear(&mut self) -> usize {
        let removed = self.individuals.len();
        if removed > 0 {
            self.individuals.clear();
            self.dirty = true;
        }
        removed
    }
}

/// Head versions of a set of documents, captured before an operation,
/// plus the versions the operation has written since
///
/// Restoring removes only the recorded versions, so a rollback can never
/// take away a version some other writer published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    heads: BTreeMap<DocumentKey, Option<u64>>,
    written: BTreeMap<DocumentKey, BTreeSet<u64>>,
}

impl DocumentSnapshot {
    /// Documents covered by the snapshot
    pub fn keys(&self) -> impl Iterator<Item = &DocumentKey> {
        self.heads.keys()
    }

    /// Head version of a document at snapshot time (`None` if it did not exist)
    pub fn head(&self, key: &DocumentKey) -> Option<u64> {
        self.heads.get(key).copied().flatten()
    }

    /// Record a version written by the operation that owns this snapshot
    pub fn record_write(&mut self, key: DocumentKey, version: u64) {
        self.written.entry(key).or_default().insert(version);
    }

    /// Versions recorded for a document, ascending
    pub fn written(&self, key: &DocumentKey) -> Vec<u64> {
        self.written
            .get(key)
            .map(|versions| versions.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of versions recorded across all documents
    pub fn writes(&self) -> usize {
        self.written.values().map(BTreeSet::len).sum()
    }
}

/// Durable, versioned repository of committed entities
///
/// Shared by every case for classes; one document per case for individuals.
/// The store itself does not wait for locks; writers take
/// [`PermanentStore::try_lock_writers`] and retry on their own schedule.
pub struct PermanentStore {
    backend: Arc<dyn DocumentBackend>,
}

impl PermanentStore {
    /// Create a store over any document backend
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }

    /// Open a filesystem-backed store rooted at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(FsBackend::new(root)?)))
    }

    /// Create an in-memory store, returning the backend for failure injection
    pub fn in_memory() -> (Self, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (Self::new(backend.clone()), backend)
    }

    fn encode<T: Serialize>(file: &T) -> Result<Vec<u8>, StoreError> {
        let mut bytes = serde_json::to_vec_pretty(file)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn head_version(&self, key: &DocumentKey) -> Result<u64, StoreError> {
        Ok(self.backend.versions(key)?.last().copied().unwrap_or(0))
    }

    fn check_head(&self, key: &DocumentKey, expected: u64) -> Result<(), StoreError> {
        let actual = self.head_version(key)?;
        if actual != expected {
            return Err(StoreError::VersionConflict {
                document: key.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Load the current classes document
    pub fn load_classes(&self) -> Result<ClassesDocument, StoreError> {
        let Some(head) = self.backend.head(&DocumentKey::Classes)? else {
            return Ok(ClassesDocument::empty());
        };

        let file: ClassesFile = serde_json::from_slice(&head.bytes)?;
        Ok(ClassesDocument {
            version: head.version,
            classes: file
                .classes
                .into_iter()
                .map(|class| (class.entity.id.clone(), class))
                .collect(),
            dirty: false,
        })
    }

    /// Load the current individuals document of a case
    pub fn load_individuals(&self, case_id: CaseId) -> Result<IndividualsDocument, StoreError> {
        let Some(head) = self.backend.head(&DocumentKey::Individuals(case_id))? else {
            return Ok(IndividualsDocument::empty(case_id));
        };

        let file: IndividualsFile = serde_json::from_slice(&head.bytes)?;
        if file.case_id != case_id {
            return Err(StoreError::InvalidData(format!(
                "Individuals document for case {} claims case {}",
                case_id, file.case_id
            )));
        }

        Ok(IndividualsDocument {
            case_id,
            version: head.version,
            individuals: file
                .individuals
                .into_iter()
                .map(|individual| (individual.entity.id.clone(), individual))
                .collect(),
            dirty: false,
        })
    }

    /// Write a modified classes copy as the next version
    ///
    /// A clean copy is not written. Returns the document's head version.
    pub fn save_classes(&self, doc: &mut ClassesDocument, operation: Option<OperationId>) -> Result<u64, StoreError> {
        if !doc.dirty {
            return Ok(doc.version);
        }

        let key = DocumentKey::Classes;
        self.check_head(&key, doc.version)?;

        let next = doc.version + 1;
        let bytes = Self::encode(&ClassesFile {
            format: FORMAT_VERSION,
            version: next,
            operation: operation.map(|op| op.to_string()),
            classes: doc.classes.values().cloned().collect(),
        })?;
        self.backend.write_version(&key, next, &bytes)?;

        doc.version = next;
        doc.dirty = false;
        tracing::debug!("Wrote {} version {}", key, next);
        Ok(next)
    }

    /// Write a modified individuals copy as the next version
    ///
    /// A clean copy is not written. Returns the document's head version.
    pub fn save_individuals(
        &self,
        doc: &mut IndividualsDocument,
        operation: Option<OperationId>,
    ) -> Result<u64, StoreError> {
        if !doc.dirty {
            return Ok(doc.version);
        }

        let key = DocumentKey::Individuals(doc.case_id);
        self.check_head(&key, doc.version)?;

        let next = doc.version + 1;
        let bytes = Self::encode(&IndividualsFile {
            format: FORMAT_VERSION,
            version: next,
            case_id: doc.case_id,
            operation: operation.map(|op| op.to_string()),
            individuals: doc.individuals.values().cloned().collect(),
        })?;
        self.backend.write_version(&key, next, &bytes)?;

        doc.version = next;
        doc.dirty = false;
        tracing::debug!("Wrote {} version {}", key, next);
        Ok(next)
    }

    /// Commit a new class, writing a new classes version
    pub fn append_class(&self, entity: Entity, provenance: ProvenanceRecord) -> Result<u64, StoreError> {
        let mut doc = self.load_classes()?;
        doc.append_class(entity, provenance)?;
        self.save_classes(&mut doc, None)
    }

    /// Commit a new individual into the case's document
    pub fn append_individual(
        &self,
        case_id: CaseId,
        entity: Entity,
        provenance: ProvenanceRecord,
    ) -> Result<u64, StoreError> {
        let mut doc = self.load_individuals(case_id)?;
        doc.append_individual(entity, provenance)?;
        self.save_individuals(&mut doc, None)
    }

    /// Add a discovering case to an existing class
    pub fn merge_provenance(&self, id: &EntityId, case_id: CaseId) -> Result<bool, StoreError> {
        let mut doc = self.load_classes()?;
        let added = doc.merge_provenance(id, case_id)?;
        self.save_classes(&mut doc, None)?;
        Ok(added)
    }

    /// Remove a case from a class, deleting the class if it was the last one
    pub fn retract_case(&self, id: &EntityId, case_id: CaseId) -> Result<RetractOutcome, StoreError> {
        let mut doc = self.load_classes()?;
        let outcome = doc.retract_case(id, case_id)?;
        self.save_classes(&mut doc, None)?;
        Ok(outcome)
    }

    /// All committed classes, ordered by identifier
    pub fn classes(&self) -> Result<Vec<CommittedClass>, StoreError> {
        Ok(self.load_classes()?.iter().cloned().collect())
    }

    /// Committed individuals of a case, ordered by identifier
    pub fn individuals(&self, case_id: CaseId) -> Result<Vec<CommittedIndividual>, StoreError> {
        Ok(self.load_individuals(case_id)?.iter().cloned().collect())
    }

    /// Cases that have an individuals document
    pub fn individual_cases(&self) -> Result<Vec<CaseId>, StoreError> {
        Ok(self
            .backend
            .keys()?
            .into_iter()
            .filter_map(|key| match key {
                DocumentKey::Individuals(case_id) => Some(case_id),
                DocumentKey::Classes => None,
            })
            .collect())
    }

    /// Capture the head versions of the given documents
    pub fn snapshot(&self, keys: &[DocumentKey]) -> Result<DocumentSnapshot, StoreError> {
        let mut heads = BTreeMap::new();
        for key in keys {
            let head = self.backend.versions(key)?.last().copied();
            heads.insert(*key, head);
        }
        Ok(DocumentSnapshot {
            heads,
            written: BTreeMap::new(),
        })
    }

    /// Remove the versions recorded in the snapshot
    ///
    /// Refuses, removing nothing, if any document's head has moved past the
    /// versions recorded for it: those versions now sit under another
    /// writer's work. Returns the number of versions removed.
    pub fn restore(&self, snapshot: &DocumentSnapshot) -> Result<usize, StoreError> {
        for (key, versions) in &snapshot.written {
            let Some(newest) = versions.last().copied() else {
                continue;
            };
            let actual = self.head_version(key)?;
            if actual > newest {
                return Err(StoreError::VersionConflict {
                    document: key.to_string(),
                    expected: newest,
                    actual,
                });
            }
        }

        let mut removed = 0;
        for (key, versions) in &snapshot.written {
            for version in versions.iter().rev() {
                if self.backend.remove_version(key, *version)? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Try to take the exclusive writer lock without waiting
    ///
    /// Returns `None` while another handle, in this process or another one,
    /// holds it.
    pub fn try_lock_writers(&self) -> Result<Option<WriterLock>, StoreError> {
        self.backend.try_lock_writers()
    }

    /// Number of versions a document has
    pub fn version_count(&self, key: &DocumentKey) -> Result<usize, StoreError> {
        Ok(self.backend.versions(key)?.len())
    }

    /// Version numbers of a document, ascending
    pub fn history(&self, key: &DocumentKey) -> Result<Vec<u64>, StoreError> {
        self.backend.versions(key)
    }

    /// Raw bytes of one version
    pub fn read_raw(&self, key: &DocumentKey, version: u64) -> Result<Option<Vec<u8>>, StoreError> {
        self.backend.read_version(key, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegraph_domain::{ExtractionPass, SectionType};

    fn class(uri: &str, label: &str, case: u64) -> (Entity, ProvenanceRecord) {
        let id = EntityId::new(uri);
        let entity = Entity::new(
            id.clone(),
            EntityKind::Class,
            label,
            format!("Definition of {}", label),
            CaseId::new(case),
            ExtractionPass::First,
            SectionType::Facts,
            100,
        );
        let provenance = ProvenanceRecord::new(id, CaseId::new(case), ExtractionPass::First, SectionType::Facts, 100);
        (entity, provenance)
    }

    #[test]
    fn test_append_class_stamps_committed() {
        let mut doc = ClassesDocument::empty();
        let (entity, prov) = class("http://example.org/a", "A", 7);
        doc.append_class(entity, prov).unwrap();

        let stored = doc.get(&EntityId::new("http://example.org/a")).unwrap();
        assert_eq!(stored.entity.commit_state, CommitState::Committed);
        assert!(stored.entity.committed_at.is_some());
        assert!(doc.is_dirty());
    }

    #[test]
    fn test_append_class_collision() {
        let mut doc = ClassesDocument::empty();
        let (entity, prov) = class("http://example.org/a", "A", 7);
        doc.append_class(entity.clone(), prov.clone()).unwrap();

        let result = doc.append_class(entity, prov);
        assert!(matches!(result, Err(StoreError::IdentifierCollision(_))));
    }

    #[test]
    fn test_append_class_rejects_individual() {
        let mut doc = ClassesDocument::empty();
        let (mut entity, prov) = class("http://example.org/a", "A", 7);
        entity.kind = EntityKind::Individual;
        assert!(matches!(doc.append_class(entity, prov), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_retract_outcomes() {
        let mut doc = ClassesDocument::empty();
        let (entity, prov) = class("http://example.org/a", "A", 7);
        let id = entity.id.clone();
        doc.append_class(entity, prov).unwrap();
        doc.merge_provenance(&id, CaseId::new(8)).unwrap();

        assert_eq!(doc.retract_case(&id, CaseId::new(9)).unwrap(), RetractOutcome::NotContributed);
        assert_eq!(
            doc.retract_case(&id, CaseId::new(7)).unwrap(),
            RetractOutcome::Retracted { remaining: 1 }
        );
        assert_eq!(doc.retract_case(&id, CaseId::new(8)).unwrap(), RetractOutcome::Deleted);
        assert!(doc.get(&id).is_none());
    }

    #[test]
    fn test_individual_must_belong_to_case() {
        let mut doc = IndividualsDocument::empty(CaseId::new(7));
        let (mut entity, prov) = class("http://example.org/engineer-a", "Engineer A", 8);
        entity.kind = EntityKind::Individual;
        assert!(matches!(doc.append_individual(entity, prov), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_save_is_optimistic() {
        let (store, _backend) = PermanentStore::in_memory();

        let mut first = store.load_classes().unwrap();
        let mut second = store.load_classes().unwrap();

        let (a, pa) = class("http://example.org/a", "A", 7);
        first.append_class(a, pa).unwrap();
        assert_eq!(store.save_classes(&mut first, None).unwrap(), 1);

        let (b, pb) = class("http://example.org/b", "B", 8);
        second.append_class(b, pb).unwrap();
        let result = store.save_classes(&mut second, None);
        assert!(matches!(
            result,
            Err(StoreError::VersionConflict { expected: 0, actual: 1, .. })
        ));
    }

    #[test]
    fn test_clean_copy_not_written() {
        let (store, _backend) = PermanentStore::in_memory();
        let mut doc = store.load_classes().unwrap();
        assert_eq!(store.save_classes(&mut doc, None).unwrap(), 0);
        assert_eq!(store.version_count(&DocumentKey::Classes).unwrap(), 0);
    }
}
