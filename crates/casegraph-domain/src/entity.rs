//! Entity module - ontology classes and individuals

use crate::case::{CaseId, ExtractionPass, SectionType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// URI identifying an entity (e.g. `http://proethica.org/ontology/case/7#Engineer`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an identifier without validating it
    ///
    /// Use [`EntityId::parse`] at trust boundaries.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Parse an absolute URI identifier (`scheme:rest`)
    ///
    /// # Examples
    ///
    /// ```
    /// use casegraph_domain::EntityId;
    ///
    /// assert!(EntityId::parse("http://example.org/onto#Engineer").is_ok());
    /// assert!(EntityId::parse("Engineer").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        let (scheme, rest) = value
            .split_once(':')
            .ok_or_else(|| format!("Identifier '{}' is not an absolute URI", value))?;

        let scheme_valid = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

        if !scheme_valid {
            return Err(format!("Identifier '{}' has an invalid URI scheme", value));
        }
        if rest.is_empty() || rest.chars().any(char::is_whitespace) {
            return Err(format!("Identifier '{}' has an invalid URI body", value));
        }

        Ok(Self(value.to_string()))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local name: the fragment or last path segment of the URI
    pub fn local_name(&self) -> &str {
        self.0
            .rsplit(['#', '/'])
            .find(|part| !part.is_empty())
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of ontology entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// An ontology class; committed classes are shared by every case
    Class,
    /// An individual; committed individuals stay within their case
    Individual,
}

impl EntityKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Class => "class",
            EntityKind::Individual => "individual",
        }
    }

    /// Parse a kind from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "class" => Some(EntityKind::Class),
            "individual" => Some(EntityKind::Individual),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an entity has been promoted to permanent storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    /// Still in the staging workspace
    Uncommitted,
    /// Promoted to the permanent store
    Committed,
}

impl CommitState {
    /// Get the state name as stored in the staging table
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Uncommitted => "uncommitted",
            CommitState::Committed => "committed",
        }
    }

    /// Parse a state from its stored name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uncommitted" => Some(CommitState::Uncommitted),
            "committed" => Some(CommitState::Committed),
            _ => None,
        }
    }
}

/// An ontology entity produced by the extraction pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// URI identifier
    pub id: EntityId,

    /// Class or individual
    pub kind: EntityKind,

    /// Human-readable label
    pub label: String,

    /// Definition or description text
    pub definition: String,

    /// Free-form attributes (e.g. `role_category`, `obligation_type`)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Staging or committed
    pub commit_state: CommitState,

    /// Case that owns (or originated) the entity
    pub case_id: CaseId,

    /// Extraction pass that produced it
    pub extraction_pass: ExtractionPass,

    /// Section it was extracted from
    pub section_type: SectionType,

    /// When the entity was created (timestamp)
    pub created_at: u64,

    /// When the entity was committed, if it has been
    pub committed_at: Option<u64>,
}

impl Entity {
    /// Create a new uncommitted entity
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: EntityId,
        kind: EntityKind,
        label: impl Into<String>,
        definition: impl Into<String>,
        case_id: CaseId,
        extraction_pass: ExtractionPass,
        section_type: SectionType,
        created_at: u64,
    ) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            definition: definition.into(),
            attributes: BTreeMap::new(),
            commit_state: CommitState::Uncommitted,
            case_id,
            extraction_pass,
            section_type,
            created_at,
            committed_at: None,
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether two entities describe the same concept content
    ///
    /// Compares kind, label and definition; provenance and timestamps are ignored.
    pub fn same_content(&self, other: &Entity) -> bool {
        self.kind == other.kind
            && self.label.trim() == other.label.trim()
            && self.definition.trim() == other.definition.trim()
    }

    /// Mark the entity committed at the given time
    pub fn mark_committed(&mut self, committed_at: u64) {
        self.commit_state = CommitState::Committed;
        self.committed_at = Some(committed_at);
    }
}
