//! Staging-boundary validation of candidate records

use crate::ValidationConfig;
use casegraph_domain::{EntityId, EntityKind, StagingRecord};
use std::fmt;

/// Result of candidate validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the candidate passed validation
    pub status: ValidationStatus,

    /// Rejection reasons (if any)
    pub reasons: Vec<RejectionReason>,
}

impl ValidationResult {
    /// Whether the candidate was accepted
    pub fn is_accepted(&self) -> bool {
        self.status == ValidationStatus::Accepted
    }
}

/// Validation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    /// Candidate accepted
    Accepted,

    /// Candidate rejected
    Rejected,
}

/// Reasons for rejection
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// Identifier is not an absolute URI
    InvalidIdentifier(String),

    /// URI scheme not in the allowed list
    DisallowedScheme(String),

    /// Label is empty
    EmptyLabel,

    /// Label exceeds the configured length
    LabelTooLong {
        /// Maximum allowed
        max: usize,
        /// Actual length
        actual: usize,
    },

    /// Class has no definition
    MissingDefinition,

    /// Provenance does not describe the record it is attached to
    ProvenanceMismatch(String),

    /// Extension key is empty or whitespace
    InvalidExtensionKey(String),

    /// Source excerpt exceeds the configured length
    SourceTextTooLong {
        /// Maximum allowed
        max: usize,
        /// Actual length
        actual: usize,
    },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::InvalidIdentifier(msg) => write!(f, "{}", msg),
            RejectionReason::DisallowedScheme(scheme) => write!(f, "URI scheme '{}' is not allowed", scheme),
            RejectionReason::EmptyLabel => write!(f, "label is empty"),
            RejectionReason::LabelTooLong { max, actual } => {
                write!(f, "label is {} characters, limit is {}", actual, max)
            }
            RejectionReason::MissingDefinition => write!(f, "class has no definition"),
            RejectionReason::ProvenanceMismatch(msg) => write!(f, "provenance mismatch: {}", msg),
            RejectionReason::InvalidExtensionKey(key) => write!(f, "invalid provenance extension key '{}'", key),
            RejectionReason::SourceTextTooLong { max, actual } => {
                write!(f, "source text is {} characters, limit is {}", actual, max)
            }
        }
    }
}

/// Validates candidate records before they enter the staging workspace
pub struct CandidateValidator {
    config: ValidationConfig,
}

impl CandidateValidator {
    /// Create a validator with the given configuration
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Create a validator with default configuration
    pub fn default_config() -> Self {
        Self::new(ValidationConfig::default())
    }

    /// Configuration in use
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a record against the configured rules
    ///
    /// Every failing rule is reported, not just the first.
    pub fn validate(&self, record: &StagingRecord) -> ValidationResult {
        let mut reasons = Vec::new();

        reasons.extend(self.validate_identifier(&record.entity.id));
        reasons.extend(self.validate_label(&record.entity.label));

        if self.config.require_class_definition
            && record.entity.kind == EntityKind::Class
            && record.entity.definition.trim().is_empty()
        {
            reasons.push(RejectionReason::MissingDefinition);
        }

        reasons.extend(self.validate_provenance(record));

        let status = if reasons.is_empty() {
            ValidationStatus::Accepted
        } else {
            ValidationStatus::Rejected
        };

        ValidationResult { status, reasons }
    }

    fn validate_identifier(&self, id: &EntityId) -> Option<RejectionReason> {
        let parsed = match EntityId::parse(id.as_str()) {
            Ok(parsed) => parsed,
            Err(msg) => return Some(RejectionReason::InvalidIdentifier(msg)),
        };

        if self.config.allowed_schemes.is_empty() {
            return None;
        }

        let scheme = parsed.as_str().split_once(':').map(|(s, _)| s).unwrap_or_default();
        let allowed = self
            .config
            .allowed_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme));

        if allowed {
            None
        } else {
            Some(RejectionReason::DisallowedScheme(scheme.to_string()))
        }
    }

    fn validate_label(&self, label: &str) -> Option<RejectionReason> {
        let label = label.trim();
        if self.config.require_label && label.is_empty() {
            return Some(RejectionReason::EmptyLabel);
        }

        let actual = label.chars().count();
        if actual > self.config.max_label_len {
            return Some(RejectionReason::LabelTooLong {
                max: self.config.max_label_len,
                actual,
            });
        }
        None
    }

    /// Provenance must name the record's own entity, case, pass and section
    fn validate_provenance(&self, record: &StagingRecord) -> Vec<RejectionReason> {
        let entity = &record.entity;
        let provenance = &record.provenance;
        let mut reasons = Vec::new();

        if provenance.entity_id != entity.id {
            reasons.push(RejectionReason::ProvenanceMismatch(format!(
                "provenance is for {}, record is {}",
                provenance.entity_id, entity.id
            )));
        }
        if provenance.first_discovered_case != entity.case_id {
            reasons.push(RejectionReason::ProvenanceMismatch(format!(
                "first discovered in case {}, staged by case {}",
                provenance.first_discovered_case, entity.case_id
            )));
        }
        if !provenance.includes_case(entity.case_id) {
            reasons.push(RejectionReason::ProvenanceMismatch(format!(
                "discovering cases do not include case {}",
                entity.case_id
            )));
        }
        if provenance.discovered_in_pass != entity.extraction_pass
            || provenance.discovered_in_section != entity.section_type
        {
            reasons.push(RejectionReason::ProvenanceMismatch(format!(
                "discovered in {} / {}, staged under {} / {}",
                provenance.discovered_in_pass,
                provenance.discovered_in_section,
                entity.extraction_pass,
                entity.section_type
            )));
        }

        for key in provenance.extensions.keys() {
            if key.trim().is_empty() {
                reasons.push(RejectionReason::InvalidExtensionKey(key.clone()));
            }
        }

        if let Some(text) = &provenance.source_text {
            let actual = text.chars().count();
            if actual > self.config.max_source_text_len {
                reasons.push(RejectionReason::SourceTextTooLong {
                    max: self.config.max_source_text_len,
                    actual,
                });
            }
        }

        reasons
    }
}
