//! Case scoping: case identifiers, extraction passes and document sections

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the case (analysed document) that owns staged data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(u64);

impl CaseId {
    /// Create a case identifier from its numeric value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw numeric value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CaseId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extraction pass that produced a candidate
///
/// Later passes build on the entities surfaced by earlier ones, so the
/// ordering of the variants is significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ExtractionPass {
    /// Pass 1 (contextual framework: roles, states, resources)
    First,
    /// Pass 2 (normative requirements: principles, obligations, constraints)
    Second,
    /// Pass 3 (temporal dynamics: actions, events)
    Third,
}

impl ExtractionPass {
    /// All passes in execution order
    pub const ALL: [ExtractionPass; 3] = [
        ExtractionPass::First,
        ExtractionPass::Second,
        ExtractionPass::Third,
    ];

    /// Get the pass number (1, 2 or 3)
    pub fn number(&self) -> u8 {
        match self {
            ExtractionPass::First => 1,
            ExtractionPass::Second => 2,
            ExtractionPass::Third => 3,
        }
    }

    /// Parse a pass from its number
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(ExtractionPass::First),
            2 => Some(ExtractionPass::Second),
            3 => Some(ExtractionPass::Third),
            _ => None,
        }
    }
}

impl TryFrom<u8> for ExtractionPass {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::from_number(n).ok_or_else(|| format!("Invalid extraction pass: {} (expected 1, 2 or 3)", n))
    }
}

impl From<ExtractionPass> for u8 {
    fn from(pass: ExtractionPass) -> Self {
        pass.number()
    }
}

impl fmt::Display for ExtractionPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass {}", self.number())
    }
}

/// Section of a case document that an entity was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    /// Facts of the case
    Facts,
    /// Discussion by the review board
    Discussion,
    /// Questions posed to the board
    Questions,
    /// Conclusions reached
    Conclusions,
    /// Code provisions and precedent references
    References,
}

impl SectionType {
    /// All sections in document order
    pub const ALL: [SectionType; 5] = [
        SectionType::Facts,
        SectionType::Discussion,
        SectionType::Questions,
        SectionType::Conclusions,
        SectionType::References,
    ];

    /// Get the section name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Facts => "facts",
            SectionType::Discussion => "discussion",
            SectionType::Questions => "questions",
            SectionType::Conclusions => "conclusions",
            SectionType::References => "references",
        }
    }

    /// Parse a section from its name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "facts" => Some(SectionType::Facts),
            "discussion" => Some(SectionType::Discussion),
            "questions" => Some(SectionType::Questions),
            "conclusions" => Some(SectionType::Conclusions),
            "references" => Some(SectionType::References),
            _ => None,
        }
    }
}

impl std::str::FromStr for SectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid section: {}", s))
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
