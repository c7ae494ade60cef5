//! Gatekeeper configuration

use serde::{Deserialize, Serialize};

/// Configuration for staging-boundary validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject candidates with an empty label
    pub require_label: bool,

    /// Reject classes without a definition
    pub require_class_definition: bool,

    /// Maximum label length in characters
    pub max_label_len: usize,

    /// Maximum source excerpt length in characters
    pub max_source_text_len: usize,

    /// Accepted URI schemes (empty accepts any)
    pub allowed_schemes: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            require_label: true,
            require_class_definition: false,
            max_label_len: 256,
            max_source_text_len: 4096,
            allowed_schemes: Vec::new(),
        }
    }
}

impl ValidationConfig {
    /// Minimal validation: identifier shape and provenance consistency only
    pub fn permissive() -> Self {
        Self {
            require_label: false,
            require_class_definition: false,
            max_label_len: usize::MAX,
            max_source_text_len: usize::MAX,
            allowed_schemes: Vec::new(),
        }
    }

    /// Strict validation: http(s) identifiers, defined classes, short excerpts
    pub fn strict() -> Self {
        Self {
            require_label: true,
            require_class_definition: true,
            max_label_len: 128,
            max_source_text_len: 2048,
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
        }
    }
}

/// Configuration for duplicate candidate search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Minimum blended score for a class to be reported (0.0-1.0)
    pub threshold: f32,

    /// Weight of the lexical (token Jaccard) score
    pub lexical_weight: f32,

    /// Weight of the embedding (cosine) score
    pub semantic_weight: f32,

    /// Embedding dimension
    pub dimension: usize,

    /// Maximum number of candidates returned
    pub max_results: usize,

    /// HNSW search breadth
    pub ef_search: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            lexical_weight: 0.5,
            semantic_weight: 0.5,
            dimension: 256,
            max_results: 10,
            ef_search: 64,
        }
    }
}

impl DedupConfig {
    /// Report more, weaker candidates
    pub fn aggressive() -> Self {
        Self {
            threshold: 0.4,
            max_results: 25,
            ..Self::default()
        }
    }

    /// Report only near-identical classes
    pub fn conservative() -> Self {
        Self {
            threshold: 0.85,
            max_results: 5,
            ..Self::default()
        }
    }

    /// Check weights and threshold
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!("threshold {} is outside [0.0, 1.0]", self.threshold));
        }
        if self.lexical_weight < 0.0 || self.semantic_weight < 0.0 {
            return Err("weights must be non-negative".to_string());
        }
        if self.lexical_weight + self.semantic_weight <= 0.0 {
            return Err("at least one weight must be positive".to_string());
        }
        if self.dimension == 0 {
            return Err("dimension must be positive".to_string());
        }
        Ok(())
    }
}
