//! Text embeddings for duplicate detection
//!
//! Embeddings are computed locally with no model files: [`HashedBagOfWords`]
//! hashes each normalized token into a fixed number of buckets and normalizes
//! the resulting vector. Texts that share vocabulary land close together under
//! cosine similarity, which is all duplicate detection needs.
//!
//! ```rust
//! use casegraph_store::embedding::{cosine_similarity, EmbeddingModel, HashedBagOfWords};
//!
//! let model = HashedBagOfWords::new(256);
//! let a = model.embed("Duty to report safety hazards").unwrap();
//! let b = model.embed("safety hazards: duty to report").unwrap();
//! assert!(cosine_similarity(&a, &b) > 0.99);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Default embedding width
pub const DEFAULT_DIMENSION: usize = 256;

/// Errors that can occur during embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Text had no tokens to embed
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Trait for embedding models
pub trait EmbeddingModel {
    /// Generate an embedding vector for the given text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Dimension of embeddings produced by this model
    fn dimension(&self) -> usize;
}

/// Split text into lowercase alphanumeric tokens
///
/// CamelCase boundaries are split too, so `SafetyObligation` and
/// "safety obligation" tokenize the same.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = ch.is_lowercase() || ch.is_numeric();
            current.extend(ch.to_lowercase());
        } else {
            prev_lower = false;
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Hashed bag-of-words embedding model
///
/// Deterministic across runs and processes: the hasher is unkeyed.
pub struct HashedBagOfWords {
    dimension: usize,
}

impl HashedBagOfWords {
    /// Create a model producing vectors of `dimension` buckets
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let hash = hasher.finish();

        // Low bits pick the bucket, one high bit picks the sign
        let index = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }
}

impl Default for HashedBagOfWords {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl EmbeddingModel for HashedBagOfWords {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(EmbeddingError::InvalidInput("Text has no tokens to embed".to_string()));
        }

        let mut embedding = vec![0.0f32; self.dimension];
        for token in &tokens {
            let (index, sign) = self.bucket(token);
            embedding[index] += sign;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude == 0.0 {
            // Every token cancelled out; fall back to unsigned counts
            for token in &tokens {
                let (index, _) = self.bucket(token);
                embedding[index] += 1.0;
            }
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        for value in &mut embedding {
            *value /= magnitude;
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cosine similarity between two vectors
///
/// Returns 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
