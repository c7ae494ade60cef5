//! HNSW index over entity embeddings
//!
//! Built on demand from the current permanent store contents and discarded
//! afterwards; it is never persisted.
//!
//! # HNSW Parameters
//!
//! - **M**: bi-directional links per node (16)
//! - **efConstruction**: candidate list size while building (200)
//! - **efSearch**: candidate list size while querying, chosen by the caller

use casegraph_domain::EntityId;
use hnsw_rs::prelude::*;
use thiserror::Error;

const DEFAULT_M: usize = 16;
const DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Errors that can occur during vector index operations
#[derive(Error, Debug)]
pub enum VectorIndexError {
    /// Invalid embedding dimension
    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension provided
        actual: usize,
    },
}

/// Nearest-neighbour index keyed by entity identifier
pub struct VectorIndex {
    dimension: usize,
    hnsw: Hnsw<'static, f32, DistCosine>,
    /// Internal HNSW id is the position in this vector
    ids: Vec<EntityId>,
}

impl VectorIndex {
    /// Create an index sized for roughly `capacity` vectors
    pub fn with_capacity(dimension: usize, capacity: usize) -> Self {
        let max_elements = capacity.max(16);
        let nb_layer = 16.min(((max_elements as f32).ln().trunc() as usize).max(1));

        let hnsw = Hnsw::<'static, f32, DistCosine>::new(
            DEFAULT_M,
            max_elements,
            nb_layer,
            DEFAULT_EF_CONSTRUCTION,
            DistCosine {},
        );

        Self {
            dimension,
            hnsw,
            ids: Vec::with_capacity(capacity),
        }
    }

    /// Add an entity embedding
    pub fn add(&mut self, id: EntityId, embedding: &[f32]) -> Result<(), VectorIndexError> {
        self.check_dimension(embedding)?;

        let internal_id = self.ids.len();
        self.ids.push(id);

        let embedding_vec = embedding.to_vec();
        self.hnsw.insert((&embedding_vec, internal_id));
        Ok(())
    }

    /// Search for the `k` nearest entities
    ///
    /// Returns `(identifier, similarity)` pairs sorted by similarity, descending.
    pub fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(EntityId, f32)>, VectorIndexError> {
        self.check_dimension(query)?;
        if self.ids.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut results: Vec<(EntityId, f32)> = self
            .hnsw
            .search(query, k, ef_search.max(k))
            .into_iter()
            .filter_map(|neighbour| {
                self.ids
                    .get(neighbour.d_id)
                    .map(|id| (id.clone(), 1.0 - neighbour.distance))
            })
            .collect();

        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(results)
    }

    /// Number of vectors in the index
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), VectorIndexError> {
        if embedding.len() != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}
