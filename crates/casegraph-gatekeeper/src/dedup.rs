//! Duplicate candidate search over committed classes
//!
//! Nothing is cached between calls: each search reads the current classes
//! document, embeds every class, and builds a fresh HNSW index. Independently
//! committed duplicates are only reported, never merged.

use crate::{DedupConfig, GatekeeperError};
use casegraph_domain::{CommittedClass, EntityId};
use casegraph_store::embedding::{cosine_similarity, tokenize, EmbeddingModel, HashedBagOfWords};
use casegraph_store::vector_index::VectorIndex;
use casegraph_store::PermanentStore;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

/// A committed class resembling the queried label and definition
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCandidate {
    /// Identifier of the committed class
    pub identifier: EntityId,
    /// Its label
    pub label: String,
    /// Token Jaccard similarity (0.0-1.0)
    pub lexical: f32,
    /// Embedding cosine similarity, clamped to 0.0-1.0
    pub semantic: f32,
    /// Weighted blend of the two
    pub score: f32,
}

/// Read-only similarity search over the shared classes document
pub struct DeduplicationIndex {
    store: Arc<PermanentStore>,
    model: HashedBagOfWords,
    config: DedupConfig,
}

fn class_text(label: &str, definition: &str) -> String {
    format!("{} {}", label, definition)
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f32 / union as f32
}

impl DeduplicationIndex {
    /// Create an index over the given store
    pub fn new(store: Arc<PermanentStore>, config: DedupConfig) -> Result<Self, GatekeeperError> {
        config.validate().map_err(GatekeeperError::Config)?;
        Ok(Self {
            store,
            model: HashedBagOfWords::new(config.dimension),
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Find committed classes similar to the given label and definition
    ///
    /// Results are sorted by score, highest first, and cut at the configured
    /// threshold and result limit.
    pub fn find_candidates(&self, label: &str, definition: &str) -> Result<Vec<DuplicateCandidate>, GatekeeperError> {
        let classes = self.store.classes()?;
        if classes.is_empty() {
            return Ok(Vec::new());
        }

        // A query with no tokens at all matches nothing
        let Ok(query_embedding) = self.model.embed(&class_text(label, definition)) else {
            return Ok(Vec::new());
        };
        let query_label_tokens: HashSet<String> = tokenize(label).into_iter().collect();
        let query_tokens: HashSet<String> = tokenize(&class_text(label, definition)).into_iter().collect();
        let compare_definitions = !definition.trim().is_empty();

        let by_id: BTreeMap<&EntityId, &CommittedClass> = classes.iter().map(|c| (&c.entity.id, c)).collect();
        let mut embeddings: BTreeMap<&EntityId, Vec<f32>> = BTreeMap::new();
        let mut index = VectorIndex::with_capacity(self.model.dimension(), classes.len());

        for class in &classes {
            let text = class_text(&class.entity.label, &class.entity.definition);
            match self.model.embed(&text) {
                Ok(embedding) => {
                    index.add(class.entity.id.clone(), &embedding)?;
                    embeddings.insert(&class.entity.id, embedding);
                }
                Err(e) => tracing::debug!("Skipping {} in duplicate search: {}", class.entity.id, e),
            }
        }

        // Semantic neighbours plus anything sharing vocabulary
        let k = (self.config.max_results * 4).max(1).min(index.len());
        let mut pool: BTreeSet<EntityId> = index
            .search(&query_embedding, k, self.config.ef_search)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let mut lexical_scores: BTreeMap<&EntityId, f32> = BTreeMap::new();
        for class in &classes {
            let lexical = if compare_definitions {
                let tokens: HashSet<String> =
                    tokenize(&class_text(&class.entity.label, &class.entity.definition))
                        .into_iter()
                        .collect();
                jaccard(&query_tokens, &tokens)
            } else {
                let tokens: HashSet<String> = tokenize(&class.entity.label).into_iter().collect();
                jaccard(&query_label_tokens, &tokens)
            };
            if lexical > 0.0 {
                pool.insert(class.entity.id.clone());
            }
            lexical_scores.insert(&class.entity.id, lexical);
        }

        let total_weight = self.config.lexical_weight + self.config.semantic_weight;
        let mut candidates: Vec<DuplicateCandidate> = pool
            .iter()
            .filter_map(|id| {
                let class = by_id.get(id)?;
                let lexical = lexical_scores.get(id).copied().unwrap_or(0.0);
                let semantic = embeddings
                    .get(id)
                    .map(|embedding| cosine_similarity(&query_embedding, embedding).clamp(0.0, 1.0))
                    .unwrap_or(0.0);
                let score =
                    (self.config.lexical_weight * lexical + self.config.semantic_weight * semantic) / total_weight;

                (score >= self.config.threshold).then(|| DuplicateCandidate {
                    identifier: (*id).clone(),
                    label: class.entity.label.clone(),
                    lexical,
                    semantic,
                    score,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        candidates.truncate(self.config.max_results);

        tracing::debug!(
            "Duplicate search for '{}' over {} classes found {} candidates",
            label,
            classes.len(),
            candidates.len()
        );
        Ok(candidates)
    }
}
