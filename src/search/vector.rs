//! Exact cosine-similarity search over the embedding store
//!
//! A parallel scan; no index. Exact search is fine at the target scale
//! (tens of thousands of entities).

use crate::embedding::EmbeddingStore;
use crate::graph::{EntityId, NodeKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Cosine similarity between two vectors
///
/// Vectors need not be unit length. A zero vector has similarity 0 with
/// everything.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// A vector search request
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    /// Restrict hits to one entity kind
    pub kind: Option<NodeKind>,
    /// Minimum score to include
    pub threshold: f32,
    /// Maximum number of hits
    pub limit: usize,
}

impl VectorQuery {
    /// Query with the default threshold (0.0) and limit (10)
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            kind: None,
            threshold: 0.0,
            limit: 10,
        }
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// One vector search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: EntityId,
    pub score: f32,
    /// The description text the stored vector was generated from
    pub text: String,
}

/// Top-k embeddings by cosine similarity to the query vector
pub fn vector_search(store: &EmbeddingStore, query: &VectorQuery) -> Vec<SearchResult> {
    let mut hits: Vec<SearchResult> = store
        .iter()
        .into_par_iter()
        .filter(|record| query.kind.map_or(true, |k| record.id.kind() == k))
        .map(|record| SearchResult {
            score: cosine(&query.vector, &record.vector),
            id: record.id,
            text: record.text,
        })
        .filter(|hit| hit.score >= query.threshold)
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(query.limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> EntityId {
        EntityId::function("M", name, 0)
    }

    #[test]
    fn cosine_identical_vectors_is_one() {
        let v = vec![0.3, -0.4, 0.5];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors_is_minus_one() {
        let a = vec![1.0, 2.0];
        let b = vec![-1.0, -2.0];
        assert!((cosine(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_not_sensitive_to_magnitude() {
        let a = vec![1.0, 1.0];
        let b = vec![10.0, 10.0];
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_returns_top_k_by_score() {
        let store = EmbeddingStore::new();
        store.put(id("exact"), vec![1.0, 0.0], "exact").unwrap();
        store.put(id("close"), vec![0.9, 0.1], "close").unwrap();
        store.put(id("far"), vec![0.0, 1.0], "far").unwrap();

        let hits = vector_search(&store, &VectorQuery::new(vec![1.0, 0.0]).with_limit(2));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, id("exact"));
        assert_eq!(hits[1].id, id("close"));
    }

    #[test]
    fn threshold_filters_low_scores() {
        let store = EmbeddingStore::new();
        store.put(id("hit"), vec![1.0, 0.0], "hit").unwrap();
        store.put(id("miss"), vec![-1.0, 0.0], "miss").unwrap();

        let hits = vector_search(
            &store,
            &VectorQuery::new(vec![1.0, 0.0]).with_threshold(0.5),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id("hit"));
    }

    #[test]
    fn kind_filter_applies() {
        let store = EmbeddingStore::new();
        store.put(id("f"), vec![1.0, 0.0], "f").unwrap();
        store
            .put(EntityId::module("M"), vec![1.0, 0.0], "m")
            .unwrap();

        let hits = vector_search(
            &store,
            &VectorQuery::new(vec![1.0, 0.0]).with_kind(NodeKind::Module),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, EntityId::module("M"));
    }

    #[test]
    fn empty_store_yields_no_hits() {
        let store = EmbeddingStore::new();
        assert!(vector_search(&store, &VectorQuery::new(vec![1.0])).is_empty());
    }
}
