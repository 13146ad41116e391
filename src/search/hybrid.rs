//! Hybrid retrieval: fusing graph and vector signals
//!
//! Reciprocal Rank Fusion with the conventional k = 60. Three strategies:
//! run both sides and fuse, semantic-first with a structural filter, or
//! graph-first with cosine re-scoring.

use super::vector::{cosine, vector_search, VectorQuery};
use crate::embedding::EmbeddingStore;
use crate::graph::{degree_centrality, EntityId, GraphStore, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// RRF rank constant
pub const RRF_K: f64 = 60.0;

/// Retrieval strategy for [`hybrid_search`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HybridStrategy {
    /// Run graph query and vector search, fuse via RRF
    Fusion,
    /// Vector search first, then keep only hits satisfying the graph
    /// constraint
    SemanticFirst,
    /// Graph filter first, then re-score the survivors by cosine
    GraphFirst,
}

/// A hybrid retrieval request
#[derive(Debug, Clone)]
pub struct HybridQuery {
    pub strategy: HybridStrategy,
    /// Embedded query text
    pub vector: Vec<f32>,
    /// Structural constraint: entities owned by this module
    pub module: Option<String>,
    /// Restrict to one entity kind
    pub kind: Option<NodeKind>,
    pub threshold: f32,
    pub limit: usize,
}

impl HybridQuery {
    pub fn new(strategy: HybridStrategy, vector: Vec<f32>) -> Self {
        Self {
            strategy,
            vector,
            module: None,
            kind: None,
            threshold: 0.0,
            limit: 10,
        }
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

/// One fused retrieval hit
///
/// For `Fusion` the score is the summed RRF contribution; for the other
/// strategies it is the cosine score of the surviving hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedResult {
    pub id: EntityId,
    pub score: f64,
}

/// Fuse ranked lists by Reciprocal Rank Fusion
///
/// An item at 1-based rank `r` in a list contributes `1/(k + r)`; items
/// present in several lists sum their contributions. Output is sorted by
/// descending fused score.
pub fn reciprocal_rank_fusion(lists: &[Vec<EntityId>]) -> Vec<FusedResult> {
    let mut scores: HashMap<EntityId, f64> = HashMap::new();
    for list in lists {
        for (i, id) in list.iter().enumerate() {
            let rank = (i + 1) as f64;
            *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (RRF_K + rank);
        }
    }
    let mut fused: Vec<FusedResult> = scores
        .into_iter()
        .map(|(id, score)| FusedResult { id, score })
        .collect();
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

/// Graph-side candidates for fusion: entities matching the structural
/// constraint, ranked by total call degree (hub-ness).
fn graph_candidates(graph: &GraphStore, query: &HybridQuery) -> Vec<EntityId> {
    let nodes = match &query.module {
        Some(module) => graph.nodes_in_module(module),
        None => graph.list_nodes(query.kind),
    };
    let degrees = degree_centrality(graph);
    let mut candidates: Vec<(EntityId, usize)> = nodes
        .into_iter()
        .filter(|n| query.kind.map_or(true, |k| n.kind() == k))
        .map(|n| {
            let degree = degrees.get(&n.id).map(|d| d.total).unwrap_or(0);
            (n.id, degree)
        })
        .collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
    candidates.into_iter().map(|(id, _)| id).collect()
}

/// Whether an entity satisfies the structural constraint of the query
fn satisfies_constraint(id: &EntityId, query: &HybridQuery) -> bool {
    query
        .module
        .as_deref()
        .map_or(true, |m| id.module_name() == Some(m))
}

/// Execute a hybrid retrieval
pub fn hybrid_search(
    graph: &GraphStore,
    embeddings: &EmbeddingStore,
    query: &HybridQuery,
) -> Vec<FusedResult> {
    match query.strategy {
        HybridStrategy::Fusion => {
            let vector_side: Vec<EntityId> = vector_search(
                embeddings,
                &VectorQuery {
                    vector: query.vector.clone(),
                    kind: query.kind,
                    threshold: query.threshold,
                    limit: query.limit,
                },
            )
            .into_iter()
            .map(|hit| hit.id)
            .collect();
            let graph_side: Vec<EntityId> = graph_candidates(graph, query)
                .into_iter()
                .take(query.limit)
                .collect();

            let mut fused = reciprocal_rank_fusion(&[graph_side, vector_side]);
            fused.truncate(query.limit);
            fused
        }

        HybridStrategy::SemanticFirst => {
            // Over-fetch so the structural filter still leaves enough hits.
            let hits = vector_search(
                embeddings,
                &VectorQuery {
                    vector: query.vector.clone(),
                    kind: query.kind,
                    threshold: query.threshold,
                    limit: query.limit.saturating_mul(4),
                },
            );
            hits.into_iter()
                .filter(|hit| satisfies_constraint(&hit.id, query))
                .take(query.limit)
                .map(|hit| FusedResult {
                    id: hit.id,
                    score: hit.score as f64,
                })
                .collect()
        }

        HybridStrategy::GraphFirst => {
            // Entities without a stored vector are rank-absent on the
            // semantic side and drop out here.
            let mut rescored: Vec<FusedResult> = graph_candidates(graph, query)
                .into_iter()
                .filter_map(|id| {
                    let record = embeddings.get(&id)?;
                    let score = cosine(&query.vector, &record.vector);
                    (score >= query.threshold).then_some(FusedResult {
                        id,
                        score: score as f64,
                    })
                })
                .collect();
            rescored.sort_by(|a, b| {
                b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
            });
            rescored.truncate(query.limit);
            rescored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, EdgeKind, Node};

    fn id(name: &str) -> EntityId {
        EntityId::function("M", name, 0)
    }

    #[test]
    fn rrf_single_list_scores() {
        let fused = reciprocal_rank_fusion(&[vec![id("x"), id("y")]]);
        assert_eq!(fused.len(), 2);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-12);
        assert!((fused[1].score - 1.0 / 62.0).abs() < 1e-12);
    }

    #[test]
    fn rrf_sums_contributions_across_lists() {
        // Graph side [X, Y, Z], vector side [Y, W, X]
        let graph_side = vec![id("x"), id("y"), id("z")];
        let vector_side = vec![id("y"), id("w"), id("x")];
        let fused = reciprocal_rank_fusion(&[graph_side, vector_side]);

        let score_of = |name: &str| {
            fused
                .iter()
                .find(|r| r.id == id(name))
                .map(|r| r.score)
                .unwrap()
        };
        assert!((score_of("x") - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-12);
        assert!((score_of("y") - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((score_of("z") - 1.0 / 63.0).abs() < 1e-12);
        assert!((score_of("w") - 1.0 / 62.0).abs() < 1e-12);

        // Expected fused ordering: Y, X, W, Z
        let order: Vec<EntityId> = fused.iter().map(|r| r.id.clone()).collect();
        assert_eq!(order, vec![id("y"), id("x"), id("w"), id("z")]);
    }

    fn fixture() -> (GraphStore, EmbeddingStore) {
        let graph = GraphStore::new();
        let embeddings = EmbeddingStore::new();

        // M.a and M.b in module M; N.c elsewhere. a is the call hub.
        for (module, name) in [("M", "a"), ("M", "b"), ("N", "c")] {
            graph.add_node(
                Node::new(EntityId::function(module, name, 0)).with_attr("file", "/x.ex"),
            );
        }
        graph.add_edge(Edge::new(
            EntityId::function("M", "b", 0),
            EntityId::function("M", "a", 0),
            EdgeKind::Calls,
        ));
        graph.add_edge(Edge::new(
            EntityId::function("N", "c", 0),
            EntityId::function("M", "a", 0),
            EdgeKind::Calls,
        ));

        embeddings
            .put(EntityId::function("M", "a", 0), vec![0.0, 1.0], "a")
            .unwrap();
        embeddings
            .put(EntityId::function("M", "b", 0), vec![1.0, 0.0], "b")
            .unwrap();
        embeddings
            .put(EntityId::function("N", "c", 0), vec![0.9, 0.1], "c")
            .unwrap();

        (graph, embeddings)
    }

    #[test]
    fn semantic_first_applies_module_filter() {
        let (graph, embeddings) = fixture();
        // Query vector closest to b, then c; module filter keeps only M.
        let query = HybridQuery::new(HybridStrategy::SemanticFirst, vec![1.0, 0.0]).in_module("M");
        let hits = hybrid_search(&graph, &embeddings, &query);

        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.id.module_name() == Some("M")));
        assert_eq!(hits[0].id, EntityId::function("M", "b", 0));
    }

    #[test]
    fn graph_first_rescores_by_cosine() {
        let (graph, embeddings) = fixture();
        let query = HybridQuery::new(HybridStrategy::GraphFirst, vec![0.0, 1.0]).in_module("M");
        let hits = hybrid_search(&graph, &embeddings, &query);

        assert_eq!(hits[0].id, EntityId::function("M", "a", 0));
        assert!(hits[0].score > 0.99);
    }

    #[test]
    fn graph_first_drops_unembedded_entities() {
        let (graph, embeddings) = fixture();
        graph.add_node(Node::new(EntityId::function("M", "lazy", 0)).with_attr("file", "/x.ex"));

        let query = HybridQuery::new(HybridStrategy::GraphFirst, vec![0.0, 1.0]).in_module("M");
        let hits = hybrid_search(&graph, &embeddings, &query);
        assert!(hits.iter().all(|h| h.id != EntityId::function("M", "lazy", 0)));
    }

    #[test]
    fn fusion_ranks_hub_and_similar_above_rest() {
        let (graph, embeddings) = fixture();
        let query = HybridQuery::new(HybridStrategy::Fusion, vec![0.0, 1.0]);
        let hits = hybrid_search(&graph, &embeddings, &query);

        // M.a leads both lists (top degree, exact cosine match)
        assert_eq!(hits[0].id, EntityId::function("M", "a", 0));
    }

    #[test]
    fn fusion_respects_limit() {
        let (graph, embeddings) = fixture();
        let query = HybridQuery::new(HybridStrategy::Fusion, vec![0.0, 1.0]).with_limit(2);
        assert!(hybrid_search(&graph, &embeddings, &query).len() <= 2);
    }
}
