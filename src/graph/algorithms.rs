//! Graph algorithms over the calls subgraph
//!
//! PageRank (iterative power method with dangling-mass redistribution),
//! bounded simple-path search, degree centrality, and the aggregate graph
//! report.

use super::edge::EdgeKind;
use super::entity::{EntityId, NodeKind};
use super::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// PageRank tuning knobs
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRankParams {
    /// Damping factor in `[0, 1]`
    pub damping: f64,
    pub max_iterations: usize,
    /// Convergence threshold on max per-node delta
    pub tolerance: f64,
}

impl Default for PageRankParams {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-4,
        }
    }
}

/// Bounds for [`find_paths`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathSearchParams {
    /// Maximum number of edges in a returned path
    pub max_depth: usize,
    /// Stop after collecting this many complete paths
    pub max_paths: usize,
}

impl Default for PathSearchParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_paths: 100,
        }
    }
}

/// Per-node degree over the calls subgraph
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Degree {
    pub in_degree: usize,
    pub out_degree: usize,
    pub total: usize,
}

/// One ranked entry in the aggregate report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntity {
    pub id: String,
    pub score: f64,
}

/// Aggregate graph statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphReport {
    pub node_count: usize,
    pub node_counts_by_kind: HashMap<String, usize>,
    pub edge_count: usize,
    pub average_degree: f64,
    /// `edges / (N·(N−1))` for N ≥ 2, else 0
    pub density: f64,
    pub top_pagerank: Vec<RankedEntity>,
    pub top_degree: Vec<RankedEntity>,
}

/// The calls subgraph in index form: function nodes and their adjacency.
struct CallsSubgraph {
    ids: Vec<EntityId>,
    index: HashMap<EntityId, usize>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl CallsSubgraph {
    fn build(store: &GraphStore) -> Self {
        let ids: Vec<EntityId> = store
            .list_nodes(Some(NodeKind::Function))
            .into_iter()
            .map(|n| n.id)
            .collect();
        let index: HashMap<EntityId, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let n = ids.len();
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
        for edge in store.edges_of_kind(EdgeKind::Calls) {
            if let (Some(&src), Some(&dst)) = (index.get(&edge.from), index.get(&edge.to)) {
                outgoing[src].push(dst);
                incoming[dst].push(src);
            }
        }

        Self {
            ids,
            index,
            outgoing,
            incoming,
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// PageRank over the calls subgraph
///
/// Parallel call edges each contribute: a function calling the same callee
/// from three sites passes it three shares of rank. Returns an empty map
/// for an empty subgraph.
pub fn pagerank(store: &GraphStore, params: PageRankParams) -> HashMap<EntityId, f64> {
    let graph = CallsSubgraph::build(store);
    let n = graph.len();
    if n == 0 {
        return HashMap::new();
    }

    let d = params.damping;
    let base = (1.0 - d) / n as f64;
    let mut scores = vec![1.0 / n as f64; n];
    let mut next = vec![0.0; n];

    for _ in 0..params.max_iterations {
        // Rank held by nodes with no outgoing calls is spread uniformly.
        let dangling: f64 = scores
            .iter()
            .enumerate()
            .filter(|(i, _)| graph.outgoing[*i].is_empty())
            .map(|(_, s)| s)
            .sum();
        let dangling_share = d * dangling / n as f64;

        for i in 0..n {
            let mut sum = 0.0;
            for &j in &graph.incoming[i] {
                let out_degree = graph.outgoing[j].len() as f64;
                sum += scores[j] / out_degree;
            }
            next[i] = base + d * sum + dangling_share;
        }

        let delta = scores
            .iter()
            .zip(next.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max);
        scores.copy_from_slice(&next);
        if delta < params.tolerance {
            break;
        }
    }

    graph
        .ids
        .iter()
        .cloned()
        .zip(scores.iter().copied())
        .collect()
}

/// All simple paths from `from` to `to` along outgoing call edges
///
/// DFS with a visited set along the current path. The search stops as soon
/// as `max_paths` complete paths exist; which paths survive beyond that
/// point depends on traversal order and callers must not rely on it.
/// A query from a node to itself yields the single path `[from]`.
pub fn find_paths(
    store: &GraphStore,
    from: &EntityId,
    to: &EntityId,
    params: PathSearchParams,
) -> Vec<Vec<EntityId>> {
    let graph = CallsSubgraph::build(store);
    let (Some(&src), Some(&dst)) = (graph.index.get(from), graph.index.get(to)) else {
        return Vec::new();
    };

    if src == dst {
        return vec![vec![from.clone()]];
    }

    // Parallel call edges would emit identical node paths; walk each
    // neighbor once.
    let neighbors: Vec<Vec<usize>> = graph
        .outgoing
        .iter()
        .map(|targets| {
            let mut seen = HashSet::new();
            targets
                .iter()
                .copied()
                .filter(|t| seen.insert(*t))
                .collect()
        })
        .collect();

    let source_degree = neighbors[src].len();
    if source_degree >= 20 {
        warn!(
            source = %from,
            out_degree = source_degree,
            "path search from a very high fan-out node; expect combinatorial blowup"
        );
    } else if source_degree >= 10 {
        info!(source = %from, out_degree = source_degree, "path search from a high fan-out node");
    }

    let mut paths: Vec<Vec<usize>> = Vec::new();
    let mut current = vec![src];
    let mut on_path: HashSet<usize> = [src].into_iter().collect();
    dfs(
        &neighbors,
        dst,
        params,
        &mut current,
        &mut on_path,
        &mut paths,
    );

    paths
        .into_iter()
        .map(|p| p.into_iter().map(|i| graph.ids[i].clone()).collect())
        .collect()
}

fn dfs(
    neighbors: &[Vec<usize>],
    dst: usize,
    params: PathSearchParams,
    current: &mut Vec<usize>,
    on_path: &mut HashSet<usize>,
    paths: &mut Vec<Vec<usize>>,
) {
    if paths.len() >= params.max_paths {
        return;
    }
    if current.len() > params.max_depth {
        return;
    }
    let here = *current.last().unwrap();
    for &next in &neighbors[here] {
        if paths.len() >= params.max_paths {
            return;
        }
        if on_path.contains(&next) {
            continue;
        }
        if next == dst {
            let mut path = current.clone();
            path.push(dst);
            paths.push(path);
            continue;
        }
        current.push(next);
        on_path.insert(next);
        dfs(neighbors, dst, params, current, on_path, paths);
        on_path.remove(&next);
        current.pop();
    }
}

/// In/out/total degree per function node over the calls subgraph
pub fn degree_centrality(store: &GraphStore) -> HashMap<EntityId, Degree> {
    let graph = CallsSubgraph::build(store);
    graph
        .ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let in_degree = graph.incoming[i].len();
            let out_degree = graph.outgoing[i].len();
            (
                id.clone(),
                Degree {
                    in_degree,
                    out_degree,
                    total: in_degree + out_degree,
                },
            )
        })
        .collect()
}

/// Aggregate report: counts, density, and top-10 rankings
pub fn graph_report(store: &GraphStore) -> GraphReport {
    let stats = store.stats();
    let n = stats.node_count;

    let average_degree = if n == 0 {
        0.0
    } else {
        2.0 * stats.edge_count as f64 / n as f64
    };
    let density = if n < 2 {
        0.0
    } else {
        stats.edge_count as f64 / (n as f64 * (n as f64 - 1.0))
    };

    let mut ranked: Vec<(EntityId, f64)> = pagerank(store, PageRankParams::default())
        .into_iter()
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let top_pagerank = ranked
        .into_iter()
        .take(10)
        .map(|(id, score)| RankedEntity {
            id: id.to_string(),
            score,
        })
        .collect();

    let mut degrees: Vec<(EntityId, Degree)> = degree_centrality(store).into_iter().collect();
    degrees.sort_by(|a, b| b.1.total.cmp(&a.1.total));
    let top_degree = degrees
        .into_iter()
        .take(10)
        .map(|(id, deg)| RankedEntity {
            id: id.to_string(),
            score: deg.total as f64,
        })
        .collect();

    GraphReport {
        node_count: stats.node_count,
        node_counts_by_kind: stats.node_counts_by_kind,
        edge_count: stats.edge_count,
        average_degree,
        density,
        top_pagerank,
        top_degree,
    }
}
