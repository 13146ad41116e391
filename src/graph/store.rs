//! GraphStore: indexed node and edge collections
//!
//! Nodes are keyed by [`EntityId`]; edges are indexed by both endpoints so
//! incoming and outgoing neighbors enumerate without a scan. All operations
//! are total and serialize through one interior lock, so multi-key mutations
//! (node removal, per-file entity replacement) are observed atomically.

use super::edge::{Edge, EdgeKind};
use super::entity::{EntityId, NodeKind};
use super::node::Node;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Node and edge counts reported by [`GraphStore::stats`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    /// Counts keyed by node kind (`module`, `function`, `file`, ...)
    pub node_counts_by_kind: HashMap<String, usize>,
    pub edge_count: usize,
}

#[derive(Debug, Default)]
struct GraphInner {
    nodes: HashMap<EntityId, Node>,
    out_edges: HashMap<EntityId, Vec<Edge>>,
    in_edges: HashMap<EntityId, Vec<Edge>>,
    edge_count: usize,
}

impl GraphInner {
    fn insert_edge(&mut self, edge: Edge) {
        self.in_edges
            .entry(edge.to.clone())
            .or_default()
            .push(edge.clone());
        self.out_edges.entry(edge.from.clone()).or_default().push(edge);
        self.edge_count += 1;
    }

    /// Remove a node and every edge touching it.
    fn remove_entity(&mut self, id: &EntityId) {
        if self.nodes.remove(id).is_none()
            && !self.out_edges.contains_key(id)
            && !self.in_edges.contains_key(id)
        {
            return;
        }

        if let Some(outgoing) = self.out_edges.remove(id) {
            self.edge_count -= outgoing.len();
            for edge in &outgoing {
                if &edge.to == id {
                    continue; // self-loop, its incoming copy is dropped below
                }
                if let Some(list) = self.in_edges.get_mut(&edge.to) {
                    list.retain(|e| &e.from != id);
                    if list.is_empty() {
                        self.in_edges.remove(&edge.to);
                    }
                }
            }
        }

        if let Some(incoming) = self.in_edges.remove(id) {
            for edge in &incoming {
                if &edge.from == id {
                    continue; // self-loop, already counted above
                }
                self.edge_count -= 1;
                if let Some(list) = self.out_edges.get_mut(&edge.from) {
                    list.retain(|e| &e.to != id);
                    if list.is_empty() {
                        self.out_edges.remove(&edge.from);
                    }
                }
            }
        }
    }
}

/// In-memory graph of source entities
///
/// Thread-safe; reads may proceed concurrently, writes are exclusive.
#[derive(Debug, Default)]
pub struct GraphStore {
    inner: RwLock<GraphInner>,
}

impl GraphStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node
    pub fn add_node(&self, node: Node) {
        let mut inner = self.inner.write().unwrap();
        inner.nodes.insert(node.id.clone(), node);
    }

    /// Look up a node by id
    pub fn find_node(&self, id: &EntityId) -> Option<Node> {
        self.inner.read().unwrap().nodes.get(id).cloned()
    }

    /// Whether a node with this id exists
    pub fn contains(&self, id: &EntityId) -> bool {
        self.inner.read().unwrap().nodes.contains_key(id)
    }

    /// Append an edge
    ///
    /// Edges are a bag: the same `(from, to, kind)` triple may repeat with
    /// different attrs (distinct call sites).
    pub fn add_edge(&self, edge: Edge) {
        let mut inner = self.inner.write().unwrap();
        inner.insert_edge(edge);
    }

    /// Edges leaving `id`, optionally restricted to one kind
    pub fn outgoing(&self, id: &EntityId, kind: Option<EdgeKind>) -> Vec<Edge> {
        let inner = self.inner.read().unwrap();
        match inner.out_edges.get(id) {
            Some(edges) => edges
                .iter()
                .filter(|e| kind.map_or(true, |k| e.kind == k))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Edges arriving at `id`, optionally restricted to one kind
    pub fn incoming(&self, id: &EntityId, kind: Option<EdgeKind>) -> Vec<Edge> {
        let inner = self.inner.read().unwrap();
        match inner.in_edges.get(id) {
            Some(edges) => edges
                .iter()
                .filter(|e| kind.map_or(true, |k| e.kind == k))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// List nodes, optionally restricted to one kind
    pub fn list_nodes(&self, kind: Option<NodeKind>) -> Vec<Node> {
        self.filter_nodes(kind, |_| true)
    }

    /// List nodes matching a kind and an arbitrary predicate
    pub fn filter_nodes(
        &self,
        kind: Option<NodeKind>,
        predicate: impl Fn(&Node) -> bool,
    ) -> Vec<Node> {
        let inner = self.inner.read().unwrap();
        inner
            .nodes
            .values()
            .filter(|n| kind.map_or(true, |k| n.kind() == k) && predicate(n))
            .cloned()
            .collect()
    }

    /// Nodes whose `file` attribute equals `path`
    pub fn nodes_in_file(&self, path: &str) -> Vec<Node> {
        let inner = self.inner.read().unwrap();
        inner
            .nodes
            .values()
            .filter(|n| n.file() == Some(path))
            .cloned()
            .collect()
    }

    /// Nodes owned by (or naming) the given module
    pub fn nodes_in_module(&self, module: &str) -> Vec<Node> {
        let inner = self.inner.read().unwrap();
        inner
            .nodes
            .values()
            .filter(|n| n.id.module_name() == Some(module))
            .cloned()
            .collect()
    }

    /// Remove a node and all edges touching it
    pub fn remove_node(&self, id: &EntityId) {
        let mut inner = self.inner.write().unwrap();
        inner.remove_entity(id);
    }

    /// Atomically substitute one file's entities
    ///
    /// Deletes `old_ids` (and their edges), then inserts the replacement
    /// nodes and edges, all under a single write lock. This is the one
    /// mutation ingestion performs per file.
    pub fn replace_file_entities(
        &self,
        old_ids: &HashSet<EntityId>,
        new_nodes: Vec<Node>,
        new_edges: Vec<Edge>,
    ) {
        let mut inner = self.inner.write().unwrap();
        for id in old_ids {
            inner.remove_entity(id);
        }
        for node in new_nodes {
            inner.nodes.insert(node.id.clone(), node);
        }
        for edge in new_edges {
            inner.insert_edge(edge);
        }
    }

    /// Node count
    pub fn node_count(&self) -> usize {
        self.inner.read().unwrap().nodes.len()
    }

    /// Edge count (bag cardinality)
    pub fn edge_count(&self) -> usize {
        self.inner.read().unwrap().edge_count
    }

    /// Counts by kind plus totals
    pub fn stats(&self) -> GraphStats {
        let inner = self.inner.read().unwrap();
        let mut by_kind: HashMap<String, usize> = HashMap::new();
        for node in inner.nodes.values() {
            *by_kind.entry(node.kind().to_string()).or_insert(0) += 1;
        }
        GraphStats {
            node_count: inner.nodes.len(),
            node_counts_by_kind: by_kind,
            edge_count: inner.edge_count,
        }
    }

    /// All edges of one kind (used by the graph algorithms)
    pub fn edges_of_kind(&self, kind: EdgeKind) -> Vec<Edge> {
        let inner = self.inner.read().unwrap();
        inner
            .out_edges
            .values()
            .flatten()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Snapshot every node and edge (used by persistence)
    pub fn export(&self) -> (Vec<Node>, Vec<Edge>) {
        let inner = self.inner.read().unwrap();
        let nodes = inner.nodes.values().cloned().collect();
        let edges = inner.out_edges.values().flatten().cloned().collect();
        (nodes, edges)
    }

    /// Replace the entire graph with a persisted snapshot
    pub fn import(&self, nodes: Vec<Node>, edges: Vec<Edge>) {
        let mut inner = self.inner.write().unwrap();
        *inner = GraphInner::default();
        for node in nodes {
            inner.nodes.insert(node.id.clone(), node);
        }
        for edge in edges {
            inner.insert_edge(edge);
        }
    }

    /// Drop everything
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        *inner = GraphInner::default();
    }
}
