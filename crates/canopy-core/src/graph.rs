//! Graph wrapper using `petgraph::StableDiGraph` with stable `NodeId`/`EdgeId`.

use std::collections::HashSet;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::model::*;

/// Hard ceiling on traversal depth, enforced regardless of what a caller
/// asks for (spec §4.C). Five hops covers the bounded dependency walks the
/// Query Engine issues without risking an unbounded fan-out on a dense
/// graph.
pub const MAX_TRAVERSAL_DEPTH: usize = 5;

/// Hard ceiling on rows returned by a single traversal call.
pub const MAX_TRAVERSAL_ROWS: usize = 100;

/// The code graph — a directed multigraph with stable node/edge indices.
#[derive(Serialize, Deserialize)]
pub struct Graph {
    inner: StableDiGraph<GraphNode, GraphEdge>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
        }
    }

    /// Add a node to the graph. Returns the assigned `NodeId`, and writes
    /// that same id back into the node's own `id` field — a caller never
    /// knows the real id before insertion, so it constructs one with a
    /// placeholder (`NodeId(0)`) that this reconciles.
    pub fn add_node(&mut self, node: GraphNode) -> NodeId {
        let idx = self.inner.add_node(node);
        let id = NodeId(idx.index() as u64);
        if let Some(stored) = self.inner.node_weight_mut(idx) {
            stored.set_id(id);
        }
        id
    }

    /// Add an edge to the graph. Returns the assigned `EdgeId`.
    pub fn add_edge(&mut self, edge: GraphEdge) -> EdgeId {
        let source = NodeIndex::new(edge.source.0 as usize);
        let target = NodeIndex::new(edge.target.0 as usize);
        let idx = self.inner.add_edge(source, target, edge);
        EdgeId(idx.index() as u64)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        let idx = NodeIndex::new(id.0 as usize);
        self.inner.node_weight(idx)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        let idx = NodeIndex::new(id.0 as usize);
        self.inner.node_weight_mut(idx)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&GraphEdge> {
        let idx = EdgeIndex::new(id.0 as usize);
        self.inner.edge_weight(idx)
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    pub fn all_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// Outgoing edges from a node.
    pub fn edges_from(&self, source: NodeId) -> impl Iterator<Item = &GraphEdge> {
        let idx = NodeIndex::new(source.0 as usize);
        self.inner
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(move |edge_ref| self.inner.edge_weight(edge_ref.id()))
    }

    /// Incoming edges to a node.
    pub fn edges_to(&self, target: NodeId) -> impl Iterator<Item = &GraphEdge> {
        let idx = NodeIndex::new(target.0 as usize);
        self.inner
            .edges_directed(idx, Direction::Incoming)
            .filter_map(move |edge_ref| self.inner.edge_weight(edge_ref.id()))
    }

    pub fn has_edge_between(&self, source: NodeId, target: NodeId, kind: EdgeKind) -> bool {
        self.edges_from(source)
            .any(|e| e.target == target && e.payload.kind() == kind)
    }

    /// First artifact node whose path matches exactly.
    pub fn find_artifact_by_path(&self, path: &std::path::Path) -> Option<NodeId> {
        self.all_nodes_indexed()
            .find(|(_, n)| matches!(n, GraphNode::Artifact(a) if a.path == path))
            .map(|(idx, _)| idx)
    }

    /// First artifact node whose `artifact_id` matches.
    pub fn find_artifact_by_id(&self, artifact_id: &str) -> Option<NodeId> {
        self.all_nodes_indexed()
            .find(|(_, n)| matches!(n, GraphNode::Artifact(a) if a.artifact_id == artifact_id))
            .map(|(idx, _)| idx)
    }

    /// First concept node with this name.
    pub fn find_concept_by_name(&self, name: &str) -> Option<NodeId> {
        self.all_nodes_indexed()
            .find(|(_, n)| matches!(n, GraphNode::Concept(c) if c.name == name))
            .map(|(idx, _)| idx)
    }

    fn all_nodes_indexed(&self) -> impl Iterator<Item = (NodeId, &GraphNode)> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx).map(|n| (NodeId(idx.index() as u64), n)))
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = NodeId> + '_ {
        self.all_nodes_indexed()
            .filter(move |(_, n)| n.kind() == kind)
            .map(|(idx, _)| idx)
    }

    /// Remove a node and all edges incident to it (petgraph cascades this).
    /// Used on re-ingest: a changed artifact's stale node is removed before
    /// the new one is inserted, so no dangling `DEPENDS_ON` edge can survive
    /// (spec §3 invariant 5).
    pub fn remove_node(&mut self, id: NodeId) -> Option<GraphNode> {
        let idx = NodeIndex::new(id.0 as usize);
        self.inner.remove_node(idx)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<GraphEdge> {
        let idx = EdgeIndex::new(id.0 as usize);
        self.inner.remove_edge(idx)
    }

    /// Bounded forward traversal along edges of `kind`, up to
    /// `max_depth.min(MAX_TRAVERSAL_DEPTH)` hops, collecting at most
    /// `MAX_TRAVERSAL_ROWS` distinct nodes. A visited-set guards against
    /// cycles — a cyclic dependency graph is a correctness property to
    /// traverse safely, not a special case to detect and reject (spec §9).
    pub fn traverse(&self, start: NodeId, kind: EdgeKind, max_depth: usize) -> Vec<NodeId> {
        let depth_cap = max_depth.min(MAX_TRAVERSAL_DEPTH);
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut frontier = vec![start];
        let mut result = Vec::new();

        for _ in 0..depth_cap {
            if result.len() >= MAX_TRAVERSAL_ROWS {
                break;
            }
            let mut next_frontier = Vec::new();
            for node in frontier {
                for edge in self.edges_from(node) {
                    if edge.payload.kind() != kind {
                        continue;
                    }
                    if visited.insert(edge.target) {
                        result.push(edge.target);
                        next_frontier.push(edge.target);
                        if result.len() >= MAX_TRAVERSAL_ROWS {
                            break;
                        }
                    }
                }
                if result.len() >= MAX_TRAVERSAL_ROWS {
                    break;
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        result.truncate(MAX_TRAVERSAL_ROWS);
        result
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn artifact(id: u64, path: &str) -> GraphNode {
        GraphNode::Artifact(Artifact {
            id: NodeId(id),
            artifact_id: format!("artifact-{id:016x}"),
            path: PathBuf::from(path),
            content_hash: "deadbeef".into(),
            language: Language::Python,
            ast_fingerprint: "deadbeef".into(),
            parse_success: true,
            last_modified: Utc::now(),
        })
    }

    #[test]
    fn add_and_fetch_node() {
        let mut g = Graph::new();
        let id = g.add_node(artifact(0, "a.py"));
        assert!(g.node(id).is_some());
    }

    #[test]
    fn remove_node_cascades_edges() {
        let mut g = Graph::new();
        let a = g.add_node(artifact(0, "a.py"));
        let b = g.add_node(artifact(1, "b.py"));
        g.add_edge(GraphEdge {
            id: EdgeId(0),
            source: a,
            target: b,
            payload: EdgePayload::DependsOn {
                kind: DependsOnKind::Import,
                weight: 1.0,
            },
        });
        assert_eq!(g.edge_count(), 1);
        g.remove_node(a);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn traverse_respects_depth_cap() {
        let mut g = Graph::new();
        let mut prev = g.add_node(artifact(0, "0.py"));
        for i in 1..10u64 {
            let next = g.add_node(artifact(i, &format!("{i}.py")));
            g.add_edge(GraphEdge {
                id: EdgeId(i),
                source: prev,
                target: next,
                payload: EdgePayload::DependsOn {
                    kind: DependsOnKind::Import,
                    weight: 1.0,
                },
            });
            prev = next;
        }
        let reached = g.traverse(NodeId(0), EdgeKind::DependsOn, 100);
        assert!(reached.len() <= MAX_TRAVERSAL_DEPTH);
    }

    #[test]
    fn traverse_handles_cycles_without_looping_forever() {
        let mut g = Graph::new();
        let a = g.add_node(artifact(0, "a.py"));
        let b = g.add_node(artifact(1, "b.py"));
        g.add_edge(GraphEdge {
            id: EdgeId(0),
            source: a,
            target: b,
            payload: EdgePayload::DependsOn {
                kind: DependsOnKind::Import,
                weight: 1.0,
            },
        });
        g.add_edge(GraphEdge {
            id: EdgeId(1),
            source: b,
            target: a,
            payload: EdgePayload::DependsOn {
                kind: DependsOnKind::Import,
                weight: 1.0,
            },
        });
        let reached = g.traverse(a, EdgeKind::DependsOn, MAX_TRAVERSAL_DEPTH);
        assert_eq!(reached, vec![b]);
    }

    #[test]
    fn find_artifact_by_path_matches_exact_path() {
        let mut g = Graph::new();
        let id = g.add_node(artifact(0, "src/main.py"));
        assert_eq!(g.find_artifact_by_path(std::path::Path::new("src/main.py")), Some(id));
        assert_eq!(g.find_artifact_by_path(std::path::Path::new("src/other.py")), None);
    }
}
