//! `GraphStore` — durable, single-writer-many-reader home for a `Graph`.
//!
//! Wraps the in-memory `Graph` behind a `RwLock` (spec §5: one writer at a
//! time, concurrent readers permitted) and snapshots it to
//! `<root>/graph/snapshot.bin` on every mutating call that returns, so the
//! store is durable on return rather than requiring an explicit flush (spec
//! §4.C Guarantees). `petgraph`'s `serde-1` feature does the heavy lifting;
//! `bincode` picks the on-disk encoding, matching how the rest of the
//! persisted layout (`bloom.snap`) is encoded.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::graph::Graph;
use crate::model::{EdgeId, GraphEdge, GraphNode, NodeId};

const SNAPSHOT_DIR: &str = "graph";
const SNAPSHOT_FILE: &str = "snapshot.bin";

pub struct GraphStore {
    root: PathBuf,
    graph: RwLock<Graph>,
}

impl GraphStore {
    /// Open (or initialize) a graph store rooted at `dir`. Idempotent: an
    /// already-initialized directory is loaded as-is; a fresh directory gets
    /// its `graph/` subdirectory created and starts from an empty graph.
    pub fn open(dir: impl AsRef<Path>) -> CoreResult<Self> {
        let root = dir.as_ref().to_path_buf();
        let snapshot_dir = root.join(SNAPSHOT_DIR);
        std::fs::create_dir_all(&snapshot_dir)
            .map_err(|e| CoreError::Store(format!("failed to create {}: {e}", snapshot_dir.display())))?;

        let snapshot_path = snapshot_dir.join(SNAPSHOT_FILE);
        let graph = if snapshot_path.exists() {
            let bytes = std::fs::read(&snapshot_path)
                .map_err(|e| CoreError::Store(format!("failed to read graph snapshot: {e}")))?;
            bincode::deserialize(&bytes)
                .map_err(|e| CoreError::Corruption(format!("graph snapshot is unreadable: {e}")))?
        } else {
            Graph::new()
        };

        tracing::info!(
            path = %snapshot_path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "opened graph store"
        );

        Ok(GraphStore {
            root,
            graph: RwLock::new(graph),
        })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_DIR).join(SNAPSHOT_FILE)
    }

    fn persist(&self) -> CoreResult<()> {
        let graph = self
            .graph
            .read()
            .map_err(|_| CoreError::Store("graph lock poisoned".into()))?;
        let bytes = bincode::serialize(&*graph)
            .map_err(|e| CoreError::Store(format!("failed to encode graph snapshot: {e}")))?;
        std::fs::write(self.snapshot_path(), bytes)
            .map_err(|e| CoreError::Store(format!("failed to write graph snapshot: {e}")))?;
        tracing::debug!("graph snapshot persisted");
        Ok(())
    }

    /// Insert a node, persisting before returning.
    pub fn insert_node(&self, node: GraphNode) -> CoreResult<NodeId> {
        let id = {
            let mut graph = self
                .graph
                .write()
                .map_err(|_| CoreError::Store("graph lock poisoned".into()))?;
            graph.add_node(node)
        };
        self.persist()?;
        Ok(id)
    }

    /// Insert an edge, persisting before returning.
    pub fn insert_edge(&self, edge: GraphEdge) -> CoreResult<EdgeId> {
        let id = {
            let mut graph = self
                .graph
                .write()
                .map_err(|_| CoreError::Store("graph lock poisoned".into()))?;
            graph.add_edge(edge)
        };
        self.persist()?;
        Ok(id)
    }

    /// Remove a node (and, transitively, its incident edges), persisting
    /// before returning. Used on artifact re-ingest (spec §3 Mutated) and on
    /// artifact deletion (spec §3 Destroyed).
    pub fn delete_node(&self, id: NodeId) -> CoreResult<Option<GraphNode>> {
        let removed = {
            let mut graph = self
                .graph
                .write()
                .map_err(|_| CoreError::Store("graph lock poisoned".into()))?;
            graph.remove_node(id)
        };
        self.persist()?;
        Ok(removed)
    }

    /// Run a read-only closure against the graph while holding the read
    /// lock. The Query Engine's traversal calls go through this.
    pub fn read<T>(&self, f: impl FnOnce(&Graph) -> T) -> CoreResult<T> {
        let graph = self
            .graph
            .read()
            .map_err(|_| CoreError::Store("graph lock poisoned".into()))?;
        Ok(f(&graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Artifact, Language};
    use chrono::Utc;
    use std::path::PathBuf;

    fn artifact_node(n: u64) -> GraphNode {
        GraphNode::Artifact(Artifact {
            id: NodeId(n),
            artifact_id: format!("artifact-{n:016x}"),
            path: PathBuf::from(format!("{n}.py")),
            content_hash: "deadbeef".into(),
            language: Language::Python,
            ast_fingerprint: "deadbeef".into(),
            parse_success: true,
            last_modified: Utc::now(),
        })
    }

    #[test]
    fn open_creates_snapshot_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(dir.path()).unwrap();
        assert!(dir.path().join("graph").is_dir());
        assert_eq!(store.read(|g| g.node_count()).unwrap(), 0);
    }

    #[test]
    fn reopen_restores_previously_inserted_nodes() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = GraphStore::open(dir.path()).unwrap();
            store.insert_node(artifact_node(0)).unwrap();
        }
        let reopened = GraphStore::open(dir.path()).unwrap();
        assert_eq!(reopened.read(|g| g.node_count()).unwrap(), 1);
    }

    #[test]
    fn reopen_is_idempotent_on_an_already_initialized_dir() {
        let dir = tempfile::tempdir().unwrap();
        GraphStore::open(dir.path()).unwrap();
        assert!(GraphStore::open(dir.path()).is_ok());
    }
}
