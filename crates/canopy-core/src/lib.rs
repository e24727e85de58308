//! Canopy Core — the fingerprinter, Bloom index, graph store, and invariant
//! checkers that make up the retrieval engine's storage layer. No transport,
//! no filesystem walking, no tree-sitter dependency: those live in
//! `canopy-indexer` and the root binary.

pub mod bloom;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod invariants;
pub mod model;
pub mod query_lang;
pub mod store;

pub use bloom::BloomFilter;
pub use error::{CoreError, CoreResult};
pub use fingerprint::{fingerprint_file, fingerprint_node, AstNode};
pub use graph::{Graph, MAX_TRAVERSAL_DEPTH, MAX_TRAVERSAL_ROWS};
pub use invariants::{Checker, CheckerConfig, CheckerSet, InvariantViolation};
pub use model::{
    Artifact, AstSummary, ClassSig, Concept, ConceptLayer, DependsOnKind, EdgeId, EdgeKind,
    EdgePayload, FunctionSig, GraphEdge, GraphNode, Invariant, Language, NodeId, NodeKind,
    Severity,
};
pub use query_lang::{execute as execute_query, parse as parse_query, TraversalQuery};
pub use store::GraphStore;
