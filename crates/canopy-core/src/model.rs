//! Core data model: artifact, concept, and invariant nodes; typed edges.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier for a graph node. Assigned by the `Graph` on insertion
/// and stable for the lifetime of that node (see `graph::Graph::add_node`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub u64);

/// Stable identifier for a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct EdgeId(pub u64);

/// Supported languages for syntax-aware parsing. The fixed set the core is
/// tested against is {Python, JavaScript, TypeScript, Go}; other tags pass
/// through opaquely and collapse to fingerprint-only handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Other,
}

impl Default for Language {
    fn default() -> Self {
        Language::Other
    }
}

impl Language {
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") | Some("pyi") => Language::Python,
            Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => Language::JavaScript,
            Some("ts") | Some("tsx") => Language::TypeScript,
            Some("go") => Language::Go,
            _ => Language::Other,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Other => "other",
        }
    }
}

/// A parsed source file. The essential entity of the graph (spec §3).
///
/// Invariant: `path` is unique per repository root; `id` is unique
/// globally; `ast_fingerprint` is a function of the tree alone, never of
/// whitespace or comments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub id: NodeId,
    /// Driver-facing stable id, `"artifact-" + hex(sha256(bytes))[0:16]`.
    pub artifact_id: String,
    pub path: PathBuf,
    /// Hex-encoded SHA-256 of the raw bytes.
    pub content_hash: String,
    pub language: Language,
    /// 64 hex chars when `parse_success`; otherwise holds the content hash
    /// in its place (spec §3 invariant 2).
    pub ast_fingerprint: String,
    pub parse_success: bool,
    pub last_modified: DateTime<Utc>,
}

/// The fixed small set of concept layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConceptLayer {
    Domain,
    Task,
    Implementation,
}

/// A semantic annotation attached to artifacts. Peripheral to the core;
/// `EVOKES` edges are part of the graph contract regardless.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Concept {
    pub id: NodeId,
    pub name: String,
    pub layer: ConceptLayer,
    /// In [0, 1].
    pub stability: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// A rule annotation detected at ingest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invariant {
    pub id: NodeId,
    pub rule_name: String,
    pub severity: Severity,
    pub check_expression: Option<String>,
}

/// Discriminates the kind of value a node holds, for filtering by `kind`
/// without matching the whole enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Artifact,
    Concept,
    Invariant,
}

/// A single node in the graph. A sum type rather than one flat struct with
/// optional fields per kind — see DESIGN.md on the duck-typed-values
/// redesign flag for the broader pattern this follows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GraphNode {
    Artifact(Artifact),
    Concept(Concept),
    Invariant(Invariant),
}

impl GraphNode {
    pub fn id(&self) -> NodeId {
        match self {
            GraphNode::Artifact(a) => a.id,
            GraphNode::Concept(c) => c.id,
            GraphNode::Invariant(i) => i.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            GraphNode::Artifact(_) => NodeKind::Artifact,
            GraphNode::Concept(_) => NodeKind::Concept,
            GraphNode::Invariant(_) => NodeKind::Invariant,
        }
    }

    pub fn as_artifact(&self) -> Option<&Artifact> {
        match self {
            GraphNode::Artifact(a) => Some(a),
            _ => None,
        }
    }

    /// Overwrite the node's own id field, used once by `Graph::add_node` to
    /// reconcile the placeholder id a caller constructs a node with (the
    /// real id isn't known until petgraph assigns an index) with the id
    /// that's actually addressable afterward.
    pub fn set_id(&mut self, id: NodeId) {
        match self {
            GraphNode::Artifact(a) => a.id = id,
            GraphNode::Concept(c) => c.id = id,
            GraphNode::Invariant(i) => i.id = id,
        }
    }
}

/// How an import string was expressed in source (spec §3 DEPENDS_ON.kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependsOnKind {
    Import,
    Require,
    Include,
}

/// Typed, directed edge payloads. One variant per edge kind in spec §3,
/// carrying exactly that edge's key attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum EdgePayload {
    DependsOn { kind: DependsOnKind, weight: f32 },
    Evokes { weight: f32 },
    Constrains { strictness: f32 },
    RelatedTo { weight: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    DependsOn,
    Evokes,
    Constrains,
    RelatedTo,
}

impl EdgePayload {
    pub fn kind(&self) -> EdgeKind {
        match self {
            EdgePayload::DependsOn { .. } => EdgeKind::DependsOn,
            EdgePayload::Evokes { .. } => EdgeKind::Evokes,
            EdgePayload::Constrains { .. } => EdgeKind::Constrains,
            EdgePayload::RelatedTo { .. } => EdgeKind::RelatedTo,
        }
    }
}

/// A directed edge in the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub payload: EdgePayload,
}

/// Transient value produced on query from the external parser collaborator;
/// never stored in the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AstSummary {
    pub language: Option<Language>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub functions: Vec<FunctionSig>,
    pub classes: Vec<ClassSig>,
    pub parse_success: bool,
    /// Present when re-parsing failed or the source file could not be read.
    pub error_marker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FunctionSig {
    pub name: String,
    pub params: Vec<String>,
    pub return_type: String,
    pub callees: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClassSig {
    pub name: String,
    pub methods: Vec<String>,
}
