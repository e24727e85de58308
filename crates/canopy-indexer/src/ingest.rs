//! Ingest Adapter: turns `(path, bytes)` into graph state — an `Artifact`
//! node, its `Invariant` children, and `DEPENDS_ON` edges to whatever its
//! imports resolve to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use canopy_core::{
    Artifact, BloomFilter, CheckerSet, DependsOnKind, EdgePayload, GraphEdge, GraphNode,
    GraphStore, Language, NodeId,
};
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::extractor::LanguageExtractor;
use crate::languages::get_extractor;
use crate::parser_pool::{FingerprintNode, ParseRequest, ParserPool};
use crate::resolver::{ImportResolver, PathIndex, Resolution};

/// Outcome of a single `ingest` call — never an `Err`; parser/resolver
/// failures degrade individual fields instead of aborting the file.
#[derive(Debug, Clone)]
pub struct Report {
    pub artifact_id: String,
    pub node_id: NodeId,
    pub parse_success: bool,
    pub dependencies_written: usize,
    pub symbols_found: usize,
    pub violations_found: usize,
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn dependency_kind_for(language: Language) -> DependsOnKind {
    match language {
        Language::Python | Language::JavaScript | Language::TypeScript | Language::Go => {
            DependsOnKind::Import
        }
        Language::Other => DependsOnKind::Include,
    }
}

/// Everything an `ingest` call needs that outlives a single file: the
/// store, Bloom index, checker set, resolver, and path index are all
/// built once by the driver and threaded through — no global state.
pub struct IngestAdapter {
    store: Arc<GraphStore>,
    bloom: Arc<std::sync::RwLock<BloomFilter>>,
    checkers: Arc<CheckerSet>,
    resolver: ImportResolver,
    path_index: Arc<PathIndex>,
    parser_pool: ParserPool,
}

impl IngestAdapter {
    pub fn new(
        store: Arc<GraphStore>,
        bloom: Arc<std::sync::RwLock<BloomFilter>>,
        checkers: Arc<CheckerSet>,
        project_root: impl Into<PathBuf>,
        parser_pool: ParserPool,
    ) -> Self {
        let project_root = project_root.into();
        IngestAdapter {
            store,
            bloom,
            checkers,
            resolver: ImportResolver::new(project_root.clone()),
            path_index: Arc::new(PathIndex::new(project_root)),
            parser_pool,
        }
    }

    pub fn ingest(&self, path: &Path, bytes: &[u8]) -> Report {
        let hash = content_hash(bytes);
        let artifact_id = format!("artifact-{}", &hash[..16]);
        let language = Language::from_path(path);

        let previous = self.store.read(|g| g.find_artifact_by_path(path)).unwrap_or(None);
        let previous_artifact_id = previous.and_then(|old_id| {
            self.store
                .read(|g| g.node(old_id).and_then(|n| n.as_artifact()).map(|a| a.artifact_id.clone()))
                .ok()
                .flatten()
                .map(|id| (old_id, id))
        });

        // Re-ingesting the same path with identical bytes is a no-op on the
        // graph: same id falls out of the content hash, nothing to write.
        if let Some((old_id, ref old_artifact_id)) = previous_artifact_id {
            if old_artifact_id == &artifact_id {
                let extractor = get_extractor(path, self.parser_pool.clone());
                let summary = extractor.extract(path, bytes).unwrap_or_default();
                return Report {
                    artifact_id,
                    node_id: old_id,
                    parse_success: summary.parse_success,
                    dependencies_written: 0,
                    symbols_found: summary.functions.len() + summary.classes.len(),
                    violations_found: 0,
                };
            }
            // Different bytes at the same path: drop the stale node (and its
            // outgoing edges) before writing the new one.
            let _ = self.store.delete_node(old_id);
            self.path_index.forget_id(old_id);
        }

        let extractor = get_extractor(path, self.parser_pool.clone());
        let summary = match extractor.extract(path, bytes) {
            Ok(summary) => summary,
            Err(e) => {
                return self.record_degraded(path, bytes, &hash, &artifact_id, language, e.to_string())
            }
        };

        let fingerprint = self.fingerprint_for(path, bytes);

        let artifact = Artifact {
            id: NodeId(0),
            artifact_id: artifact_id.clone(),
            path: path.to_path_buf(),
            content_hash: hash,
            language,
            ast_fingerprint: fingerprint,
            parse_success: summary.parse_success,
            last_modified: Utc::now(),
        };

        let node_id = self
            .store
            .insert_node(GraphNode::Artifact(artifact.clone()))
            .expect("insert_node is infallible for well-formed nodes");
        self.path_index.record(path.to_path_buf(), node_id);

        if let Ok(mut bloom) = self.bloom.write() {
            bloom.insert(&artifact_id);
        }

        let dependencies_written = self.write_dependencies(node_id, path, language, &summary);

        let violations = self
            .checkers
            .check_all(&artifact, &String::from_utf8_lossy(bytes), &summary);
        let violations_found = violations.len();
        for violation in violations {
            let strictness = severity_to_strictness(violation.severity);
            let invariant_id = self
                .store
                .insert_node(GraphNode::Invariant(violation.into_invariant(NodeId(0))))
                .expect("insert_node is infallible for well-formed nodes");
            let _ = self.store.insert_edge(GraphEdge {
                id: canopy_core::EdgeId(0),
                source: node_id,
                target: invariant_id,
                payload: EdgePayload::Constrains { strictness },
            });
        }

        Report {
            artifact_id,
            node_id,
            parse_success: summary.parse_success,
            dependencies_written,
            symbols_found: summary.functions.len() + summary.classes.len(),
            violations_found,
        }
    }

    fn fingerprint_for(&self, path: &Path, bytes: &[u8]) -> String {
        let request = ParseRequest {
            file_type: crate::parser_pool::FileType::from_path(&path.to_path_buf()),
            content: String::from_utf8_lossy(bytes).into_owned(),
            path: path.to_path_buf(),
        };
        match self.parser_pool.parse_blocking(request) {
            Ok(result) => match result.tree {
                Some(tree) => {
                    let node = FingerprintNode::new(tree.root_node());
                    let (fp, _) = canopy_core::fingerprint_file(Some(&node), bytes);
                    fp
                }
                None => canopy_core::fingerprint::content_fingerprint(bytes),
            },
            Err(_) => canopy_core::fingerprint::content_fingerprint(bytes),
        }
    }

    fn write_dependencies(
        &self,
        node_id: NodeId,
        path: &Path,
        language: Language,
        summary: &canopy_core::AstSummary,
    ) -> usize {
        let kind = dependency_kind_for(language);
        let mut written = 0;
        for import in &summary.imports {
            let resolution = self
                .store
                .read(|g| self.resolver.resolve(import, path, language, &self.path_index, g))
                .unwrap_or(Resolution::Unresolved);

            if let Resolution::Internal(target) = resolution {
                let edge = GraphEdge {
                    id: canopy_core::EdgeId(0),
                    source: node_id,
                    target,
                    payload: EdgePayload::DependsOn { kind, weight: 1.0 },
                };
                if self.store.insert_edge(edge).is_ok() {
                    written += 1;
                }
            }
        }
        written
    }

    fn record_degraded(
        &self,
        path: &Path,
        bytes: &[u8],
        hash: &str,
        artifact_id: &str,
        language: Language,
        error: String,
    ) -> Report {
        let artifact = Artifact {
            id: NodeId(0),
            artifact_id: artifact_id.to_string(),
            path: path.to_path_buf(),
            content_hash: hash.to_string(),
            language,
            ast_fingerprint: canopy_core::fingerprint::content_fingerprint(bytes),
            parse_success: false,
            last_modified: Utc::now(),
        };
        tracing::warn!(path = %path.display(), error, "ingest degraded to content-hash fallback");
        let node_id = self
            .store
            .insert_node(GraphNode::Artifact(artifact))
            .expect("insert_node is infallible for well-formed nodes");
        if let Ok(mut bloom) = self.bloom.write() {
            bloom.insert(artifact_id);
        }
        Report {
            artifact_id: artifact_id.to_string(),
            node_id,
            parse_success: false,
            dependencies_written: 0,
            symbols_found: 0,
            violations_found: 0,
        }
    }
}

fn severity_to_strictness(severity: canopy_core::Severity) -> f32 {
    use canopy_core::Severity::*;
    match severity {
        Critical => 1.0,
        High => 0.75,
        Medium => 0.5,
        Low => 0.25,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_pool::create_parser_pool;
    use tempfile::tempdir;

    fn adapter(dir: &std::path::Path) -> IngestAdapter {
        let store = Arc::new(GraphStore::open(dir).unwrap());
        let bloom = Arc::new(std::sync::RwLock::new(BloomFilter::new(10_000, 0.01)));
        let checkers = Arc::new(CheckerSet::default_set());
        IngestAdapter::new(store, bloom, checkers, dir, create_parser_pool())
    }

    #[test]
    fn ingest_creates_an_artifact_node() {
        let dir = tempdir().unwrap();
        let adapter = adapter(dir.path());
        let code = b"def hello():\n    return 1\n";
        let report = adapter.ingest(Path::new("hello.py"), code);
        assert!(report.parse_success);
        assert_eq!(report.symbols_found, 1);
    }

    #[test]
    fn reingesting_identical_bytes_is_a_no_op_on_node_count() {
        let dir = tempdir().unwrap();
        let adapter = adapter(dir.path());
        let code = b"def hello():\n    return 1\n";
        let first = adapter.ingest(Path::new("hello.py"), code);
        let second = adapter.ingest(Path::new("hello.py"), code);
        assert_eq!(first.artifact_id, second.artifact_id);
        let node_count = adapter.store.read(|g| g.node_count()).unwrap();
        assert_eq!(node_count, 1);
    }

    #[test]
    fn ingest_flags_hardcoded_secrets_as_invariants() {
        let dir = tempdir().unwrap();
        let adapter = adapter(dir.path());
        let code = b"password = \"hunter2hunter2\"\n";
        let report = adapter.ingest(Path::new("config.py"), code);
        assert!(report.violations_found >= 1);
    }

    #[test]
    fn ingest_writes_dependency_edges_for_resolvable_imports() {
        let dir = tempdir().unwrap();
        let adapter = adapter(dir.path());
        adapter.ingest(Path::new("pkg/helpers.py"), b"def helper():\n    return 1\n");
        let report = adapter.ingest(Path::new("app/main.py"), b"import pkg.helpers\n");
        assert_eq!(report.dependencies_written, 1);
    }
}
