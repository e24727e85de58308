//! Query Engine (component F): the read path an agent actually calls.
//!
//! `query()` fuses a Bloom probe (cheap definite-absence check), a bounded
//! graph traversal for dependencies, and a re-parse of every touched
//! artifact into one TOON bundle. Grounded on
//! `mcp_server/tools/query.py`'s contract fields (`bloom_hit`,
//! `files_parsed`, `tokens_estimated`, `duration_ms`) and
//! `palace/api/context.py`'s artifact-lookup-by-path Cypher pattern, though
//! the activation-spreading machinery in `context.py` is out of scope here
//! (spec §1 Non-goals) — this engine does one bounded `DEPENDS_ON`
//! traversal, not energy-weighted spreading activation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use canopy_core::{BloomFilter, EdgeKind, GraphStore};
use canopy_indexer::languages::get_extractor;
use canopy_indexer::parser_pool::ParserPool;

use crate::cancellation::CancellationFlag;
use crate::toon;

/// Upper bound on how many dependency artifacts a single query call re-parses
/// and includes in a bundle — narrower than `Graph::MAX_TRAVERSAL_ROWS`
/// because this cap also gates re-parse work, not just traversal rows.
pub const MAX_DEPENDENCIES_RETURNED: usize = 50;

/// Inclusive bounds on `max_depth`; anything outside is rejected with
/// `CoreError::Validation` rather than silently clamped (spec §8 Boundary
/// behaviors: "max_depth = 5 saturates; max_depth = 6 is rejected").
pub const MIN_MAX_DEPTH: usize = 1;
pub const MAX_MAX_DEPTH: usize = 5;

/// Result of a single `query()` call. Once past argument validation,
/// `query()` never returns `Err` for "not found" or "parse failed"; those
/// degrade into `bundle` holding an `# Error: …` TOON comment (spec §7).
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub bundle: String,
    pub bloom_hit: bool,
    pub files_parsed: usize,
    pub tokens_estimated: usize,
    pub duration_ms: u64,
    pub dependencies_found: usize,
    pub truncated: bool,
}

/// Aggregate counters surfaced by `Repository::stats` (spec §6 Core API).
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub node_count: usize,
    pub edge_count: usize,
    pub bloom_estimated_count: u64,
    pub bloom_load_factor: f64,
}

pub struct QueryEngine {
    store: Arc<GraphStore>,
    bloom: Arc<RwLock<BloomFilter>>,
    project_root: PathBuf,
    parser_pool: ParserPool,
    soft_deadline: Duration,
}

impl QueryEngine {
    pub fn new(
        store: Arc<GraphStore>,
        bloom: Arc<RwLock<BloomFilter>>,
        project_root: impl Into<PathBuf>,
        parser_pool: ParserPool,
        soft_deadline: Duration,
    ) -> Self {
        QueryEngine {
            store,
            bloom,
            project_root: project_root.into(),
            parser_pool,
            soft_deadline,
        }
    }

    /// Resolve `artifact_id` to a context bundle: its own summary plus,
    /// when `include_deps` is set, up to `MAX_DEPENDENCIES_RETURNED`
    /// direct-and-transitive `DEPENDS_ON` targets bounded to `max_depth`
    /// hops. `max_depth` must fall in `MIN_MAX_DEPTH..=MAX_MAX_DEPTH`;
    /// outside that range the call is rejected with `Validation` rather
    /// than silently clamped (spec §8 Boundary behaviors).
    ///
    /// Suspension points (spec §5): before the Bloom probe, before/after
    /// each graph-store read, and before each per-dependency re-parse. The
    /// caller's `cancel` flag is checked at each one; a cancelled query
    /// returns whatever bundle has accumulated so far, marked `truncated`.
    pub async fn query(
        &self,
        artifact_id: &str,
        include_deps: bool,
        max_depth: usize,
        cancel: &CancellationFlag,
    ) -> canopy_core::CoreResult<QueryResult> {
        if !(MIN_MAX_DEPTH..=MAX_MAX_DEPTH).contains(&max_depth) {
            return Err(canopy_core::CoreError::Validation(format!(
                "max_depth must be in {MIN_MAX_DEPTH}..={MAX_MAX_DEPTH}, got {max_depth}"
            )));
        }

        let started = Instant::now();

        if cancel.is_cancelled() {
            return Ok(self.truncated_result(started, false));
        }

        let bloom_hit = {
            let bloom = self.bloom.read().expect("bloom lock poisoned");
            bloom.contains(artifact_id)
        };
        if !bloom_hit {
            // Bloom guarantees zero false negatives: a miss here is a
            // definite absence, so the graph is never even scanned.
            return Ok(QueryResult {
                bundle: toon::error_bundle(&format!("artifact not found: {artifact_id}")),
                bloom_hit: false,
                files_parsed: 0,
                tokens_estimated: 0,
                duration_ms: elapsed_ms(started),
                dependencies_found: 0,
                truncated: false,
            });
        }

        if cancel.is_cancelled() {
            return Ok(self.truncated_result(started, bloom_hit));
        }

        let node_id = match self.store.read(|g| g.find_artifact_by_id(artifact_id)) {
            Ok(Some(id)) => id,
            _ => {
                return Ok(QueryResult {
                    bundle: toon::error_bundle("artifact node not found"),
                    bloom_hit,
                    files_parsed: 0,
                    tokens_estimated: 0,
                    duration_ms: elapsed_ms(started),
                    dependencies_found: 0,
                    truncated: false,
                })
            }
        };

        let main_artifact = match self.store.read(|g| g.node(node_id).and_then(|n| n.as_artifact()).cloned()) {
            Ok(Some(a)) => a,
            _ => {
                return Ok(QueryResult {
                    bundle: toon::error_bundle("artifact node not found"),
                    bloom_hit,
                    files_parsed: 0,
                    tokens_estimated: 0,
                    duration_ms: elapsed_ms(started),
                    dependencies_found: 0,
                    truncated: false,
                })
            }
        };

        if cancel.is_cancelled() {
            return Ok(self.truncated_result(started, bloom_hit));
        }

        let dependency_paths: Vec<PathBuf> = if include_deps {
            let dependency_ids = self
                .store
                .read(|g| g.traverse(node_id, EdgeKind::DependsOn, max_depth))
                .unwrap_or_default();

            self.store
                .read(|g| {
                    dependency_ids
                        .iter()
                        .filter_map(|id| g.node(*id).and_then(|n| n.as_artifact()).map(|a| a.path.clone()))
                        .take(MAX_DEPENDENCIES_RETURNED)
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let dependencies_found = dependency_paths.len();

        if cancel.is_cancelled() {
            return Ok(self.truncated_result(started, bloom_hit));
        }

        let mut truncated = false;
        let (main_summary, _) = self.reparse(&main_artifact.path);

        let mut deps = Vec::new();
        for dep_path in &dependency_paths {
            if cancel.is_cancelled() || started.elapsed() > self.soft_deadline {
                truncated = true;
                break;
            }
            let (summary, _) = self.reparse(dep_path);
            deps.push((dep_path.display().to_string(), summary));
        }

        let bundle = toon::emit(&main_artifact.path.display().to_string(), &main_summary, &deps, truncated);
        let tokens_estimated = toon::estimate_tokens(&bundle);

        Ok(QueryResult {
            bundle,
            bloom_hit,
            files_parsed: 1 + deps.len(),
            tokens_estimated,
            duration_ms: elapsed_ms(started),
            dependencies_found,
            truncated,
        })
    }

    /// Artifacts whose `ast_fingerprint` exactly matches `artifact_id`'s own
    /// — structural clones, per spec §4.A's order-independence guarantee.
    /// `limit` is validated to `1..=50`, mirroring the MCP tool's bound.
    pub fn find_similar(&self, artifact_id: &str, limit: usize) -> canopy_core::CoreResult<Vec<String>> {
        if !(1..=50).contains(&limit) {
            return Err(canopy_core::CoreError::Validation(format!(
                "limit must be in 1..=50, got {limit}"
            )));
        }

        let target_fingerprint = self.store.read(|g| {
            g.find_artifact_by_id(artifact_id)
                .and_then(|id| g.node(id))
                .and_then(|n| n.as_artifact())
                .map(|a| a.ast_fingerprint.clone())
        })?;

        let Some(fingerprint) = target_fingerprint else {
            return Ok(Vec::new());
        };

        let matches = self.store.read(|g| {
            g.all_nodes()
                .filter_map(|n| n.as_artifact())
                .filter(|a| a.artifact_id != artifact_id && a.ast_fingerprint == fingerprint && a.parse_success)
                .map(|a| a.artifact_id.clone())
                .take(limit)
                .collect::<Vec<_>>()
        })?;

        Ok(matches)
    }

    pub fn stats(&self) -> Stats {
        let (node_count, edge_count) = self.store.read(|g| (g.node_count(), g.edge_count())).unwrap_or((0, 0));
        let bloom = self.bloom.read().expect("bloom lock poisoned");
        Stats {
            node_count,
            edge_count,
            bloom_estimated_count: bloom.estimate_count(),
            bloom_load_factor: bloom.load_factor(),
        }
    }

    fn reparse(&self, relative_path: &Path) -> (canopy_core::AstSummary, bool) {
        let absolute = self.project_root.join(relative_path);
        let bytes = match std::fs::read(&absolute) {
            Ok(bytes) => bytes,
            Err(e) => {
                let mut summary = canopy_core::AstSummary::default();
                summary.error_marker = Some(format!("could not read {}: {e}", absolute.display()));
                return (summary, false);
            }
        };

        let extractor = get_extractor(relative_path, self.parser_pool.clone());
        match extractor.extract(relative_path, &bytes) {
            Ok(summary) => {
                let success = summary.parse_success;
                (summary, success)
            }
            Err(e) => {
                let mut summary = canopy_core::AstSummary::default();
                summary.error_marker = Some(e.to_string());
                (summary, false)
            }
        }
    }

    fn truncated_result(&self, started: Instant, bloom_hit: bool) -> QueryResult {
        QueryResult {
            bundle: toon::error_bundle("query cancelled"),
            bloom_hit,
            files_parsed: 0,
            tokens_estimated: 0,
            duration_ms: elapsed_ms(started),
            dependencies_found: 0,
            truncated: true,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::CheckerSet;
    use canopy_indexer::ingest::IngestAdapter;
    use canopy_indexer::parser_pool::create_parser_pool;
    use tempfile::tempdir;

    fn setup(dir: &Path) -> (Arc<GraphStore>, Arc<RwLock<BloomFilter>>, IngestAdapter) {
        let store = Arc::new(GraphStore::open(dir).unwrap());
        let bloom = Arc::new(RwLock::new(BloomFilter::new(10_000, 0.01)));
        let checkers = Arc::new(CheckerSet::default_set());
        let adapter = IngestAdapter::new(store.clone(), bloom.clone(), checkers, dir, create_parser_pool());
        (store, bloom, adapter)
    }

    #[tokio::test]
    async fn query_for_unknown_artifact_reports_bloom_miss() {
        let dir = tempdir().unwrap();
        let (store, bloom, _adapter) = setup(dir.path());
        let engine = QueryEngine::new(store, bloom, dir.path(), create_parser_pool(), Duration::from_millis(500));
        let result = engine
            .query("artifact-0000000000000000", true, 2, &CancellationFlag::new())
            .await
            .unwrap();
        assert!(!result.bloom_hit);
        assert!(result.bundle.starts_with("# Error:"));
    }

    #[tokio::test]
    async fn query_returns_bundle_for_ingested_artifact() {
        let dir = tempdir().unwrap();
        let (store, bloom, adapter) = setup(dir.path());
        std::fs::write(dir.path().join("main.py"), b"def run():\n    return 1\n").unwrap();
        let report = adapter.ingest(Path::new("main.py"), b"def run():\n    return 1\n");

        let engine = QueryEngine::new(store, bloom, dir.path(), create_parser_pool(), Duration::from_millis(500));
        let result = engine
            .query(&report.artifact_id, true, 2, &CancellationFlag::new())
            .await
            .unwrap();
        assert!(result.bloom_hit);
        assert!(result.bundle.contains("main.py"));
        assert_eq!(result.files_parsed, 1);
        assert_eq!(result.dependencies_found, 0);
    }

    #[tokio::test]
    async fn query_includes_dependency_summaries() {
        let dir = tempdir().unwrap();
        let (store, bloom, adapter) = setup(dir.path());
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/helpers.py"), b"def helper():\n    return 1\n").unwrap();
        std::fs::write(dir.path().join("app.py"), b"import pkg.helpers\n").unwrap();

        adapter.ingest(Path::new("pkg/helpers.py"), b"def helper():\n    return 1\n");
        let report = adapter.ingest(Path::new("app.py"), b"import pkg.helpers\n");

        let engine = QueryEngine::new(store, bloom, dir.path(), create_parser_pool(), Duration::from_millis(500));
        let result = engine
            .query(&report.artifact_id, true, 2, &CancellationFlag::new())
            .await
            .unwrap();
        assert_eq!(result.files_parsed, 2);
        assert_eq!(result.dependencies_found, 1);
        assert!(result.bundle.contains("helpers.py"));
    }

    #[tokio::test]
    async fn query_without_include_deps_skips_traversal() {
        let dir = tempdir().unwrap();
        let (store, bloom, adapter) = setup(dir.path());
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/helpers.py"), b"def helper():\n    return 1\n").unwrap();
        std::fs::write(dir.path().join("app.py"), b"import pkg.helpers\n").unwrap();

        adapter.ingest(Path::new("pkg/helpers.py"), b"def helper():\n    return 1\n");
        let report = adapter.ingest(Path::new("app.py"), b"import pkg.helpers\n");

        let engine = QueryEngine::new(store, bloom, dir.path(), create_parser_pool(), Duration::from_millis(500));
        let result = engine
            .query(&report.artifact_id, false, 2, &CancellationFlag::new())
            .await
            .unwrap();
        assert_eq!(result.files_parsed, 1);
        assert_eq!(result.dependencies_found, 0);
        assert!(!result.bundle.contains("helpers.py"));
    }

    #[tokio::test]
    async fn query_rejects_max_depth_above_five() {
        let dir = tempdir().unwrap();
        let (store, bloom, adapter) = setup(dir.path());
        let report = adapter.ingest(Path::new("main.py"), b"def run():\n    return 1\n");

        let engine = QueryEngine::new(store, bloom, dir.path(), create_parser_pool(), Duration::from_millis(500));
        assert!(matches!(
            engine.query(&report.artifact_id, true, 6, &CancellationFlag::new()).await,
            Err(canopy_core::CoreError::Validation(_))
        ));
        assert!(matches!(
            engine.query(&report.artifact_id, true, 0, &CancellationFlag::new()).await,
            Err(canopy_core::CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn cancelling_before_query_starts_yields_truncated_result() {
        let dir = tempdir().unwrap();
        let (store, bloom, adapter) = setup(dir.path());
        let report = adapter.ingest(Path::new("main.py"), b"def run():\n    return 1\n");

        let engine = QueryEngine::new(store, bloom, dir.path(), create_parser_pool(), Duration::from_millis(500));
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let result = engine.query(&report.artifact_id, true, 2, &cancel).await.unwrap();
        assert!(result.truncated);
    }

    #[tokio::test]
    async fn find_similar_matches_structurally_identical_artifacts() {
        let dir = tempdir().unwrap();
        let (store, bloom, adapter) = setup(dir.path());
        let a = adapter.ingest(Path::new("a.py"), b"def f():\n    return 1\n");
        adapter.ingest(Path::new("b.py"), b"def f():\n    return 1\n");

        let engine = QueryEngine::new(store, bloom, dir.path(), create_parser_pool(), Duration::from_millis(500));
        let similar = engine.find_similar(&a.artifact_id, 10).unwrap();
        assert_eq!(similar.len(), 1);
    }

    #[tokio::test]
    async fn find_similar_rejects_out_of_range_limit() {
        let dir = tempdir().unwrap();
        let (store, bloom, adapter) = setup(dir.path());
        let a = adapter.ingest(Path::new("a.py"), b"def f():\n    return 1\n");

        let engine = QueryEngine::new(store, bloom, dir.path(), create_parser_pool(), Duration::from_millis(500));
        assert!(engine.find_similar(&a.artifact_id, 0).is_err());
        assert!(engine.find_similar(&a.artifact_id, 51).is_err());
    }
}
