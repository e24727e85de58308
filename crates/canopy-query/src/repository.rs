//! `Repository` — the facade a driver opens once per project: ties
//! `GraphStore`, `BloomFilter`, `CheckerSet`, `IngestAdapter`, and
//! `QueryEngine` together behind the language-neutral Core API of spec §6
//! (`open`/`ingest`/`query`/`find_similar`/`stats`/`save`).
//!
//! Configuration is loaded once at `open` and never mutated afterward —
//! the same explicit-value-over-global-singleton shape `CheckerSet`
//! already follows (see `canopy_core::invariants`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use canopy_core::{BloomFilter, CheckerConfig, CheckerSet, CoreResult, GraphStore};
use canopy_indexer::coordinator::Coordinator;
use canopy_indexer::ingest::{IngestAdapter, Report};
use canopy_indexer::parser_pool::create_parser_pool;

use crate::cancellation::CancellationFlag;
use crate::engine::{QueryEngine, QueryResult, Stats};

const BLOOM_SNAPSHOT_FILE: &str = "bloom.snap";

/// Bloom filter sizing, read from `canopy.toml`'s `[bloom]` table.
#[derive(Debug, Clone, Copy)]
pub struct BloomConfig {
    pub expected_items: u64,
    pub false_positive_rate: f64,
}

impl Default for BloomConfig {
    fn default() -> Self {
        BloomConfig {
            expected_items: 1_000_000,
            false_positive_rate: 0.001,
        }
    }
}

/// Query Engine tuning, read from `canopy.toml`'s `[query]` table.
#[derive(Debug, Clone, Copy)]
pub struct QueryConfig {
    pub default_max_depth: usize,
    pub soft_deadline_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            default_max_depth: 3,
            soft_deadline_ms: 500,
        }
    }
}

/// The full ambient configuration a `Repository` is opened with. Mirrors
/// `canopy.toml`'s top-level table layout 1:1, so a driver's config loader
/// can deserialize straight into this shape.
#[derive(Debug, Clone, Default)]
pub struct CanopyConfig {
    pub bloom: BloomConfig,
    pub query: QueryConfig,
    /// Keyed by checker name (`"hardcoded_secret"`, `"long_function"`,
    /// `"eval_usage"`); a name absent from the map runs with
    /// `CheckerConfig::default()`.
    pub invariants: HashMap<String, CheckerConfig>,
}

pub struct Repository {
    project_root: PathBuf,
    bloom: Arc<RwLock<BloomFilter>>,
    bloom_path: PathBuf,
    ingest_adapter: Arc<IngestAdapter>,
    engine: QueryEngine,
    default_max_depth: usize,
}

impl Repository {
    /// Open (or initialize) a repository rooted at `project_root`. The
    /// graph store, Bloom snapshot, and checker set are all loaded or
    /// freshly created here; nothing about this call is lazy.
    pub fn open(project_root: impl Into<PathBuf>, config: &CanopyConfig) -> CoreResult<Self> {
        let project_root = project_root.into();
        let store = Arc::new(GraphStore::open(&project_root)?);

        let bloom_path = project_root.join(BLOOM_SNAPSHOT_FILE);
        let bloom = if bloom_path.exists() {
            BloomFilter::load(&bloom_path)?
        } else {
            BloomFilter::new(config.bloom.expected_items, config.bloom.false_positive_rate)
        };
        let bloom = Arc::new(RwLock::new(bloom));

        let checkers = Arc::new(CheckerSet::new(&config.invariants));
        let parser_pool = create_parser_pool();

        let ingest_adapter = Arc::new(IngestAdapter::new(
            store.clone(),
            bloom.clone(),
            checkers,
            project_root.clone(),
            parser_pool.clone(),
        ));
        let engine = QueryEngine::new(
            store,
            bloom.clone(),
            project_root.clone(),
            parser_pool,
            Duration::from_millis(config.query.soft_deadline_ms),
        );

        Ok(Repository {
            project_root,
            bloom,
            bloom_path,
            ingest_adapter,
            engine,
            default_max_depth: config.query.default_max_depth,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Ingest a single file's bytes. The graph and Bloom index are updated
    /// and durable before this returns; `save()` only needs calling for the
    /// Bloom snapshot, since `GraphStore` persists on every mutation.
    pub fn ingest(&self, path: &Path, bytes: &[u8]) -> Report {
        self.ingest_adapter.ingest(path, bytes)
    }

    /// A `Coordinator` sharing this repository's graph store, Bloom index,
    /// and checker set — for a full-repository walk-and-ingest pass rather
    /// than ingesting one file at a time.
    pub fn coordinator(&self) -> Coordinator {
        Coordinator::new(self.ingest_adapter.clone())
    }

    /// Query for `artifact_id`'s context bundle. `max_depth` defaults to
    /// the configured `[query].default_max_depth` when `None`; it must
    /// still fall in `1..=5` or the call is rejected with `Validation`.
    /// `include_deps=false` skips dependency traversal entirely.
    pub async fn query(
        &self,
        artifact_id: &str,
        include_deps: bool,
        max_depth: Option<usize>,
        cancel: &CancellationFlag,
    ) -> CoreResult<QueryResult> {
        let depth = max_depth.unwrap_or(self.default_max_depth);
        self.engine.query(artifact_id, include_deps, depth, cancel).await
    }

    pub fn find_similar(&self, artifact_id: &str, limit: usize) -> CoreResult<Vec<String>> {
        self.engine.find_similar(artifact_id, limit)
    }

    pub fn stats(&self) -> Stats {
        self.engine.stats()
    }

    /// Persist the Bloom snapshot. The graph store needs no equivalent call
    /// — it snapshots itself on every mutating operation.
    pub fn save(&self) -> CoreResult<()> {
        let bloom = self.bloom.read().expect("bloom lock poisoned");
        bloom.save(&self.bloom_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_on_fresh_directory_starts_empty() {
        let dir = tempdir().unwrap();
        let repo = Repository::open(dir.path(), &CanopyConfig::default()).unwrap();
        let stats = repo.stats();
        assert_eq!(stats.node_count, 0);
    }

    #[test]
    fn ingest_then_reopen_preserves_bloom_membership() {
        let dir = tempdir().unwrap();
        {
            let repo = Repository::open(dir.path(), &CanopyConfig::default()).unwrap();
            let report = repo.ingest(Path::new("a.py"), b"def f():\n    return 1\n");
            repo.save().unwrap();
            assert!(repo.find_similar(&report.artifact_id, 1).unwrap().is_empty());
        }
        let reopened = Repository::open(dir.path(), &CanopyConfig::default()).unwrap();
        assert_eq!(reopened.stats().node_count, 1);
    }

    #[tokio::test]
    async fn query_round_trips_through_the_facade() {
        let dir = tempdir().unwrap();
        let repo = Repository::open(dir.path(), &CanopyConfig::default()).unwrap();
        std::fs::write(dir.path().join("a.py"), b"def f():\n    return 1\n").unwrap();
        let report = repo.ingest(Path::new("a.py"), b"def f():\n    return 1\n");

        let result = repo.query(&report.artifact_id, true, None, &CancellationFlag::new()).await.unwrap();
        assert!(result.bloom_hit);
        assert!(result.bundle.contains("a.py"));
    }

    #[tokio::test]
    async fn query_rejects_out_of_range_depth_through_the_facade() {
        let dir = tempdir().unwrap();
        let repo = Repository::open(dir.path(), &CanopyConfig::default()).unwrap();
        let report = repo.ingest(Path::new("a.py"), b"def f():\n    return 1\n");

        assert!(repo.query(&report.artifact_id, true, Some(6), &CancellationFlag::new()).await.is_err());
    }
}
