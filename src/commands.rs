//! CLI command implementations: the thin driver that wires `Repository`
//! (ingest + query + TOON emission) to the filesystem and stdout. Out of
//! scope per the retrieval engine's own boundaries: no server, no
//! transport, no file watcher — every command here is a single batch
//! invocation that exits when it's done.

use std::path::PathBuf;

use anyhow::Result;
use canopy_query::{CancellationFlag, Repository};

use crate::config;

/// Walk the repository and ingest every file the coordinator finds.
pub async fn index(root: PathBuf) -> Result<()> {
    let cfg = config::load(&root)?;
    let repository = Repository::open(&root, &cfg)?;

    let summary = repository.coordinator().run_full_index(&root)?;
    repository.save()?;

    tracing::info!(
        files_seen = summary.files_seen,
        files_ingested = summary.files_ingested,
        files_failed_to_read = summary.files_failed_to_read,
        dependencies_written = summary.dependencies_written,
        violations_found = summary.violations_found,
        "indexing complete"
    );
    println!(
        "indexed {}/{} files ({} dependency edges, {} invariant violations)",
        summary.files_ingested, summary.files_seen, summary.dependencies_written, summary.violations_found
    );
    Ok(())
}

/// Query for a single artifact's context bundle and print the TOON text to
/// stdout. `max_depth` falls back to `[query].default_max_depth` when unset;
/// `include_deps=false` returns just the artifact's own summary.
pub async fn query(root: PathBuf, artifact_id: String, include_deps: bool, max_depth: Option<usize>) -> Result<()> {
    let cfg = config::load(&root)?;
    let repository = Repository::open(&root, &cfg)?;

    let result = repository
        .query(&artifact_id, include_deps, max_depth, &CancellationFlag::new())
        .await?;
    tracing::info!(
        bloom_hit = result.bloom_hit,
        files_parsed = result.files_parsed,
        tokens_estimated = result.tokens_estimated,
        duration_ms = result.duration_ms,
        dependencies_found = result.dependencies_found,
        truncated = result.truncated,
        "query complete"
    );
    println!("{}", result.bundle);
    Ok(())
}

/// List artifacts whose structure exactly matches `artifact_id`'s.
pub fn find_similar(root: PathBuf, artifact_id: String, limit: usize) -> Result<()> {
    let cfg = config::load(&root)?;
    let repository = Repository::open(&root, &cfg)?;

    let matches = repository.find_similar(&artifact_id, limit)?;
    if matches.is_empty() {
        println!("no structurally identical artifacts found");
    } else {
        for id in matches {
            println!("{id}");
        }
    }
    Ok(())
}

/// Print graph and Bloom index size statistics.
pub fn stats(root: PathBuf) -> Result<()> {
    let cfg = config::load(&root)?;
    let repository = Repository::open(&root, &cfg)?;

    let stats = repository.stats();
    println!("nodes:                {}", stats.node_count);
    println!("edges:                {}", stats.edge_count);
    println!("bloom estimated count: {}", stats.bloom_estimated_count);
    println!("bloom load factor:    {:.4}", stats.bloom_load_factor);
    Ok(())
}

/// Remove the persisted graph snapshot and Bloom index, leaving the
/// repository in the same state as a directory that was never indexed.
pub fn clear(root: PathBuf) -> Result<()> {
    let graph_dir = root.join("graph");
    if graph_dir.exists() {
        std::fs::remove_dir_all(&graph_dir)?;
    }
    let bloom_snapshot = root.join("bloom.snap");
    if bloom_snapshot.exists() {
        std::fs::remove_file(&bloom_snapshot)?;
    }
    tracing::info!(root = %root.display(), "cleared persisted index");
    Ok(())
}
