//! Query Engine (component F) and TOON Emitter (component G): the
//! read-side path that fuses a Bloom probe, a bounded graph traversal, a
//! re-parse of every touched artifact, and a token-efficient textual
//! encoder into the bundle an agent receives.
//!
//! `canopy-indexer` supplies the re-parse step (the external parser
//! collaborator, §9); this crate never walks a filesystem or resolves an
//! import itself.

pub mod cancellation;
pub mod engine;
pub mod repository;
pub mod toon;

pub use cancellation::CancellationFlag;
pub use canopy_indexer::coordinator::IndexSummary;
pub use canopy_indexer::ingest::Report as IngestReport;
pub use engine::{QueryEngine, QueryResult, Stats, MAX_DEPENDENCIES_RETURNED, MAX_MAX_DEPTH, MIN_MAX_DEPTH};
pub use repository::{BloomConfig, CanopyConfig, QueryConfig, Repository};
pub use toon::emit;
