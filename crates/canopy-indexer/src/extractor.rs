//! Language extractor trait: the driver-side half of the parser
//! collaborator described only by interface in the core contract.

use std::path::Path;

use canopy_core::AstSummary;

/// Produces an `AstSummary` from a parsed file. Implementations are
/// per-language and live in `languages::*`; `Generic` never extracts detail
/// beyond `parse_success`.
pub trait LanguageExtractor: Send + Sync {
    fn extract(&self, path: &Path, content: &[u8]) -> anyhow::Result<AstSummary>;
}
