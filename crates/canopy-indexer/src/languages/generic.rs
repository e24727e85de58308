//! Generic fallback: no grammar is loaded, so no `AstSummary` detail is
//! extracted. The ingest adapter still fingerprints these files — just by
//! content hash instead of structural hash (spec §4.A fallback semantics).

use std::path::Path;

use anyhow::Result;
use canopy_core::{AstSummary, Language};

use crate::extractor::LanguageExtractor;

pub struct GenericExtractor;

impl GenericExtractor {
    pub fn new() -> Self {
        GenericExtractor
    }
}

impl Default for GenericExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageExtractor for GenericExtractor {
    fn extract(&self, _path: &Path, _content: &[u8]) -> Result<AstSummary> {
        Ok(AstSummary {
            language: Some(Language::Other),
            parse_success: false,
            error_marker: None,
            ..Default::default()
        })
    }
}
