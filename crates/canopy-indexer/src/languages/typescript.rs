//! TypeScript extractor. Tree-sitter's TypeScript grammar is a superset of
//! the JavaScript one for the node kinds this extractor cares about
//! (function/class declarations, import statements), so this reuses
//! `JavaScriptExtractor`'s walk with a different grammar and language tag.

use std::path::Path;

use anyhow::Result;
use canopy_core::AstSummary;

use crate::extractor::LanguageExtractor;
use crate::languages::javascript::JavaScriptExtractor;
use crate::parser_pool::{FileType, ParserPool};

pub struct TypeScriptExtractor {
    inner: JavaScriptExtractor,
}

impl TypeScriptExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self {
            inner: JavaScriptExtractor::for_dialect(parser_pool, FileType::TypeScript, canopy_core::Language::TypeScript),
        }
    }
}

impl LanguageExtractor for TypeScriptExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<AstSummary> {
        self.inner.extract(path, content)
    }
}
