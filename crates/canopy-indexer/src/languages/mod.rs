//! Language extractors for the fixed set of grammars the indexer is tested
//! against: Python, JavaScript, TypeScript, Go. Anything else gets the
//! generic fallback.

pub mod generic;
pub mod go;
pub mod javascript;
pub mod python;
pub mod typescript;

use std::path::Path;

use crate::extractor::LanguageExtractor;
use crate::parser_pool::{FileType, ParserPool};
use generic::GenericExtractor;
use go::GoExtractor;
use javascript::JavaScriptExtractor;
use python::PythonExtractor;
use typescript::TypeScriptExtractor;

/// Pick the extractor for a path's detected file type.
pub fn get_extractor(path: &Path, parser_pool: ParserPool) -> Box<dyn LanguageExtractor> {
    match FileType::from_path(&path.to_path_buf()) {
        FileType::Python => Box::new(PythonExtractor::new(parser_pool)),
        FileType::JavaScript => Box::new(JavaScriptExtractor::new(parser_pool)),
        FileType::TypeScript => Box::new(TypeScriptExtractor::new(parser_pool)),
        FileType::Go => Box::new(GoExtractor::new(parser_pool)),
        FileType::Generic => Box::new(GenericExtractor::new()),
    }
}
