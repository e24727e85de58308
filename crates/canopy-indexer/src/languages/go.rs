//! Go extractor: functions, imports via tree-sitter. Go has no user-defined
//! classes; `AstSummary::classes` stays empty and methods attached to a
//! receiver type are reported as plain functions, matching the data model's
//! treatment of Go (spec §3: `Concept`/`Invariant` are language-agnostic,
//! the AST summary only needs to be faithful to what the grammar reports).

use std::path::{Path, PathBuf};

use anyhow::Result;
use canopy_core::{AstSummary, FunctionSig, Language};
use tree_sitter::Node;

use crate::extractor::LanguageExtractor;
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct GoExtractor {
    parser_pool: ParserPool,
}

impl GoExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool }
    }

    fn function_sig(node: Node, source: &[u8]) -> Option<FunctionSig> {
        if node.kind() != "function_declaration" && node.kind() != "method_declaration" {
            return None;
        }
        let name = node.child_by_field_name("name")?.utf8_text(source).ok()?.to_string();
        let params = node
            .child_by_field_name("parameters")
            .map(|p| {
                let mut cursor = p.walk();
                p.children(&mut cursor)
                    .filter(|c| c.kind() == "parameter_declaration")
                    .filter_map(|c| c.utf8_text(source).ok().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Some(FunctionSig {
            name,
            params,
            return_type: String::new(),
            callees: Vec::new(),
        })
    }

    fn import_paths(node: Node, source: &[u8]) -> Vec<String> {
        if node.kind() != "import_spec" {
            return Vec::new();
        }
        node.child_by_field_name("path")
            .and_then(|p| p.utf8_text(source).ok())
            .map(|s| vec![s.trim_matches('"').to_string()])
            .unwrap_or_default()
    }
}

fn walk<'a>(node: Node<'a>, f: &mut impl FnMut(Node<'a>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, f);
    }
}

impl LanguageExtractor for GoExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<AstSummary> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: FileType::Go,
            content: source_code.to_string(),
            path: PathBuf::from(path),
        };
        let parse_result = self.parser_pool.parse_blocking(request)?;

        let Some(tree) = parse_result.tree else {
            return Ok(AstSummary {
                language: Some(Language::Go),
                parse_success: false,
                error_marker: Some("tree-sitter produced no tree".to_string()),
                ..Default::default()
            });
        };

        let mut functions = Vec::new();
        let mut imports = Vec::new();

        walk(tree.root_node(), &mut |node| {
            if let Some(f) = Self::function_sig(node, content) {
                functions.push(f);
            }
            imports.extend(Self::import_paths(node, content));
        });

        Ok(AstSummary {
            language: Some(Language::Go),
            imports,
            exports: Vec::new(),
            functions,
            classes: Vec::new(),
            parse_success: true,
            error_marker: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser_pool::create_parser_pool;

    #[test]
    fn extracts_functions_and_imports() {
        let extractor = GoExtractor::new(create_parser_pool());
        let code = b"package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n";
        let summary = extractor.extract(Path::new("main.go"), code).unwrap();
        assert!(summary.parse_success);
        assert!(summary.functions.iter().any(|f| f.name == "main"));
        assert!(summary.imports.contains(&"fmt".to_string()));
    }
}
