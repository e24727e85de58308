//! JavaScript extractor: functions, classes, imports via tree-sitter.

use std::path::{Path, PathBuf};

use anyhow::Result;
use canopy_core::{AstSummary, ClassSig, FunctionSig, Language};
use tree_sitter::Node;

use crate::extractor::LanguageExtractor;
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct JavaScriptExtractor {
    parser_pool: ParserPool,
    file_type: FileType,
    language: Language,
}

impl JavaScriptExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self::for_dialect(parser_pool, FileType::JavaScript, Language::JavaScript)
    }

    /// Construct for a related grammar (TypeScript) that shares the same
    /// node-kind vocabulary for the constructs this extractor looks at.
    pub fn for_dialect(parser_pool: ParserPool, file_type: FileType, language: Language) -> Self {
        Self {
            parser_pool,
            file_type,
            language,
        }
    }

    fn function_name(node: Node, source: &[u8]) -> Option<String> {
        node.child_by_field_name("name")
            .and_then(|n| n.utf8_text(source).ok())
            .map(str::to_string)
    }

    fn params(node: Node, source: &[u8]) -> Vec<String> {
        node.child_by_field_name("parameters")
            .map(|p| {
                let mut cursor = p.walk();
                p.children(&mut cursor)
                    .filter(|c| c.is_named())
                    .filter_map(|c| c.utf8_text(source).ok().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_function_like(kind: &str) -> bool {
        matches!(
            kind,
            "function_declaration" | "function_expression" | "arrow_function" | "method_definition"
        )
    }

    fn class_sig(node: Node, source: &[u8]) -> Option<ClassSig> {
        if node.kind() != "class_declaration" {
            return None;
        }
        let name = node.child_by_field_name("name")?.utf8_text(source).ok()?.to_string();
        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                if child.kind() == "method_definition" {
                    if let Some(name) = Self::function_name(child, source) {
                        methods.push(name);
                    }
                }
            }
        }
        Some(ClassSig { name, methods })
    }

    fn import_specifiers(node: Node, source: &[u8]) -> Vec<String> {
        if node.kind() != "import_statement" {
            return Vec::new();
        }
        node.children(&mut node.walk())
            .filter(|c| c.kind() == "string")
            .filter_map(|c| c.utf8_text(source).ok())
            .map(|s| s.trim_matches(|ch| ch == '"' || ch == '\'').to_string())
            .collect()
    }
}

fn walk<'a>(node: Node<'a>, f: &mut impl FnMut(Node<'a>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, f);
    }
}

impl LanguageExtractor for JavaScriptExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<AstSummary> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: self.file_type,
            content: source_code.to_string(),
            path: PathBuf::from(path),
        };
        let parse_result = self.parser_pool.parse_blocking(request)?;

        let Some(tree) = parse_result.tree else {
            return Ok(AstSummary {
                language: Some(self.language),
                parse_success: false,
                error_marker: Some("tree-sitter produced no tree".to_string()),
                ..Default::default()
            });
        };

        let mut functions = Vec::new();
        let mut classes = Vec::new();
        let mut imports = Vec::new();
        let mut exports = Vec::new();

        walk(tree.root_node(), &mut |node| {
            if Self::is_function_like(node.kind()) {
                if let Some(name) = Self::function_name(node, content) {
                    functions.push(FunctionSig {
                        name,
                        params: Self::params(node, content),
                        return_type: String::new(),
                        callees: Vec::new(),
                    });
                }
            }
            if let Some(c) = Self::class_sig(node, content) {
                classes.push(c);
            }
            imports.extend(Self::import_specifiers(node, content));
            if node.kind() == "export_statement" {
                if let Some(decl) = node.child_by_field_name("declaration") {
                    if let Some(name) = Self::function_name(decl, content) {
                        exports.push(name);
                    }
                }
            }
        });

        Ok(AstSummary {
            language: Some(self.language),
            imports,
            exports,
            functions,
            classes,
            parse_success: true,
            error_marker: None,
        })
    }
}
