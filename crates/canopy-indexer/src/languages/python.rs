//! Python extractor: functions, classes, imports via tree-sitter.

use std::path::{Path, PathBuf};

use anyhow::Result;
use canopy_core::{AstSummary, ClassSig, FunctionSig, Language};
use tree_sitter::Node;

use crate::extractor::LanguageExtractor;
use crate::parser_pool::{FileType, ParseRequest, ParserPool};

pub struct PythonExtractor {
    parser_pool: ParserPool,
}

impl PythonExtractor {
    pub fn new(parser_pool: ParserPool) -> Self {
        Self { parser_pool }
    }

    fn function_sig(node: Node, source: &[u8]) -> Option<FunctionSig> {
        if node.kind() != "function_definition" {
            return None;
        }
        let name = node.child_by_field_name("name")?.utf8_text(source).ok()?.to_string();
        let params = node
            .child_by_field_name("parameters")
            .map(|p| {
                let mut cursor = p.walk();
                p.children(&mut cursor)
                    .filter(|c| c.kind() == "identifier" || c.kind() == "typed_parameter" || c.kind() == "default_parameter")
                    .filter_map(|c| c.utf8_text(source).ok().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let callees = collect_callees(node, source);
        Some(FunctionSig {
            name,
            params,
            return_type: String::new(),
            callees,
        })
    }

    fn class_sig(node: Node, source: &[u8]) -> Option<ClassSig> {
        if node.kind() != "class_definition" {
            return None;
        }
        let name = node.child_by_field_name("name")?.utf8_text(source).ok()?.to_string();
        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for child in body.children(&mut cursor) {
                if child.kind() == "function_definition" {
                    if let Some(name_node) = child.child_by_field_name("name") {
                        if let Ok(name) = name_node.utf8_text(source) {
                            methods.push(name.to_string());
                        }
                    }
                }
            }
        }
        Some(ClassSig { name, methods })
    }

    fn imports(node: Node, source: &[u8]) -> Vec<String> {
        match node.kind() {
            "import_statement" => {
                let mut cursor = node.walk();
                node.children(&mut cursor)
                    .filter(|c| c.kind() == "dotted_name" || c.kind() == "aliased_import")
                    .filter_map(|c| c.utf8_text(source).ok())
                    .map(|s| s.split_whitespace().next().unwrap_or("").to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }
            "import_from_statement" => node
                .child_by_field_name("module_name")
                .and_then(|m| m.utf8_text(source).ok())
                .map(|s| vec![s.to_string()])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

fn collect_callees(node: Node, source: &[u8]) -> Vec<String> {
    let mut callees = Vec::new();
    walk(node, &mut |n| {
        if n.kind() == "call" {
            if let Some(func) = n.child_by_field_name("function") {
                if let Ok(text) = func.utf8_text(source) {
                    callees.push(text.to_string());
                }
            }
        }
    });
    callees
}

fn walk<'a>(node: Node<'a>, f: &mut impl FnMut(Node<'a>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, f);
    }
}

impl LanguageExtractor for PythonExtractor {
    fn extract(&self, path: &Path, content: &[u8]) -> Result<AstSummary> {
        let source_code = std::str::from_utf8(content)?;
        let request = ParseRequest {
            file_type: FileType::Python,
            content: source_code.to_string(),
            path: PathBuf::from(path),
        };
        let parse_result = self.parser_pool.parse_blocking(request)?;

        let Some(tree) = parse_result.tree else {
            return Ok(AstSummary {
                language: Some(Language::Python),
                parse_success: false,
                error_marker: Some("tree-sitter produced no tree".to_string()),
                ..Default::default()
            });
        };

        let mut functions = Vec::new();
        let mut classes = Vec::new();
        let mut imports = Vec::new();

        walk(tree.root_node(), &mut |node| {
            if let Some(f) = Self::function_sig(node, content) {
                functions.push(f);
            }
            if let Some(c) = Self::class_sig(node, content) {
                classes.push(c);
            }
            imports.extend(Self::imports(node, content));
        });

        Ok(AstSummary {
            language: Some(Language::Python),
            imports,
            exports: Vec::new(),
            functions,
            classes,
            parse_success: true,
            error_marker: None,
        })
    }
}
