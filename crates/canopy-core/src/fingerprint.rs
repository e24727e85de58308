//! Structural AST fingerprinting (component A).
//!
//! Produces a 32-byte SHA-256 digest of a parse tree's shape: node kinds and
//! the multiset of child hashes, sorted at every interior node so that two
//! trees with the same shape hash identically regardless of how their
//! children were originally ordered. Whitespace, comments, and identifier
//! names never enter the hash — only `kind()` of named nodes does.
//!
//! The algorithm matches `hash_ast_structure` from the prior Python
//! implementation exactly, including sorting siblings at every interior node
//! (not just roots) and falling back to a content hash when there is no tree
//! to walk.

use sha2::{Digest, Sha256};

/// The minimal surface the fingerprinter needs from a parse tree node. The
/// concrete tree-sitter implementation lives in the indexer crate; core only
/// depends on this trait, never on tree-sitter itself.
pub trait AstNode {
    /// The grammar's node kind, e.g. `"function_definition"`.
    fn kind(&self) -> &str;
    /// Named children only — anonymous/punctuation nodes are excluded, as in
    /// the original algorithm.
    fn named_children(&self) -> Vec<Self>
    where
        Self: Sized;
}

/// Hex-encoded SHA-256 of an empty byte string; the fallback used when a
/// node is unavailable.
pub fn empty_hash() -> String {
    hex::encode(Sha256::digest(b""))
}

/// Hex-encoded SHA-256 of raw file content; the fallback used whenever a
/// parse tree cannot be produced at all.
pub fn content_fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Recursively hash a subtree's structure.
///
/// Leaf nodes (no named children) hash their kind alone. Interior nodes hash
/// `"{kind}:{sorted_child_hashes.join(\",\")}"`. Sorting the child hashes
/// before joining is what makes the result order-independent: two
/// structurally identical subtrees with differently-ordered children (e.g.
/// object literal keys, unordered declaration lists) fingerprint the same.
pub fn fingerprint_node<N: AstNode>(node: &N) -> String {
    let mut children: Vec<String> = node
        .named_children()
        .iter()
        .map(fingerprint_node)
        .collect();

    let combined = if children.is_empty() {
        node.kind().to_string()
    } else {
        children.sort();
        format!("{}:{}", node.kind(), children.join(","))
    };

    hex::encode(Sha256::digest(combined.as_bytes()))
}

/// Fingerprint a parsed file, given its root node, falling back to a content
/// hash when parsing produced nothing usable. `parse_success` in the
/// returned tuple mirrors `Artifact::parse_success` and `AstSummary`'s field
/// of the same name (spec §3 invariant 2: on parse failure the fingerprint
/// holds the content hash, not a sentinel).
pub fn fingerprint_file<N: AstNode>(root: Option<&N>, bytes: &[u8]) -> (String, bool) {
    match root {
        Some(node) => (fingerprint_node(node), true),
        None => (content_fingerprint(bytes), false),
    }
}
