//! A small hand-written parser for the bounded Cypher-like pattern the Query
//! Engine issues against the graph store (spec §4.C):
//!
//! ```text
//! MATCH (a)-[:KIND*lo..hi]->(b) WHERE a.id = $id RETURN b.id LIMIT n
//! ```
//!
//! This is not a general Cypher implementation — it recognizes exactly the
//! single-hop and bounded-variable-length forms the Query Engine needs, and
//! `execute` enforces `MAX_TRAVERSAL_DEPTH`/`MAX_TRAVERSAL_ROWS` (via
//! `Graph::traverse`) regardless of what `hi`/`n` the query text asks for. A
//! caller that wants anything richer than this should walk the graph
//! directly through `Graph`'s API instead.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::graph::Graph;
use crate::model::{EdgeKind, NodeId};

/// A parsed traversal query: start from the bound node, follow edges of
/// `edge_kind` between `min_hops` and `max_hops` times, return target ids
/// capped at `limit`.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalQuery {
    pub start_id: String,
    pub edge_kind: EdgeKind,
    pub min_hops: usize,
    pub max_hops: usize,
    pub limit: usize,
}

/// Parse a query of the fixed shape described above. Whitespace between
/// tokens is flexible; everything else is positional.
pub fn parse(query: &str) -> CoreResult<TraversalQuery> {
    let query = query.trim();
    let rest = strip_prefix_ci(query, "MATCH")
        .ok_or_else(|| CoreError::Validation("query must start with MATCH".into()))?;

    let open = rest.find("(a)-[:").ok_or_else(|| {
        CoreError::Validation("expected pattern of the form (a)-[:KIND*lo..hi]->(b)".into())
    })?;
    let after_bracket = &rest[open + "(a)-[:".len()..];
    let close = after_bracket
        .find(']')
        .ok_or_else(|| CoreError::Validation("unterminated relationship pattern".into()))?;
    let rel_spec = &after_bracket[..close];

    let (kind_str, hop_spec) = match rel_spec.split_once('*') {
        Some((k, h)) => (k.trim(), Some(h.trim())),
        None => (rel_spec.trim(), None),
    };

    let edge_kind = parse_edge_kind(kind_str)?;

    let (min_hops, max_hops) = match hop_spec {
        None => (1, 1),
        Some(spec) => parse_hop_range(spec)?,
    };

    let after_arrow = &after_bracket[close..];
    if !after_arrow.trim_start_matches(']').starts_with("->(b)") {
        return Err(CoreError::Validation("expected ]->(b) after relationship".into()));
    }

    let where_start = find_ci(query, "WHERE")
        .ok_or_else(|| CoreError::Validation("missing WHERE a.id = $id clause".into()))?;
    let where_clause = &query[where_start..];
    let id_marker = "$";
    let id_pos = where_clause
        .find(id_marker)
        .ok_or_else(|| CoreError::Validation("WHERE clause must bind a.id = $id".into()))?;
    let after_dollar = &where_clause[id_pos + 1..];
    let id_end = after_dollar
        .find(|c: char| c.is_whitespace())
        .unwrap_or(after_dollar.len());
    let start_id = after_dollar[..id_end].trim().to_string();
    if start_id.is_empty() {
        return Err(CoreError::Validation("WHERE clause bound an empty id".into()));
    }

    let limit = match find_ci(query, "LIMIT") {
        Some(pos) => {
            let tail = query[pos + "LIMIT".len()..].trim();
            let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits
                .parse()
                .map_err(|_| CoreError::Validation("LIMIT must be a positive integer".into()))?
        }
        None => crate::graph::MAX_TRAVERSAL_ROWS,
    };

    Ok(TraversalQuery {
        start_id,
        edge_kind,
        min_hops,
        max_hops,
        limit,
    })
}

/// Run a query of the fixed shape `parse` recognizes against `graph` and
/// return the matching node ids — the `execute(query, params) -> rows` entry
/// point named in the graph store contract (spec §4.C).
///
/// `params` binds the name captured after `$` in the `WHERE` clause to an
/// actual `artifact_id` (e.g. `WHERE a.id = $id` with `params = {"id":
/// "artifact-deadbeef"}`). A query that inlines the id directly, as
/// `$artifact-deadbeef`, works the same way with an empty `params` map: the
/// captured text is looked up in `params` first and used as a literal id
/// when no binding is found.
pub fn execute(graph: &Graph, query: &str, params: &HashMap<String, String>) -> CoreResult<Vec<NodeId>> {
    let parsed = parse(query)?;
    let start_id = params.get(&parsed.start_id).unwrap_or(&parsed.start_id);
    let start = graph
        .find_artifact_by_id(start_id)
        .ok_or_else(|| CoreError::Validation(format!("no node bound to id '{start_id}'")))?;

    let mut rows = graph.traverse(start, parsed.edge_kind, parsed.max_hops);
    rows.truncate(parsed.limit);
    Ok(rows)
}

fn parse_edge_kind(s: &str) -> CoreResult<EdgeKind> {
    match s.to_ascii_uppercase().as_str() {
        "DEPENDS_ON" => Ok(EdgeKind::DependsOn),
        "EVOKES" => Ok(EdgeKind::Evokes),
        "CONSTRAINS" => Ok(EdgeKind::Constrains),
        "RELATED_TO" => Ok(EdgeKind::RelatedTo),
        other => Err(CoreError::Validation(format!("unknown edge kind: {other}"))),
    }
}

fn parse_hop_range(spec: &str) -> CoreResult<(usize, usize)> {
    match spec.split_once("..") {
        Some((lo, hi)) => {
            let lo: usize = lo
                .trim()
                .parse()
                .map_err(|_| CoreError::Validation("invalid lower hop bound".into()))?;
            let hi: usize = hi
                .trim()
                .parse()
                .map_err(|_| CoreError::Validation("invalid upper hop bound".into()))?;
            Ok((lo, hi))
        }
        None => {
            let exact: usize = spec
                .trim()
                .parse()
                .map_err(|_| CoreError::Validation("invalid hop count".into()))?;
            Ok((exact, exact))
        }
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(s[prefix.len()..].trim_start())
    } else {
        None
    }
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack_upper = haystack.to_ascii_uppercase();
    let needle_upper = needle.to_ascii_uppercase();
    haystack_upper.find(&needle_upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_hop_query() {
        let q = parse("MATCH (a)-[:DEPENDS_ON]->(b) WHERE a.id = $artifact-1 RETURN b.id LIMIT 10").unwrap();
        assert_eq!(q.start_id, "artifact-1");
        assert_eq!(q.edge_kind, EdgeKind::DependsOn);
        assert_eq!((q.min_hops, q.max_hops), (1, 1));
        assert_eq!(q.limit, 10);
    }

    #[test]
    fn parses_variable_length_query() {
        let q = parse("MATCH (a)-[:DEPENDS_ON*1..5]->(b) WHERE a.id = $x RETURN b.id LIMIT 100").unwrap();
        assert_eq!((q.min_hops, q.max_hops), (1, 5));
    }

    #[test]
    fn defaults_limit_when_absent() {
        let q = parse("MATCH (a)-[:EVOKES]->(b) WHERE a.id = $x RETURN b.id").unwrap();
        assert_eq!(q.limit, crate::graph::MAX_TRAVERSAL_ROWS);
    }

    #[test]
    fn rejects_unknown_edge_kind() {
        assert!(parse("MATCH (a)-[:FLIES_OVER]->(b) WHERE a.id = $x RETURN b.id").is_err());
    }

    #[test]
    fn rejects_missing_where_clause() {
        assert!(parse("MATCH (a)-[:DEPENDS_ON]->(b) RETURN b.id").is_err());
    }

    fn artifact(id: u64, artifact_id: &str) -> crate::model::GraphNode {
        crate::model::GraphNode::Artifact(crate::model::Artifact {
            id: NodeId(id),
            artifact_id: artifact_id.into(),
            path: std::path::PathBuf::from(format!("{artifact_id}.py")),
            content_hash: "deadbeef".into(),
            language: crate::model::Language::Python,
            ast_fingerprint: "deadbeef".into(),
            parse_success: true,
            last_modified: chrono::Utc::now(),
        })
    }

    #[test]
    fn execute_resolves_bound_parameter_and_traverses() {
        let mut graph = Graph::new();
        let a = graph.add_node(artifact(0, "artifact-a"));
        let b = graph.add_node(artifact(1, "artifact-b"));
        graph.add_edge(crate::model::GraphEdge {
            id: crate::model::EdgeId(0),
            source: a,
            target: b,
            payload: crate::model::EdgePayload::DependsOn {
                kind: crate::model::DependsOnKind::Import,
                weight: 1.0,
            },
        });

        let mut params = HashMap::new();
        params.insert("id".to_string(), "artifact-a".to_string());
        let rows = execute(
            &graph,
            "MATCH (a)-[:DEPENDS_ON]->(b) WHERE a.id = $id RETURN b.id LIMIT 10",
            &params,
        )
        .unwrap();
        assert_eq!(rows, vec![b]);
    }

    #[test]
    fn execute_treats_inline_id_as_literal_when_unbound() {
        let mut graph = Graph::new();
        let a = graph.add_node(artifact(0, "artifact-a"));
        let b = graph.add_node(artifact(1, "artifact-b"));
        graph.add_edge(crate::model::GraphEdge {
            id: crate::model::EdgeId(0),
            source: a,
            target: b,
            payload: crate::model::EdgePayload::DependsOn {
                kind: crate::model::DependsOnKind::Import,
                weight: 1.0,
            },
        });

        let rows = execute(
            &graph,
            "MATCH (a)-[:DEPENDS_ON]->(b) WHERE a.id = $artifact-a RETURN b.id",
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(rows, vec![b]);
    }

    #[test]
    fn execute_rejects_unbound_unknown_id() {
        let graph = Graph::new();
        let err = execute(
            &graph,
            "MATCH (a)-[:DEPENDS_ON]->(b) WHERE a.id = $missing RETURN b.id",
            &HashMap::new(),
        );
        assert!(err.is_err());
    }
}
