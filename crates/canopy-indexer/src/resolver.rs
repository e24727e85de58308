//! Import Resolver: turns the import strings an extractor reports in an
//! `AstSummary` into `Resolution::Internal(id) | External | Unresolved`,
//! grounded on `palace/ingest/resolver.py`'s `ImportPathResolver`.
//!
//! The Python original raises/returns a dataclass with an `is_external`
//! flag and an optional `artifact_id`; here that collapses into a plain
//! three-way sum type so callers match instead of checking two optional
//! fields. The per-import LRU cache there becomes a `DashMap<String, NodeId>`
//! keyed by repo-relative path, populated lazily and invalidated whenever
//! `GraphStore::delete_node` removes an artifact.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use canopy_core::{Graph, Language, NodeId};
use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Internal(NodeId),
    External,
    Unresolved,
}

fn python_stdlib() -> &'static HashSet<&'static str> {
    static STDLIB: OnceLock<HashSet<&'static str>> = OnceLock::new();
    STDLIB.get_or_init(|| {
        [
            "os", "sys", "re", "io", "json", "math", "time", "datetime", "collections", "itertools",
            "functools", "typing", "pathlib", "subprocess", "threading", "asyncio", "logging",
            "unittest", "abc", "enum", "dataclasses", "contextlib", "copy", "hashlib", "random",
            "string", "struct", "traceback", "warnings", "weakref", "argparse", "csv", "shutil",
            "socket", "sqlite3", "tempfile", "uuid", "xml", "html", "http", "urllib", "email",
            "base64", "pickle", "queue", "array", "bisect", "heapq", "operator", "platform",
        ]
        .into_iter()
        .collect()
    })
}

fn go_stdlib() -> &'static HashSet<&'static str> {
    static STDLIB: OnceLock<HashSet<&'static str>> = OnceLock::new();
    STDLIB.get_or_init(|| {
        [
            "fmt", "os", "io", "net", "net/http", "net/url", "strings", "strconv", "sync", "time",
            "context", "errors", "encoding/json", "bytes", "bufio", "path", "path/filepath", "regexp",
            "sort", "math", "log", "testing", "reflect", "runtime", "unicode", "crypto", "flag",
        ]
        .into_iter()
        .collect()
    })
}

const JS_EXTENSIONS: &[&str] = &[".js", ".jsx", ".ts", ".tsx", ".mjs", ".cjs"];
const JS_ALIAS: &str = "@/";

/// Repo-relative path → artifact node id, populated lazily and kept in
/// sync by the ingest adapter as artifacts come and go.
pub struct PathIndex {
    root: PathBuf,
    by_path: DashMap<PathBuf, NodeId>,
}

impl PathIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PathIndex {
            root: root.into(),
            by_path: DashMap::new(),
        }
    }

    pub fn record(&self, path: PathBuf, id: NodeId) {
        self.by_path.insert(path, id);
    }

    pub fn forget(&self, path: &Path) {
        self.by_path.remove(path);
    }

    /// Drop every entry pointing at `id` — invoked when an artifact node
    /// is removed from the graph so stale paths never resolve again.
    pub fn forget_id(&self, id: NodeId) {
        self.by_path.retain(|_, v| *v != id);
    }

    fn lookup(&self, candidate: &Path) -> Option<NodeId> {
        if let Some(id) = self.by_path.get(candidate) {
            return Some(*id);
        }
        // Probe common file-existence variants without touching the disk:
        // candidates are repo-relative strings recorded at ingest time.
        None
    }

    fn lookup_any(&self, candidates: &[PathBuf]) -> Option<NodeId> {
        candidates.iter().find_map(|c| self.lookup(c))
    }
}

/// Every path this resolver deals with — importer paths, candidates, index
/// keys, `Artifact::path` — lives in one coordinate system: repo-relative.
/// `project_root` only anchors bare (non-relative) specifiers like a JS
/// `@/` alias or a Python absolute import probed from the repository root;
/// it is never joined onto an *already* repo-relative candidate.
pub struct ImportResolver {
    project_root: PathBuf,
}

impl ImportResolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        ImportResolver {
            project_root: project_root.into(),
        }
    }

    pub fn resolve(
        &self,
        import_string: &str,
        importer_path: &Path,
        language: Language,
        index: &PathIndex,
        graph: &Graph,
    ) -> Resolution {
        match language {
            Language::Python => self.resolve_python(import_string, importer_path, index, graph),
            Language::JavaScript | Language::TypeScript => {
                self.resolve_js(import_string, importer_path, index, graph)
            }
            Language::Go => self.resolve_go(import_string, index, graph),
            Language::Other => Resolution::Unresolved,
        }
    }

    fn resolve_python(
        &self,
        import_string: &str,
        importer_path: &Path,
        index: &PathIndex,
        graph: &Graph,
    ) -> Resolution {
        let stripped = import_string.trim_start_matches('.');
        let top_level = stripped.split('.').next().unwrap_or(stripped);
        if python_stdlib().contains(top_level) {
            return Resolution::External;
        }

        let module_rel = stripped.replace('.', "/");
        let importer_dir = importer_path.parent().unwrap_or(Path::new(""));
        let candidates = [
            normalize(&importer_dir.join(format!("{module_rel}.py"))),
            normalize(&importer_dir.join(&module_rel).join("__init__.py")),
            PathBuf::from(format!("{module_rel}.py")),
            PathBuf::from(&module_rel).join("__init__.py"),
        ];

        self.lookup_or_unresolved(&candidates, index, graph)
    }

    fn resolve_js(
        &self,
        import_string: &str,
        importer_path: &Path,
        index: &PathIndex,
        graph: &Graph,
    ) -> Resolution {
        let is_relative = import_string.starts_with("./") || import_string.starts_with("../");
        let base = if is_relative {
            normalize(&importer_path.parent().unwrap_or(Path::new("")).join(import_string))
        } else if let Some(rest) = import_string.strip_prefix(JS_ALIAS) {
            PathBuf::from(rest)
        } else {
            return Resolution::External;
        };
        let _ = &self.project_root;

        let mut candidates = vec![base.clone()];
        for ext in JS_EXTENSIONS {
            candidates.push(append_ext(&base, ext));
        }
        for ext in JS_EXTENSIONS {
            candidates.push(base.join(format!("index{ext}")));
        }

        self.lookup_or_unresolved(&candidates, index, graph)
    }

    fn resolve_go(&self, import_string: &str, index: &PathIndex, graph: &Graph) -> Resolution {
        if go_stdlib().contains(import_string) {
            return Resolution::External;
        }
        let _ = &self.project_root;
        let candidate = PathBuf::from(import_string);
        self.lookup_or_unresolved(&[candidate], index, graph)
    }

    fn lookup_or_unresolved(&self, candidates: &[PathBuf], index: &PathIndex, graph: &Graph) -> Resolution {
        if let Some(id) = index.lookup_any(candidates) {
            if graph.node(id).is_some() {
                return Resolution::Internal(id);
            }
            // Stale cache entry: the node behind it no longer exists.
            index.forget_id(id);
        }
        for candidate in candidates {
            if let Some(id) = graph.find_artifact_by_path(candidate) {
                index.record(candidate.clone(), id);
                return Resolution::Internal(id);
            }
        }
        Resolution::Unresolved
    }
}

fn append_ext(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(ext);
    PathBuf::from(s)
}

/// Lexically collapse `.`/`..` components without touching the filesystem
/// (candidates are repo-relative strings that may not exist on disk at
/// resolution time). `../` above the root simply has nothing left to pop.
fn normalize(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                if matches!(out.last(), Some(std::path::Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::{Artifact, GraphNode, Language as Lang};
    use chrono::Utc;

    fn artifact_node(path: &str) -> GraphNode {
        GraphNode::Artifact(Artifact {
            id: NodeId(0),
            artifact_id: "artifact-0000000000000000".to_string(),
            path: PathBuf::from(path),
            content_hash: "deadbeef".to_string(),
            language: Lang::Python,
            ast_fingerprint: "deadbeef".to_string(),
            parse_success: true,
            last_modified: Utc::now(),
        })
    }

    #[test]
    fn python_stdlib_import_is_external() {
        let resolver = ImportResolver::new("/repo");
        let index = PathIndex::new("/repo");
        let graph = Graph::new();
        let res = resolver.resolve("os", Path::new("a/b.py"), Lang::Python, &index, &graph);
        assert_eq!(res, Resolution::External);
    }

    #[test]
    fn python_internal_import_resolves_via_path_index() {
        let resolver = ImportResolver::new("/repo");
        let index = PathIndex::new("/repo");
        let mut graph = Graph::new();
        let id = graph.add_node(artifact_node("pkg/helpers.py"));

        let res = resolver.resolve("pkg.helpers", Path::new("app/main.py"), Lang::Python, &index, &graph);
        assert_eq!(res, Resolution::Internal(id));
    }

    #[test]
    fn unknown_python_module_is_unresolved() {
        let resolver = ImportResolver::new("/repo");
        let index = PathIndex::new("/repo");
        let graph = Graph::new();
        let res = resolver.resolve("some_missing_pkg", Path::new("app/main.py"), Lang::Python, &index, &graph);
        assert_eq!(res, Resolution::Unresolved);
    }

    #[test]
    fn js_relative_import_resolves_with_extension_probing() {
        let resolver = ImportResolver::new("/repo");
        let index = PathIndex::new("/repo");
        let mut graph = Graph::new();
        let id = graph.add_node(artifact_node("src/util.ts"));

        let res = resolver.resolve("./util", Path::new("src/main.ts"), Lang::TypeScript, &index, &graph);
        assert_eq!(res, Resolution::Internal(id));
    }

    #[test]
    fn js_bare_specifier_is_external() {
        let resolver = ImportResolver::new("/repo");
        let index = PathIndex::new("/repo");
        let graph = Graph::new();
        let res = resolver.resolve("react", Path::new("src/main.ts"), Lang::TypeScript, &index, &graph);
        assert_eq!(res, Resolution::External);
    }

    #[test]
    fn go_stdlib_import_is_external() {
        let resolver = ImportResolver::new("/repo");
        let index = PathIndex::new("/repo");
        let graph = Graph::new();
        let res = resolver.resolve("fmt", Path::new("main.go"), Lang::Go, &index, &graph);
        assert_eq!(res, Resolution::External);
    }

    #[test]
    fn stale_path_index_entry_falls_back_to_graph_scan() {
        let resolver = ImportResolver::new("/repo");
        let index = PathIndex::new("/repo");
        let mut graph = Graph::new();
        let id = graph.add_node(artifact_node("pkg/helpers.py"));
        index.record(PathBuf::from("pkg/helpers.py"), NodeId(999));
        graph.remove_node(NodeId(999));

        let res = resolver.resolve("pkg.helpers", Path::new("app/main.py"), Lang::Python, &index, &graph);
        assert_eq!(res, Resolution::Internal(id));
    }
}
