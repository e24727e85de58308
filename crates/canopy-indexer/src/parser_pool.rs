//! Thread-safe parser pool for tree-sitter parsers.
//!
//! Tree-sitter parsers are not `Send`/`Sync`, so this uses a channel-based
//! approach with dedicated parser threads, exactly as the prior revision of
//! this workspace did: each worker thread owns its own `Parser` and receives
//! work over an `mpsc` channel, so the pool itself is freely `Clone`/`Send`
//! even though no individual parser ever crosses a thread boundary.

use std::path::PathBuf;

use anyhow::Result;
use tree_sitter::{Language as TsLanguage, Parser};

use canopy_core::Language;

/// The fixed set of languages the indexer is tested against (spec §1/§4.A).
/// Anything else falls back to `Generic`, which still fingerprints the file
/// (opaquely, via tree-sitter's best-effort parse) but extracts no
/// `AstSummary` detail from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Generic,
}

impl FileType {
    pub fn from_path(path: &PathBuf) -> Self {
        match Language::from_path(path) {
            Language::Python => FileType::Python,
            Language::JavaScript => FileType::JavaScript,
            Language::TypeScript => FileType::TypeScript,
            Language::Go => FileType::Go,
            Language::Other => FileType::Generic,
        }
    }

    /// The tree-sitter grammar for this file type, or `None` for `Generic`
    /// (no grammar is loaded; the caller should skip structural parsing and
    /// fall back to a content fingerprint).
    pub fn get_language(&self) -> Option<TsLanguage> {
        match self {
            FileType::Python => Some(tree_sitter_python::LANGUAGE.into()),
            FileType::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            FileType::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            FileType::Go => Some(tree_sitter_go::LANGUAGE.into()),
            FileType::Generic => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            FileType::Python => "python",
            FileType::JavaScript => "javascript",
            FileType::TypeScript => "typescript",
            FileType::Go => "go",
            FileType::Generic => "generic",
        }
    }
}

/// A parsing request sent to the parser pool.
#[derive(Debug)]
pub struct ParseRequest {
    pub file_type: FileType,
    pub content: String,
    pub path: PathBuf,
}

/// Result of a parsing operation. `tree` is `None` for `Generic` files or
/// when tree-sitter could not produce a tree at all — the caller is
/// expected to fall back to `fingerprint::content_fingerprint` in that case
/// (spec §3 invariant 2, §4.A fallback semantics).
#[derive(Debug)]
pub struct ParseResult {
    pub tree: Option<tree_sitter::Tree>,
    pub path: PathBuf,
    pub content: String,
}

#[derive(Debug)]
struct WorkerRequest {
    request: ParseRequest,
    response_sender: std::sync::mpsc::Sender<Result<ParseResult>>,
}

/// Thread-safe parser pool.
pub struct ParserPool {
    sender: std::sync::mpsc::Sender<WorkerRequest>,
}

impl ParserPool {
    pub fn new(num_workers: usize) -> Self {
        let (sender, receiver) = std::sync::mpsc::channel::<WorkerRequest>();
        let receiver = std::sync::Arc::new(std::sync::Mutex::new(receiver));

        for i in 0..num_workers {
            let receiver = receiver.clone();
            std::thread::spawn(move || {
                Self::worker_thread(i, receiver);
            });
        }

        Self { sender }
    }

    fn worker_thread(
        worker_id: usize,
        receiver: std::sync::Arc<std::sync::Mutex<std::sync::mpsc::Receiver<WorkerRequest>>>,
    ) {
        tracing::debug!(worker_id, "parser worker started");

        let mut parser = Parser::new();

        loop {
            let request = match receiver.lock().unwrap().recv() {
                Ok(req) => req,
                Err(_) => {
                    tracing::debug!(worker_id, "parser worker shutting down");
                    break;
                }
            };

            let WorkerRequest {
                request,
                response_sender,
            } = request;

            let result = match request.file_type.get_language() {
                None => Ok(ParseResult {
                    tree: None,
                    path: request.path,
                    content: request.content,
                }),
                Some(language) => {
                    if let Err(e) = parser.set_language(&language) {
                        Err(anyhow::anyhow!("failed to set language: {e}"))
                    } else {
                        match parser.parse(&request.content, None) {
                            Some(tree) => Ok(ParseResult {
                                tree: Some(tree),
                                path: request.path,
                                content: request.content,
                            }),
                            None => Ok(ParseResult {
                                tree: None,
                                path: request.path,
                                content: request.content,
                            }),
                        }
                    }
                }
            };

            if response_sender.send(result).is_err() {
                tracing::warn!("failed to send parse result back to caller");
            }
        }
    }

    /// Blocking parse, for callers already off the async runtime.
    pub fn parse_blocking(&self, request: ParseRequest) -> Result<ParseResult> {
        let (response_sender, response_receiver) = std::sync::mpsc::channel();
        let worker_request = WorkerRequest {
            request,
            response_sender,
        };
        self.sender
            .send(worker_request)
            .map_err(|_| anyhow::anyhow!("parser pool is shut down"))?;
        response_receiver
            .recv()
            .map_err(|_| anyhow::anyhow!("parser worker died"))?
    }

    /// Async parse. Runs the blocking channel round-trip inside
    /// `spawn_blocking` so the suspension point is explicit and never blocks
    /// the async executor (spec §5).
    pub async fn parse(&self, request: ParseRequest) -> Result<ParseResult> {
        let sender = self.sender.clone();
        tokio::task::spawn_blocking(move || {
            let (response_sender, response_receiver) = std::sync::mpsc::channel();
            let worker_request = WorkerRequest {
                request,
                response_sender,
            };
            sender
                .send(worker_request)
                .map_err(|_| anyhow::anyhow!("parser pool is shut down"))?;
            response_receiver
                .recv()
                .map_err(|_| anyhow::anyhow!("parser worker died"))?
        })
        .await
        .map_err(|e| anyhow::anyhow!("task join error: {e}"))?
    }
}

impl Clone for ParserPool {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Convenience constructor sized to the machine's core count.
pub fn create_parser_pool() -> ParserPool {
    let num_workers = std::thread::available_parallelism()
        .map(|n| n.get().max(2))
        .unwrap_or(2);
    ParserPool::new(num_workers)
}

/// Adapts a tree-sitter node to the fingerprinter's `AstNode` trait, so
/// `canopy_core::fingerprint` never needs to depend on tree-sitter itself
/// (the external parser collaborator is specified only by the interface
/// the core consumes from it).
#[derive(Clone)]
pub struct FingerprintNode<'tree> {
    node: tree_sitter::Node<'tree>,
}

impl<'tree> FingerprintNode<'tree> {
    pub fn new(node: tree_sitter::Node<'tree>) -> Self {
        FingerprintNode { node }
    }
}

impl<'tree> canopy_core::AstNode for FingerprintNode<'tree> {
    fn kind(&self) -> &str {
        self.node.kind()
    }

    fn named_children(&self) -> Vec<Self> {
        let mut cursor = self.node.walk();
        self.node
            .children(&mut cursor)
            .filter(|c| c.is_named())
            .map(FingerprintNode::new)
            .collect()
    }
}
