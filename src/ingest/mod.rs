//! Ingestion pipeline
//!
//! Orchestrates parser → graph update → embedding generation, honoring the
//! incremental diff from the FileTracker:
//!
//! 1. Classify each candidate file (content hash).
//! 2. `Unchanged` → skip entirely.
//! 3. `New`/`Changed` → parse, atomically replace the file's entities in
//!    the graph, re-embed the replacement set, re-track.
//! 4. Tracked files that vanished → remove their entities, untrack.
//!
//! Files parse in parallel on the blocking pool; store mutations apply
//! sequentially as results drain. Cancellation is honored at file
//! boundaries, leaving the graph consistent.

pub mod line_parser;
pub mod parser;

pub use line_parser::LineParser;
pub use parser::{
    CallFact, FunctionFact, FunctionRef, ImportFact, ModuleFact, ParseError, ParsedFacts, Parser,
    ParserRegistry,
};

use crate::embedding::{describe_node, EmbeddingModel, EmbeddingStore};
use crate::engine::CancellationToken;
use crate::graph::{Edge, EdgeKind, EntityId, GraphStore, Node};
use crate::tracker::{FileStatus, FileTracker};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Errors that abort a whole ingestion pass
///
/// Per-file parse failures never abort the pass; they are collected into
/// the report instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid exclusion pattern: {0}")]
    Pattern(String),
}

/// Traversal and embedding bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Glob patterns excluded from traversal
    pub exclude_patterns: Vec<String>,
    /// Maximum directory recursion depth
    pub max_depth: usize,
    /// Per-file embedding call timeout, in seconds
    pub embed_timeout_secs: u64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                "**/.git/**".to_string(),
                "**/_build/**".to_string(),
                "**/deps/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
            ],
            max_depth: 32,
            embed_timeout_secs: 30,
        }
    }
}

/// One per-file failure in a pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of an ingestion pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Files parsed and (re)indexed
    pub analyzed: usize,
    /// Files skipped as unchanged
    pub skipped: usize,
    /// Tracked files found deleted and cleaned up
    pub deleted: usize,
    pub errors: Vec<FileError>,
    pub elapsed_ms: u64,
    /// True when the pass stopped early at a file boundary
    pub cancelled: bool,
}

/// Result of the per-file parallel stage
enum FileWork {
    Skipped,
    Parsed {
        old_ids: HashSet<EntityId>,
        facts: ParsedFacts,
    },
    Failed(String),
}

/// Parser → graph → embeddings orchestrator
pub struct IngestionPipeline {
    graph: Arc<GraphStore>,
    embeddings: Arc<EmbeddingStore>,
    tracker: Arc<FileTracker>,
    model: Arc<dyn EmbeddingModel>,
    parsers: Arc<ParserRegistry>,
    options: IngestOptions,
}

impl IngestionPipeline {
    pub fn new(
        graph: Arc<GraphStore>,
        embeddings: Arc<EmbeddingStore>,
        tracker: Arc<FileTracker>,
        model: Arc<dyn EmbeddingModel>,
        parsers: Arc<ParserRegistry>,
        options: IngestOptions,
    ) -> Self {
        Self {
            graph,
            embeddings,
            tracker,
            model,
            parsers,
            options,
        }
    }

    /// Ingest a file or directory tree incrementally
    pub async fn analyze_path(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, IngestError> {
        let start = Instant::now();
        let root = path.canonicalize()?;
        let mut report = IngestReport::default();

        let candidates = self.discover(&root)?;
        let candidate_set: HashSet<PathBuf> = candidates.iter().cloned().collect();

        // Parallel stage: classify + parse on the blocking pool
        let mut work: JoinSet<(PathBuf, FileWork)> = JoinSet::new();
        for file in candidates {
            if cancel.is_cancelled() {
                break;
            }
            let tracker = self.tracker.clone();
            let parsers = self.parsers.clone();
            work.spawn_blocking(move || {
                let outcome = classify_and_parse(&tracker, &parsers, &file);
                (file, outcome)
            });
        }

        // Sequential stage: apply results in completion order
        while let Some(joined) = work.join_next().await {
            if cancel.is_cancelled() {
                report.cancelled = true;
                work.abort_all();
                break;
            }
            let Ok((file, outcome)) = joined else {
                continue; // task aborted or panicked; skip
            };
            match outcome {
                FileWork::Skipped => report.skipped += 1,
                FileWork::Failed(message) => {
                    report.errors.push(FileError {
                        path: file,
                        message,
                    });
                }
                FileWork::Parsed { old_ids, facts } => {
                    match self.apply_file(&file, old_ids, facts).await {
                        Ok(()) => report.analyzed += 1,
                        Err(message) => report.errors.push(FileError {
                            path: file,
                            message,
                        }),
                    }
                }
            }
        }

        // Deleted-file cleanup: tracked paths under this root that neither
        // exist nor appeared as candidates.
        if !report.cancelled {
            for tracked in self.tracker.tracked_paths() {
                if !tracked.starts_with(&root) || candidate_set.contains(&tracked) {
                    continue;
                }
                if tracked.exists() {
                    continue;
                }
                if let Some(record) = self.tracker.untrack(&tracked) {
                    debug!(path = %tracked.display(), entities = record.entities.len(), "removing deleted file");
                    for id in &record.entities {
                        self.graph.remove_node(id);
                        self.embeddings.delete(id);
                    }
                    report.deleted += 1;
                }
            }
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Candidate files under `root`, honoring exclusions and depth
    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>, IngestError> {
        if root.is_file() {
            return Ok(if self.parsers.handles(root) {
                vec![root.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let excludes = build_globset(&self.options.exclude_patterns)?;
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root)
            .max_depth(self.options.max_depth)
            .follow_links(false)
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if excludes.is_match(path) {
                continue;
            }
            if self.parsers.handles(path) {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Replace one file's entities and re-embed the replacement set
    async fn apply_file(
        &self,
        file: &Path,
        old_ids: HashSet<EntityId>,
        facts: ParsedFacts,
    ) -> Result<(), String> {
        let (entity_ids, nodes, edges) = self.facts_to_graph(file, &facts);

        self.graph.replace_file_entities(&old_ids, nodes.clone(), edges);
        for id in &old_ids {
            self.embeddings.delete(id);
        }

        // Only the file's own entities get vectors; synthetic externals
        // stay unembedded.
        let to_embed: Vec<&Node> = nodes
            .iter()
            .filter(|n| entity_ids.contains(&n.id))
            .collect();
        let texts: Vec<String> = to_embed.iter().map(|n| describe_node(n)).collect();

        let timeout = Duration::from_secs(self.options.embed_timeout_secs);
        match tokio::time::timeout(timeout, self.model.embed_batch(&texts)).await {
            Ok(Ok(vectors)) if vectors.len() == to_embed.len() => {
                for (node, (vector, text)) in
                    to_embed.iter().zip(vectors.into_iter().zip(texts))
                {
                    if let Err(e) = self.embeddings.put(node.id.clone(), vector, text) {
                        warn!(entity = %node.id, error = %e, "embedding rejected");
                    }
                }
            }
            Ok(Ok(_)) => {
                warn!(file = %file.display(), "embedding batch misaligned; entities left unembedded");
            }
            Ok(Err(e)) => {
                warn!(file = %file.display(), error = %e, "embedding failed; entities left unembedded");
            }
            Err(_) => {
                warn!(file = %file.display(), "embedding timed out; entities left unembedded");
            }
        }

        self.tracker
            .track(file, entity_ids)
            .map_err(|e| format!("tracking failed: {}", e))?;
        Ok(())
    }

    /// Lower parsed facts into graph nodes and edges
    ///
    /// Returns the file's own entity id set (modules + functions), the node
    /// list (own + synthetic externals), and the edge list.
    fn facts_to_graph(
        &self,
        file: &Path,
        facts: &ParsedFacts,
    ) -> (HashSet<EntityId>, Vec<Node>, Vec<Edge>) {
        let file_str = file.to_string_lossy().to_string();
        let mut entity_ids = HashSet::new();
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut synthetic: HashSet<EntityId> = HashSet::new();

        for m in &facts.modules {
            let id = EntityId::module(&m.name);
            let mut node = Node::new(id.clone())
                .with_attr("file", file_str.clone())
                .with_attr("line", m.line as i64);
            if let Some(doc) = &m.doc {
                node = node.with_attr("doc", doc.clone());
            }
            entity_ids.insert(id);
            nodes.push(node);
        }

        for f in &facts.functions {
            let id = EntityId::function(&f.module, &f.name, f.arity);
            let mut node = Node::new(id.clone())
                .with_attr("file", file_str.clone())
                .with_attr("line", f.line as i64)
                .with_attr("visibility", f.visibility.to_string());
            if let Some(doc) = &f.doc {
                node = node.with_attr("doc", doc.clone());
            }
            edges.push(Edge::new(
                EntityId::module(&f.module),
                id.clone(),
                EdgeKind::Defines,
            ));
            entity_ids.insert(id);
            nodes.push(node);
        }

        for call in &facts.calls {
            let from = EntityId::function(&call.from.module, &call.from.name, call.from.arity);
            let to = EntityId::function(&call.to.module, &call.to.name, call.to.arity);
            // Unresolved callee: synthesize an external placeholder so
            // degree and path queries can still see the edge.
            if !entity_ids.contains(&to) && !self.graph.contains(&to) && synthetic.insert(to.clone())
            {
                nodes.push(Node::new(to.clone()).with_attr("external", true));
            }
            edges.push(Edge::new(from, to, EdgeKind::Calls).with_attr("line", call.line as i64));
        }

        for import in &facts.imports {
            let from = EntityId::module(&import.from_module);
            let to = EntityId::module(&import.to_module);
            if !entity_ids.contains(&to) && !self.graph.contains(&to) && synthetic.insert(to.clone())
            {
                nodes.push(Node::new(to.clone()).with_attr("external", true));
            }
            edges.push(Edge::new(from, to, EdgeKind::Imports));
        }

        (entity_ids, nodes, edges)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IngestError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| IngestError::Pattern(format!("{}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| IngestError::Pattern(e.to_string()))
}

/// Blocking-pool stage: classify a file and parse it when needed
fn classify_and_parse(
    tracker: &FileTracker,
    parsers: &ParserRegistry,
    file: &Path,
) -> FileWork {
    let status = match tracker.classify(file) {
        Ok(status) => status,
        Err(e) => return FileWork::Failed(format!("classify failed: {}", e)),
    };

    let old_ids = match status {
        FileStatus::Unchanged(_) => return FileWork::Skipped,
        FileStatus::Deleted(_) => return FileWork::Skipped, // handled by the cleanup pass
        FileStatus::New => HashSet::new(),
        FileStatus::Changed(record) => record.entities,
    };

    let Some(parser) = parsers.for_path(file) else {
        return FileWork::Failed("no parser for extension".to_string());
    };
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => return FileWork::Failed(format!("read failed: {}", e)),
    };
    match parser.parse(&source, file) {
        Ok(facts) => FileWork::Parsed { old_ids, facts },
        Err(e) => FileWork::Failed(e.to_string()),
    }
}
