//! RagexEngine: the process-wide facade
//!
//! Owns the three stores (graph, embeddings, tracker), the collaborator
//! registries, persistence, and the editing/refactoring front ends.
//! Initialized at startup (optionally hydrating from the project cache)
//! and serialized on graceful shutdown.

use crate::config::RagexConfig;
use crate::edit::{BackupVault, Editor, FormatterRegistry, ValidatorRegistry};
use crate::embedding::{EmbeddingModel, EmbeddingStore, HashingModel};
use crate::graph::{GraphStore, NodeKind};
use crate::ingest::{IngestError, IngestReport, IngestionPipeline, ParserRegistry};
use crate::persist::{CacheError, LoadOutcome, Persistence};
use crate::refactor::{AstEditorRegistry, Refactorer, UndoLog};
use crate::search::{
    hybrid_search, vector_search, FusedResult, HybridQuery, HybridStrategy, SearchResult,
    VectorQuery,
};
use crate::tracker::FileTracker;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// A cooperative cancellation token
///
/// The caller sets the token; long-running operations check it at file
/// boundaries. Work already applied stays applied.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// External collaborators an engine is assembled from
pub struct Collaborators {
    pub model: Arc<dyn EmbeddingModel>,
    pub parsers: ParserRegistry,
    pub validators: ValidatorRegistry,
    pub formatters: FormatterRegistry,
    pub ast_editors: AstEditorRegistry,
    /// Override for the backup vault root (default `<home>/.ragex/backups`)
    pub backup_root: Option<PathBuf>,
    /// Override for the undo log root (default `<home>/.ragex/undo`)
    pub undo_root: Option<PathBuf>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            model: Arc::new(HashingModel::default()),
            parsers: ParserRegistry::new(),
            validators: ValidatorRegistry::new(),
            formatters: FormatterRegistry::new(),
            ast_editors: AstEditorRegistry::with_token_fallback(),
            backup_root: None,
            undo_root: None,
        }
    }
}

/// Process-wide code-intelligence engine for one project
pub struct RagexEngine {
    config: RagexConfig,
    project_root: PathBuf,
    graph: Arc<GraphStore>,
    embeddings: Arc<EmbeddingStore>,
    tracker: Arc<FileTracker>,
    model: Arc<dyn EmbeddingModel>,
    pipeline: IngestionPipeline,
    persistence: Persistence,
    editor: Arc<Editor>,
    refactorer: Refactorer,
}

impl RagexEngine {
    /// Assemble an engine for a project root
    pub fn new(project_root: impl Into<PathBuf>, config: RagexConfig) -> Self {
        Self::with_collaborators(project_root, config, Collaborators::default())
    }

    /// Assemble an engine with explicit collaborators
    pub fn with_collaborators(
        project_root: impl Into<PathBuf>,
        config: RagexConfig,
        collaborators: Collaborators,
    ) -> Self {
        let project_root = project_root.into();
        let graph = Arc::new(GraphStore::new());
        let embeddings = Arc::new(EmbeddingStore::new());
        let tracker = Arc::new(FileTracker::new());
        let model = collaborators.model;

        let pipeline = IngestionPipeline::new(
            graph.clone(),
            embeddings.clone(),
            tracker.clone(),
            model.clone(),
            Arc::new(collaborators.parsers),
            config.ingest_options(),
        );
        let persistence = Persistence::new(config.effective_cache_dir(), &project_root);

        let backup_root = collaborators
            .backup_root
            .unwrap_or_else(BackupVault::default_root);
        let undo_root = collaborators.undo_root.unwrap_or_else(UndoLog::default_root);
        let editor = Arc::new(Editor::new(
            Arc::new(BackupVault::new(backup_root)),
            Arc::new(collaborators.validators),
            Arc::new(collaborators.formatters),
            config.max_backups_per_file,
        ));
        let undo = Arc::new(UndoLog::new(undo_root, &project_root));
        let refactorer = Refactorer::new(
            graph.clone(),
            editor.clone(),
            Arc::new(collaborators.ast_editors),
            undo,
            config.edit_options(),
        );

        Self {
            config,
            project_root,
            graph,
            embeddings,
            tracker,
            model,
            pipeline,
            persistence,
            editor,
            refactorer,
        }
    }

    // === Accessors ===

    pub fn config(&self) -> &RagexConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingStore> {
        &self.embeddings
    }

    pub fn tracker(&self) -> &Arc<FileTracker> {
        &self.tracker
    }

    pub fn model(&self) -> &Arc<dyn EmbeddingModel> {
        &self.model
    }

    pub fn editor(&self) -> &Arc<Editor> {
        &self.editor
    }

    pub fn refactorer(&self) -> &Refactorer {
        &self.refactorer
    }

    pub fn undo_log(&self) -> &Arc<UndoLog> {
        self.refactorer.undo_log()
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    // === Lifecycle ===

    /// Hydrate stores from the project cache, dimension-gated
    pub fn load_cache(&self) -> LoadOutcome {
        let outcome = self.persistence.load(
            &self.graph,
            &self.embeddings,
            &self.tracker,
            &self.model.info(),
        );
        match &outcome {
            LoadOutcome::Loaded { entity_count } => {
                info!(entities = entity_count, "cache loaded");
            }
            LoadOutcome::Incompatible { stored_model, .. } => {
                info!(stored = %stored_model.id, "cache incompatible with current model; starting empty");
            }
            LoadOutcome::NotFound => info!("no cache for project"),
            LoadOutcome::Corrupt { .. } => {}
        }
        outcome
    }

    /// Serialize all stores to the project cache
    pub fn save_cache(&self) -> Result<(), CacheError> {
        self.persistence.save(
            &self.graph,
            &self.embeddings,
            &self.tracker,
            &self.model.info(),
        )
    }

    /// Graceful shutdown: persist, then drop
    pub fn shutdown(&self) -> Result<(), CacheError> {
        self.save_cache()
    }

    // === Operations ===

    /// Incrementally ingest a file or directory
    pub async fn analyze(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, IngestError> {
        self.pipeline.analyze_path(path, cancel).await
    }

    /// Embed free text with the active model
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, crate::embedding::EmbeddingError> {
        self.model.embed(text).await
    }

    /// Semantic search: embed the query text, scan the embedding store
    pub async fn semantic_search(
        &self,
        query: &str,
        kind: Option<NodeKind>,
        threshold: Option<f32>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>, crate::embedding::EmbeddingError> {
        let vector = self.model.embed(query).await?;
        Ok(vector_search(
            &self.embeddings,
            &VectorQuery {
                vector,
                kind,
                threshold: threshold.unwrap_or(self.config.vector_search.threshold),
                limit: limit.unwrap_or(self.config.vector_search.limit),
            },
        ))
    }

    /// Hybrid search: embed the query text, combine with graph signals
    pub async fn hybrid(
        &self,
        query: &str,
        strategy: HybridStrategy,
        module: Option<String>,
        kind: Option<NodeKind>,
        limit: Option<usize>,
    ) -> Result<Vec<FusedResult>, crate::embedding::EmbeddingError> {
        let vector = self.model.embed(query).await?;
        Ok(hybrid_search(
            &self.graph,
            &self.embeddings,
            &HybridQuery {
                strategy,
                vector,
                module,
                kind,
                threshold: self.config.vector_search.threshold,
                limit: limit.unwrap_or(self.config.vector_search.limit),
            },
        ))
    }
}
