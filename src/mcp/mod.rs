//! MCP server for Ragex — exposes the knowledge graph, hybrid retrieval,
//! and the safe editor/refactor core via the Model Context Protocol.
//!
//! Every response carries `status ∈ {success, failure}`; mutating tools
//! additionally report `files_edited` and `rolled_back`. Failures use a
//! kind-tagged envelope: `{type, message, errors: [{path, reason, ...}]}`.

pub mod params;

use params::*;
use crate::edit::{EditError, EditOptions, FileEdit, Transaction, TransactionStatus};
use crate::engine::{CancellationToken, Collaborators, RagexEngine};
use crate::graph::{
    degree_centrality, find_paths, graph_report, pagerank, EdgeKind, EntityId, NodeKind,
    PathSearchParams,
};
use crate::ingest::LineParser;
use crate::persist::CacheScope;
use crate::refactor::{RefactorError, RefactorScope};
use crate::search::HybridStrategy;
use crate::RagexConfig;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ok_text(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn err_text(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(text)]))
}

/// Success envelope: `{"status": "success", ...payload}`
fn ok_json(mut payload: serde_json::Value) -> Result<CallToolResult, McpError> {
    if let Some(object) = payload.as_object_mut() {
        object.insert("status".to_string(), json!("success"));
    }
    ok_text(serde_json::to_string_pretty(&payload).unwrap())
}

/// Failure envelope with a kind tag and per-file errors
fn fail_json(
    kind: &str,
    message: String,
    errors: Vec<serde_json::Value>,
    extra: serde_json::Value,
) -> Result<CallToolResult, McpError> {
    let mut payload = json!({
        "status": "failure",
        "error": { "type": kind, "message": message, "errors": errors },
    });
    if let (Some(object), Some(extra)) = (payload.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            object.insert(k.clone(), v.clone());
        }
    }
    err_text(serde_json::to_string_pretty(&payload).unwrap())
}

fn edit_error_kind(e: &EditError) -> &'static str {
    match e {
        EditError::FileNotFound { .. } => "not_found",
        EditError::Io { .. } => "io_error",
        EditError::OutOfRange { .. } => "out_of_range",
        EditError::ValidationFailed { .. } => "validation_error",
        EditError::ConcurrentModification { .. } => "concurrent_modification",
        EditError::FileDeleted { .. } => "file_deleted",
        EditError::Backup(_) => "backup_error",
    }
}

fn edit_error_response(e: &EditError) -> Result<CallToolResult, McpError> {
    let errors = match e {
        EditError::ValidationFailed { file, issues } => issues
            .iter()
            .map(|issue| {
                json!({
                    "path": file,
                    "reason": issue.message,
                    "line": issue.line,
                    "column": issue.column,
                })
            })
            .collect(),
        _ => Vec::new(),
    };
    fail_json(
        edit_error_kind(e),
        e.to_string(),
        errors,
        json!({ "files_edited": 0, "rolled_back": false }),
    )
}

fn refactor_error_response(e: &RefactorError) -> Result<CallToolResult, McpError> {
    match e {
        RefactorError::Failed {
            operation,
            files_modified,
            rolled_back,
            errors,
        } => fail_json(
            "refactor_error",
            format!("refactor {} failed", operation),
            errors
                .iter()
                .map(|err| json!({ "path": err.path, "reason": err.reason }))
                .collect(),
            json!({ "files_edited": files_modified, "rolled_back": rolled_back }),
        ),
        RefactorError::NotFound { id } => fail_json(
            "not_found",
            e.to_string(),
            vec![json!({ "path": null, "reason": format!("missing entity {}", id) })],
            json!({ "files_edited": 0, "rolled_back": false }),
        ),
        _ => fail_json(
            "refactor_error",
            e.to_string(),
            Vec::new(),
            json!({ "files_edited": 0, "rolled_back": false }),
        ),
    }
}

fn parse_entity(id: &str) -> Result<EntityId, String> {
    id.parse::<EntityId>()
}

fn parse_kind(kind: &Option<String>) -> Result<Option<NodeKind>, String> {
    kind.as_deref().map(str::parse).transpose()
}

fn parse_scope(scope: &Option<String>) -> Result<RefactorScope, String> {
    match scope.as_deref() {
        None => Ok(RefactorScope::Project),
        Some(s) => s.parse(),
    }
}

fn bad_params(message: String) -> Result<CallToolResult, McpError> {
    fail_json("invalid_params", message, Vec::new(), json!({}))
}

// ---------------------------------------------------------------------------
// RagexMcpServer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RagexMcpServer {
    engine: Arc<RagexEngine>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl RagexMcpServer {
    pub fn new(engine: Arc<RagexEngine>) -> Self {
        Self {
            engine,
            tool_router: Self::tool_router(),
        }
    }

    // ── Ingestion tools ─────────────────────────────────────────────────

    #[tool(description = "Incrementally index a file or directory into the knowledge graph")]
    async fn analyze(
        &self,
        Parameters(p): Parameters<AnalyzeParams>,
    ) -> Result<CallToolResult, McpError> {
        let cancel = CancellationToken::new();
        match self.engine.analyze(&PathBuf::from(&p.path), &cancel).await {
            Ok(report) => ok_json(serde_json::to_value(&report).unwrap()),
            Err(e) => fail_json("ingest_error", e.to_string(), Vec::new(), json!({})),
        }
    }

    // ── Graph read tools ────────────────────────────────────────────────

    #[tool(description = "Aggregate graph statistics: counts, density, top entities")]
    fn graph_stats(&self) -> Result<CallToolResult, McpError> {
        let report = graph_report(self.engine.graph());
        ok_json(serde_json::to_value(&report).unwrap())
    }

    #[tool(description = "Look up one entity and its attributes by id")]
    fn find_entity(
        &self,
        Parameters(p): Parameters<FindEntityParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = match parse_entity(&p.id) {
            Ok(id) => id,
            Err(e) => return bad_params(e),
        };
        match self.engine.graph().find_node(&id) {
            Some(node) => ok_json(json!({
                "id": node.id.to_string(),
                "kind": node.kind().to_string(),
                "attrs": node.attrs_json(),
            })),
            None => fail_json(
                "not_found",
                format!("entity not found: {}", p.id),
                Vec::new(),
                json!({}),
            ),
        }
    }

    #[tool(description = "Functions that call the given function, with call-site lines")]
    fn callers(
        &self,
        Parameters(p): Parameters<FunctionRefParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = EntityId::function(&p.module, &p.function, p.arity);
        let edges = self.engine.graph().incoming(&id, Some(EdgeKind::Calls));
        let callers: Vec<serde_json::Value> = edges
            .iter()
            .map(|e| json!({ "id": e.from.to_string(), "line": e.line() }))
            .collect();
        ok_json(json!({ "function": id.to_string(), "count": callers.len(), "callers": callers }))
    }

    #[tool(description = "Functions the given function calls, with call-site lines")]
    fn callees(
        &self,
        Parameters(p): Parameters<FunctionRefParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = EntityId::function(&p.module, &p.function, p.arity);
        let edges = self.engine.graph().outgoing(&id, Some(EdgeKind::Calls));
        let callees: Vec<serde_json::Value> = edges
            .iter()
            .map(|e| json!({ "id": e.to.to_string(), "line": e.line() }))
            .collect();
        ok_json(json!({ "function": id.to_string(), "count": callees.len(), "callees": callees }))
    }

    #[tool(description = "All simple call paths between two functions, bounded")]
    fn find_call_paths(
        &self,
        Parameters(p): Parameters<FindPathsParams>,
    ) -> Result<CallToolResult, McpError> {
        let (from, to) = match (parse_entity(&p.from), parse_entity(&p.to)) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(e), _) | (_, Err(e)) => return bad_params(e),
        };
        let defaults = self.engine.config().path_search_params();
        let params = PathSearchParams {
            max_depth: p.max_depth.unwrap_or(defaults.max_depth),
            max_paths: p.max_paths.unwrap_or(defaults.max_paths),
        };
        let paths = find_paths(self.engine.graph(), &from, &to, params);
        let rendered: Vec<Vec<String>> = paths
            .iter()
            .map(|path| path.iter().map(|id| id.to_string()).collect())
            .collect();
        ok_json(json!({ "count": rendered.len(), "paths": rendered }))
    }

    #[tool(description = "PageRank over the call graph; most central functions first")]
    fn pagerank(
        &self,
        Parameters(p): Parameters<RankLimitParams>,
    ) -> Result<CallToolResult, McpError> {
        let params = self.engine.config().pagerank_params();
        let mut scores: Vec<(EntityId, f64)> =
            pagerank(self.engine.graph(), params).into_iter().collect();
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let ranked: Vec<serde_json::Value> = scores
            .into_iter()
            .take(p.limit.unwrap_or(10))
            .map(|(id, score)| json!({ "id": id.to_string(), "score": score }))
            .collect();
        ok_json(json!({ "ranked": ranked }))
    }

    #[tool(description = "Call-graph degree centrality; highest total degree first")]
    fn centrality(
        &self,
        Parameters(p): Parameters<RankLimitParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut degrees: Vec<(EntityId, crate::graph::Degree)> =
            degree_centrality(self.engine.graph()).into_iter().collect();
        degrees.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        let ranked: Vec<serde_json::Value> = degrees
            .into_iter()
            .take(p.limit.unwrap_or(10))
            .map(|(id, d)| {
                json!({
                    "id": id.to_string(),
                    "in_degree": d.in_degree,
                    "out_degree": d.out_degree,
                    "total": d.total,
                })
            })
            .collect();
        ok_json(json!({ "ranked": ranked }))
    }

    // ── Search tools ────────────────────────────────────────────────────

    #[tool(description = "Semantic search over entity descriptions (exact cosine)")]
    async fn semantic_search(
        &self,
        Parameters(p): Parameters<SemanticSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let kind = match parse_kind(&p.kind) {
            Ok(kind) => kind,
            Err(e) => return bad_params(e),
        };
        match self
            .engine
            .semantic_search(&p.query, kind, p.threshold, p.limit)
            .await
        {
            Ok(hits) => {
                let results: Vec<serde_json::Value> = hits
                    .iter()
                    .map(|hit| {
                        json!({
                            "id": hit.id.to_string(),
                            "score": hit.score,
                            "text": hit.text,
                        })
                    })
                    .collect();
                ok_json(json!({ "count": results.len(), "results": results }))
            }
            Err(e) => fail_json("embedding_error", e.to_string(), Vec::new(), json!({})),
        }
    }

    #[tool(description = "Hybrid retrieval fusing graph and semantic signals (RRF)")]
    async fn hybrid_search(
        &self,
        Parameters(p): Parameters<HybridSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let strategy = match p.strategy.as_deref() {
            None | Some("fusion") => HybridStrategy::Fusion,
            Some("semantic_first") => HybridStrategy::SemanticFirst,
            Some("graph_first") => HybridStrategy::GraphFirst,
            Some(other) => return bad_params(format!("unknown strategy: {}", other)),
        };
        let kind = match parse_kind(&p.kind) {
            Ok(kind) => kind,
            Err(e) => return bad_params(e),
        };
        match self
            .engine
            .hybrid(&p.query, strategy, p.module.clone(), kind, p.limit)
            .await
        {
            Ok(hits) => {
                let results: Vec<serde_json::Value> = hits
                    .iter()
                    .map(|hit| json!({ "id": hit.id.to_string(), "score": hit.score }))
                    .collect();
                ok_json(json!({ "count": results.len(), "results": results }))
            }
            Err(e) => fail_json("embedding_error", e.to_string(), Vec::new(), json!({})),
        }
    }

    // ── Edit tools ──────────────────────────────────────────────────────

    #[tool(description = "Apply line-addressed changes to one file, atomically, with backup")]
    async fn edit_file(
        &self,
        Parameters(p): Parameters<EditFileParams>,
    ) -> Result<CallToolResult, McpError> {
        let defaults = self.engine.config().edit_options();
        let opts = EditOptions {
            backup: p.backup.unwrap_or(defaults.backup),
            validate: p.validate.unwrap_or(defaults.validate),
            format: p.format.unwrap_or(defaults.format),
            compress_backups: defaults.compress_backups,
        };
        let mut changes = Vec::new();
        for change in p.changes {
            match change.into_change() {
                Ok(change) => changes.push(change),
                Err(e) => return bad_params(e),
            }
        }

        match self
            .engine
            .editor()
            .edit_file(&PathBuf::from(&p.path), &changes, &opts)
            .await
        {
            Ok(outcome) => ok_json(json!({
                "path": outcome.path,
                "backup_id": outcome.backup_id,
                "changes_applied": outcome.changes_applied,
                "lines_changed": outcome.lines_changed,
                "validation_performed": outcome.validation_performed,
                "files_edited": 1,
                "rolled_back": false,
            })),
            Err(e) => edit_error_response(&e),
        }
    }

    #[tool(description = "Restore a file from its most recent (or a specific) backup")]
    fn rollback_edit(
        &self,
        Parameters(p): Parameters<RollbackParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .engine
            .editor()
            .rollback(&PathBuf::from(&p.path), p.backup_id.as_deref())
        {
            Ok(entry) => ok_json(json!({
                "path": entry.original_path,
                "restored_from": entry.id,
                "files_edited": 1,
            })),
            Err(e) => edit_error_response(&e),
        }
    }

    #[tool(description = "Edit several files in one all-or-nothing transaction")]
    async fn multi_edit(
        &self,
        Parameters(p): Parameters<MultiEditParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut shared = self.engine.config().edit_options();
        if let Some(validate) = p.validate {
            shared.validate = validate;
        }
        let mut txn = Transaction::new(shared);
        for file in p.files {
            let mut changes = Vec::new();
            for change in file.changes {
                match change.into_change() {
                    Ok(change) => changes.push(change),
                    Err(e) => return bad_params(e),
                }
            }
            txn.add(FileEdit::new(PathBuf::from(&file.path), changes));
        }

        let report = txn.commit(self.engine.editor()).await;
        let success = report.status == TransactionStatus::Success;
        let payload = json!({
            "status": if success { "success" } else { "failure" },
            "files_edited": report.files_edited,
            "rolled_back": report.rolled_back,
            "results": serde_json::to_value(&report.results).unwrap(),
            "error": if success { json!(null) } else { json!({
                "type": "validation_error",
                "message": "transaction failed",
                "errors": report.errors.iter().map(|e| json!({
                    "path": e.path, "reason": e.reason,
                })).collect::<Vec<_>>(),
            }) },
            "rollback_failures": report.rollback_failures,
        });
        let text = serde_json::to_string_pretty(&payload).unwrap();
        if success {
            ok_text(text)
        } else {
            err_text(text)
        }
    }

    #[tool(description = "List backups recorded for a file, newest first")]
    fn list_backups(
        &self,
        Parameters(p): Parameters<ListBackupsParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .engine
            .editor()
            .vault()
            .list(&PathBuf::from(&p.path), p.limit)
        {
            Ok(entries) => ok_json(json!({
                "count": entries.len(),
                "backups": serde_json::to_value(&entries).unwrap(),
            })),
            Err(e) => fail_json("backup_error", e.to_string(), Vec::new(), json!({})),
        }
    }

    // ── Refactor tools ──────────────────────────────────────────────────

    #[tool(description = "Rename a function across definition and graph-known call sites")]
    async fn rename_function(
        &self,
        Parameters(p): Parameters<RenameFunctionParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match parse_scope(&p.scope) {
            Ok(scope) => scope,
            Err(e) => return bad_params(e),
        };
        match self
            .engine
            .refactorer()
            .rename_function(&p.module, &p.old_name, &p.new_name, p.arity, scope)
            .await
        {
            Ok(outcome) => ok_json(json!({
                "operation": outcome.operation,
                "files_edited": outcome.files_modified.len(),
                "files_modified": outcome.files_modified,
                "rolled_back": false,
                "undo_id": outcome.undo_id,
            })),
            Err(e) => refactor_error_response(&e),
        }
    }

    #[tool(description = "Rename a module across definition and graph-known importers")]
    async fn rename_module(
        &self,
        Parameters(p): Parameters<RenameModuleParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = match parse_scope(&p.scope) {
            Ok(scope) => scope,
            Err(e) => return bad_params(e),
        };
        match self
            .engine
            .refactorer()
            .rename_module(&p.old_name, &p.new_name, scope)
            .await
        {
            Ok(outcome) => ok_json(json!({
                "operation": outcome.operation,
                "files_edited": outcome.files_modified.len(),
                "files_modified": outcome.files_modified,
                "rolled_back": false,
                "undo_id": outcome.undo_id,
            })),
            Err(e) => refactor_error_response(&e),
        }
    }

    #[tool(description = "Move a function definition to another module's file")]
    async fn move_function(
        &self,
        Parameters(p): Parameters<MoveFunctionParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .engine
            .refactorer()
            .move_function(
                &p.module,
                &p.function,
                p.arity,
                &p.target_module,
                p.target_path.as_deref().map(std::path::Path::new),
            )
            .await
        {
            Ok(outcome) => ok_json(json!({
                "operation": outcome.operation,
                "files_edited": outcome.files_modified.len(),
                "files_modified": outcome.files_modified,
                "rolled_back": false,
                "undo_id": outcome.undo_id,
            })),
            Err(e) => refactor_error_response(&e),
        }
    }

    // ── Undo tools ──────────────────────────────────────────────────────

    #[tool(description = "Undo the most recent refactor by restoring its snapshots")]
    fn undo(&self) -> Result<CallToolResult, McpError> {
        match self.engine.undo_log().undo() {
            Ok(entry) => ok_json(json!({
                "undone": entry.id,
                "operation": entry.operation,
                "files_edited": entry.affected_paths.len(),
                "restored_files": entry.affected_paths,
            })),
            Err(e) => fail_json("not_found", e.to_string(), Vec::new(), json!({})),
        }
    }

    #[tool(
        description = "Parameters of the most recently undone refactor, for re-execution; does not re-apply"
    )]
    fn redo(&self) -> Result<CallToolResult, McpError> {
        match self.engine.undo_log().redo() {
            Ok(entry) => ok_json(json!({
                "entry": entry.id,
                "operation": entry.operation,
                "parameters": entry.parameters,
            })),
            Err(e) => fail_json("not_found", e.to_string(), Vec::new(), json!({})),
        }
    }

    #[tool(description = "Refactor history for this project, newest first")]
    fn undo_history(
        &self,
        Parameters(p): Parameters<UndoHistoryParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .engine
            .undo_log()
            .list(p.limit.unwrap_or(20), p.include_undone.unwrap_or(false))
        {
            Ok(entries) => {
                let summaries: Vec<serde_json::Value> = entries
                    .iter()
                    .map(|entry| {
                        json!({
                            "id": entry.id,
                            "operation": entry.operation,
                            "timestamp": entry.timestamp,
                            "parameters": entry.parameters,
                            "affected_paths": entry.affected_paths,
                            "outcome": serde_json::to_value(entry.outcome).unwrap(),
                            "undone": entry.undone,
                        })
                    })
                    .collect();
                ok_json(json!({ "count": summaries.len(), "entries": summaries }))
            }
            Err(e) => fail_json("io_error", e.to_string(), Vec::new(), json!({})),
        }
    }

    // ── Cache tools ─────────────────────────────────────────────────────

    #[tool(description = "Persist the graph, embeddings, and tracker to the project cache")]
    fn cache_save(&self) -> Result<CallToolResult, McpError> {
        match self.engine.save_cache() {
            Ok(()) => ok_json(json!({
                "path": self.engine.persistence().project_dir(),
                "entities": self.engine.graph().node_count(),
            })),
            Err(e) => fail_json("cache_error", e.to_string(), Vec::new(), json!({})),
        }
    }

    #[tool(description = "Cache sizes, counts, and model info")]
    fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        match self.engine.persistence().stats(CacheScope::All) {
            Ok(stats) => ok_json(serde_json::to_value(&stats).unwrap()),
            Err(e) => fail_json("cache_error", e.to_string(), Vec::new(), json!({})),
        }
    }

    #[tool(description = "Clear cached project data (current project by default)")]
    fn cache_clear(
        &self,
        Parameters(p): Parameters<CacheClearParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = if let Some(days) = p.older_than_days {
            CacheScope::OlderThan(Duration::from_secs(days * 24 * 3600))
        } else if p.all.unwrap_or(false) {
            CacheScope::All
        } else {
            CacheScope::Current
        };
        match self.engine.persistence().clear(scope) {
            Ok(removed) => ok_json(json!({ "removed": removed })),
            Err(e) => fail_json("cache_error", e.to_string(), Vec::new(), json!({})),
        }
    }
}

#[tool_handler]
impl ServerHandler for RagexMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Ragex MCP server — code knowledge graph, hybrid retrieval, and graph-aware safe refactoring"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Build the default engine for a project root: built-in line parser,
/// token AST fallback, and the configured embedding model.
pub fn build_engine(project_root: PathBuf, config: RagexConfig) -> RagexEngine {
    let mut collaborators = Collaborators::default();
    collaborators.parsers.register(Arc::new(LineParser));
    collaborators.model = model_from_config(&config);
    RagexEngine::with_collaborators(project_root, config, collaborators)
}

fn model_from_config(config: &RagexConfig) -> Arc<dyn crate::embedding::EmbeddingModel> {
    let id = config.embedding_model_id.as_str();

    #[cfg(feature = "embeddings")]
    if !id.starts_with("hashing-trigram") {
        match crate::embedding::FastEmbedModel::default_model() {
            Ok(model) => return Arc::new(model),
            Err(e) => {
                eprintln!("failed to load embedding model {}: {}; using hashing fallback", id, e);
            }
        }
    }

    let dims = id
        .strip_prefix("hashing-trigram-")
        .and_then(|d| d.parse().ok())
        .unwrap_or(crate::embedding::HashingModel::DEFAULT_DIMENSIONS);
    Arc::new(crate::embedding::HashingModel::new(dims))
}

pub fn run_mcp_server(project: Option<PathBuf>, config_path: Option<PathBuf>) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    rt.block_on(async {
        let project_root = match project {
            Some(path) => path,
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        let config = match RagexConfig::load(config_path.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load config: {}", e);
                return 1;
            }
        };

        let engine = Arc::new(build_engine(project_root, config));
        engine.load_cache();

        let server = RagexMcpServer::new(engine.clone());

        eprintln!("ragex mcp server starting on stdio...");

        let service = match server.serve(rmcp::transport::stdio()).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to start MCP server: {}", e);
                return 1;
            }
        };

        if let Err(e) = service.waiting().await {
            eprintln!("MCP server error: {}", e);
            return 1;
        }

        if let Err(e) = engine.shutdown() {
            eprintln!("failed to persist cache on shutdown: {}", e);
            return 1;
        }

        0
    })
}
