//! Graph-driven refactoring
//!
//! Rename and move operations whose file set comes from the knowledge
//! graph: the definition's file plus the files of incoming `calls` (for
//! functions) or `imports` (for modules) edges. Every file's transform is
//! a whole-file replacement committed through a [`Transaction`], so a
//! failure on any file rolls the whole refactor back. Successful refactors
//! append an [`UndoEntry`] with pre-edit snapshots.
//!
//! Line numbers in the graph go stale after a refactor; re-ingestion of
//! the affected files is the caller's responsibility.

pub mod ast_editor;
pub mod undo;

pub use ast_editor::{AstEditError, AstEditor, AstEditorRegistry, AstOp, TokenEditor};
pub use undo::{UndoEntry, UndoError, UndoLog, UndoOutcome};

use crate::edit::{
    Change, EditOptions, Editor, FileEdit, Transaction, TransactionError, TransactionStatus,
};
use crate::graph::{EdgeKind, EntityId, GraphStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// How far a rename reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefactorScope {
    /// Only the defining file
    Module,
    /// The defining file plus every call/import site the graph knows
    Project,
}

impl FromStr for RefactorScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "module" => Ok(RefactorScope::Module),
            "project" => Ok(RefactorScope::Project),
            _ => Err(format!("Unknown refactor scope: {}", s)),
        }
    }
}

/// Errors from refactor operations
#[derive(Debug, Error)]
pub enum RefactorError {
    #[error("entity not found in graph: {id}")]
    NotFound { id: String },

    #[error("entity has no source file recorded: {id}")]
    NoSourceFile { id: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transform failed for {file}: {source}")]
    Transform {
        file: PathBuf,
        #[source]
        source: AstEditError,
    },

    #[error("refactor {operation} failed; rolled_back={rolled_back}")]
    Failed {
        operation: String,
        files_modified: usize,
        rolled_back: bool,
        errors: Vec<TransactionError>,
    },

    #[error(transparent)]
    Undo(#[from] UndoError),
}

/// What a successful refactor did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefactorOutcome {
    pub operation: String,
    pub files_modified: Vec<PathBuf>,
    pub undo_id: String,
}

/// Rename/move engine composed over the transaction layer
pub struct Refactorer {
    graph: Arc<GraphStore>,
    editor: Arc<Editor>,
    ast_editors: Arc<AstEditorRegistry>,
    undo: Arc<UndoLog>,
    edit_opts: EditOptions,
}

impl Refactorer {
    pub fn new(
        graph: Arc<GraphStore>,
        editor: Arc<Editor>,
        ast_editors: Arc<AstEditorRegistry>,
        undo: Arc<UndoLog>,
        edit_opts: EditOptions,
    ) -> Self {
        Self {
            graph,
            editor,
            ast_editors,
            undo,
            edit_opts,
        }
    }

    pub fn undo_log(&self) -> &Arc<UndoLog> {
        &self.undo
    }

    fn read(path: &Path) -> Result<String, RefactorError> {
        std::fs::read_to_string(path).map_err(|source| RefactorError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn transform(&self, path: &Path, content: &str, op: &AstOp) -> Result<String, RefactorError> {
        let editor = self
            .ast_editors
            .for_path(path)
            .ok_or_else(|| RefactorError::Transform {
                file: path.to_path_buf(),
                source: AstEditError::Unsupported("no AST editor for path".to_string()),
            })?;
        editor.apply(content, op).map_err(|source| RefactorError::Transform {
            file: path.to_path_buf(),
            source,
        })
    }

    /// Whole-file replacement change for already-read content
    fn whole_file_change(original: &str, new_content: String) -> Change {
        let lines = original.lines().count();
        if lines == 0 {
            Change::Insert {
                before_line: 1,
                content: new_content,
            }
        } else {
            Change::Replace {
                line_start: 1,
                line_end: lines,
                content: new_content,
            }
        }
    }

    /// Commit transformed files atomically and record the undo entry
    async fn commit(
        &self,
        operation: &str,
        parameters: HashMap<String, String>,
        files: Vec<(PathBuf, String, String)>, // (path, original, transformed)
    ) -> Result<RefactorOutcome, RefactorError> {
        let mut txn = Transaction::new(self.edit_opts.clone());
        let mut snapshots: HashMap<PathBuf, String> = HashMap::new();
        for (path, original, transformed) in &files {
            snapshots.insert(path.clone(), original.clone());
            txn.add(FileEdit::new(
                path.clone(),
                vec![Self::whole_file_change(original, transformed.clone())],
            ));
        }

        let report = txn.commit(&self.editor).await;
        if report.status != TransactionStatus::Success {
            // Record the failed attempt; undo skips failure entries.
            let _ = self.undo.push(operation, parameters, snapshots, UndoOutcome::Failure);
            return Err(RefactorError::Failed {
                operation: operation.to_string(),
                files_modified: 0,
                rolled_back: report.rolled_back,
                errors: report.errors,
            });
        }

        let undo_id = self
            .undo
            .push(operation, parameters, snapshots, UndoOutcome::Success)?;
        info!(operation, files = files.len(), "refactor committed");

        Ok(RefactorOutcome {
            operation: operation.to_string(),
            files_modified: files.iter().map(|(p, _, _)| p.clone()).collect(),
            undo_id,
        })
    }

    /// Files containing the definition and (project scope) every caller
    fn function_file_set(
        &self,
        id: &EntityId,
        scope: RefactorScope,
    ) -> Result<Vec<PathBuf>, RefactorError> {
        let node = self
            .graph
            .find_node(id)
            .ok_or_else(|| RefactorError::NotFound { id: id.to_string() })?;
        let def_file = node
            .file()
            .map(PathBuf::from)
            .ok_or_else(|| RefactorError::NoSourceFile { id: id.to_string() })?;

        let mut files = vec![def_file.clone()];
        if scope == RefactorScope::Project {
            for edge in self.graph.incoming(id, Some(EdgeKind::Calls)) {
                if let Some(caller) = self.graph.find_node(&edge.from) {
                    if let Some(file) = caller.file() {
                        let file = PathBuf::from(file);
                        if !files.contains(&file) {
                            files.push(file);
                        }
                    }
                }
            }
        }
        debug!(entity = %id, files = files.len(), "refactor file set");
        Ok(files)
    }

    /// Rename a function across its definition and call sites
    pub async fn rename_function(
        &self,
        module: &str,
        old_name: &str,
        new_name: &str,
        arity: u32,
        scope: RefactorScope,
    ) -> Result<RefactorOutcome, RefactorError> {
        let id = EntityId::function(module, old_name, arity);
        let files = self.function_file_set(&id, scope)?;

        let op = AstOp::RenameFunction {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
            arity,
        };
        let mut transformed = Vec::new();
        for path in files {
            let original = Self::read(&path)?;
            let new_content = self.transform(&path, &original, &op)?;
            transformed.push((path, original, new_content));
        }

        let parameters = HashMap::from([
            ("module".to_string(), module.to_string()),
            ("old_name".to_string(), old_name.to_string()),
            ("new_name".to_string(), new_name.to_string()),
            ("arity".to_string(), arity.to_string()),
        ]);
        self.commit("rename_function", parameters, transformed).await
    }

    /// Rename a module across its definition and importer files
    pub async fn rename_module(
        &self,
        old_name: &str,
        new_name: &str,
        scope: RefactorScope,
    ) -> Result<RefactorOutcome, RefactorError> {
        let id = EntityId::module(old_name);
        let node = self
            .graph
            .find_node(&id)
            .ok_or_else(|| RefactorError::NotFound { id: id.to_string() })?;
        let def_file = node
            .file()
            .map(PathBuf::from)
            .ok_or_else(|| RefactorError::NoSourceFile { id: id.to_string() })?;

        let mut files = vec![def_file];
        if scope == RefactorScope::Project {
            for edge in self.graph.incoming(&id, Some(EdgeKind::Imports)) {
                if let Some(importer) = self.graph.find_node(&edge.from) {
                    if let Some(file) = importer.file() {
                        let file = PathBuf::from(file);
                        if !files.contains(&file) {
                            files.push(file);
                        }
                    }
                }
            }
        }

        let op = AstOp::RenameModule {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        };
        let mut transformed = Vec::new();
        for path in files {
            let original = Self::read(&path)?;
            let new_content = self.transform(&path, &original, &op)?;
            transformed.push((path, original, new_content));
        }

        let parameters = HashMap::from([
            ("old_name".to_string(), old_name.to_string()),
            ("new_name".to_string(), new_name.to_string()),
        ]);
        self.commit("rename_module", parameters, transformed).await
    }

    /// Move a function's definition from its module's file to another file
    ///
    /// The target comes from the target module's recorded file, or from
    /// `target_path` when the module is not (yet) in the graph. A target
    /// file that does not exist is created, and removed again if the
    /// transaction fails.
    pub async fn move_function(
        &self,
        module: &str,
        name: &str,
        arity: u32,
        target_module: &str,
        target_path: Option<&Path>,
    ) -> Result<RefactorOutcome, RefactorError> {
        let id = EntityId::function(module, name, arity);
        let node = self
            .graph
            .find_node(&id)
            .ok_or_else(|| RefactorError::NotFound { id: id.to_string() })?;
        let source_file = node
            .file()
            .map(PathBuf::from)
            .ok_or_else(|| RefactorError::NoSourceFile { id: id.to_string() })?;

        let target_id = EntityId::module(target_module);
        let target_file = match self.graph.find_node(&target_id).and_then(|n| n.file().map(PathBuf::from)) {
            Some(file) => file,
            None => target_path
                .map(Path::to_path_buf)
                .ok_or_else(|| RefactorError::NotFound {
                    id: target_id.to_string(),
                })?,
        };

        let source_content = Self::read(&source_file)?;
        let ast = self
            .ast_editors
            .for_path(&source_file)
            .ok_or_else(|| RefactorError::Transform {
                file: source_file.clone(),
                source: AstEditError::Unsupported("no AST editor for path".to_string()),
            })?;
        let (remaining, definition) = ast
            .extract_function(&source_content, name, arity)
            .map_err(|source| RefactorError::Transform {
                file: source_file.clone(),
                source,
            })?;

        let created_target = !target_file.exists();
        if created_target {
            if let Some(parent) = target_file.parent() {
                std::fs::create_dir_all(parent).map_err(|source| RefactorError::Io {
                    path: target_file.clone(),
                    source,
                })?;
            }
            std::fs::write(&target_file, "").map_err(|source| RefactorError::Io {
                path: target_file.clone(),
                source,
            })?;
        }
        let target_content = Self::read(&target_file)?;
        let target_new = self.transform(
            &target_file,
            &target_content,
            &AstOp::AddFunction {
                definition: definition.clone(),
            },
        )?;

        let parameters = HashMap::from([
            ("module".to_string(), module.to_string()),
            ("function".to_string(), name.to_string()),
            ("arity".to_string(), arity.to_string()),
            ("target_module".to_string(), target_module.to_string()),
        ]);
        let files = vec![
            (source_file, source_content, remaining),
            (target_file.clone(), target_content, target_new),
        ];
        let result = self.commit("move_function", parameters, files).await;

        if result.is_err() && created_target {
            let _ = std::fs::remove_file(&target_file);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{BackupVault, FormatterRegistry, ValidatorRegistry};
    use crate::graph::{Edge, Node};
    use std::fs;

    const DEF_FILE: &str = "\
defmodule MyApp.Worker do
  def foo(a, b) do
    {a, b}
  end
end
";

    const CALLER_FILE: &str = "\
defmodule MyApp.Caller do
  def run do
    MyApp.Worker.foo(1, 2)
  end
end
";

    struct Fixture {
        _dir: tempfile::TempDir,
        def_path: PathBuf,
        caller_path: PathBuf,
        graph: Arc<GraphStore>,
        refactorer: Refactorer,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let def_path = dir.path().join("worker.ex");
        let caller_path = dir.path().join("caller.ex");
        fs::write(&def_path, DEF_FILE).unwrap();
        fs::write(&caller_path, CALLER_FILE).unwrap();

        let graph = Arc::new(GraphStore::new());
        let foo = EntityId::function("MyApp.Worker", "foo", 2);
        let run = EntityId::function("MyApp.Caller", "run", 0);
        graph.add_node(
            Node::new(EntityId::module("MyApp.Worker"))
                .with_attr("file", def_path.to_string_lossy().to_string()),
        );
        graph.add_node(
            Node::new(foo.clone()).with_attr("file", def_path.to_string_lossy().to_string()),
        );
        graph.add_node(
            Node::new(run.clone()).with_attr("file", caller_path.to_string_lossy().to_string()),
        );
        graph.add_edge(Edge::new(run, foo, EdgeKind::Calls).with_attr("line", 3i64));

        let editor = Arc::new(Editor::new(
            Arc::new(BackupVault::new(dir.path().join("backups"))),
            Arc::new(ValidatorRegistry::new()),
            Arc::new(FormatterRegistry::new()),
            10,
        ));
        let refactorer = Refactorer::new(
            graph.clone(),
            editor,
            Arc::new(AstEditorRegistry::with_token_fallback()),
            Arc::new(UndoLog::new(dir.path().join("undo"), dir.path())),
            EditOptions::default(),
        );

        Fixture {
            _dir: dir,
            def_path,
            caller_path,
            graph,
            refactorer,
        }
    }

    #[tokio::test]
    async fn rename_function_project_scope_touches_callers() {
        let fx = fixture();
        let outcome = fx
            .refactorer
            .rename_function("MyApp.Worker", "foo", "bar", 2, RefactorScope::Project)
            .await
            .unwrap();

        assert_eq!(outcome.files_modified.len(), 2);
        let def = fs::read_to_string(&fx.def_path).unwrap();
        let caller = fs::read_to_string(&fx.caller_path).unwrap();
        assert!(def.contains("def bar(a, b) do"));
        assert!(caller.contains("MyApp.Worker.bar(1, 2)"));
        assert!(!caller.contains("foo"));
    }

    #[tokio::test]
    async fn rename_function_module_scope_leaves_callers_alone() {
        let fx = fixture();
        fx.refactorer
            .rename_function("MyApp.Worker", "foo", "bar", 2, RefactorScope::Module)
            .await
            .unwrap();

        assert!(fs::read_to_string(&fx.def_path).unwrap().contains("def bar"));
        assert_eq!(fs::read_to_string(&fx.caller_path).unwrap(), CALLER_FILE);
    }

    #[tokio::test]
    async fn rename_unknown_function_fails_without_touching_files() {
        let fx = fixture();
        let err = fx
            .refactorer
            .rename_function("MyApp.Worker", "ghost", "x", 1, RefactorScope::Project)
            .await
            .unwrap_err();
        assert!(matches!(err, RefactorError::NotFound { .. }));
        assert_eq!(fs::read_to_string(&fx.def_path).unwrap(), DEF_FILE);
    }

    #[tokio::test]
    async fn successful_rename_records_undo_entry() {
        let fx = fixture();
        fx.refactorer
            .rename_function("MyApp.Worker", "foo", "bar", 2, RefactorScope::Project)
            .await
            .unwrap();

        let entries = fx.refactorer.undo_log().list(10, true).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, "rename_function");
        assert_eq!(entries[0].outcome, UndoOutcome::Success);
        assert_eq!(entries[0].snapshots.len(), 2);

        // Undo restores both files
        fx.refactorer.undo_log().undo().unwrap();
        assert_eq!(fs::read_to_string(&fx.def_path).unwrap(), DEF_FILE);
        assert_eq!(fs::read_to_string(&fx.caller_path).unwrap(), CALLER_FILE);
    }

    #[tokio::test]
    async fn rename_module_rewrites_definition_file() {
        let fx = fixture();
        let outcome = fx
            .refactorer
            .rename_module("MyApp.Worker", "MyApp.Laborer", RefactorScope::Module)
            .await
            .unwrap();
        assert_eq!(outcome.files_modified.len(), 1);
        assert!(fs::read_to_string(&fx.def_path)
            .unwrap()
            .starts_with("defmodule MyApp.Laborer do"));
    }

    #[tokio::test]
    async fn move_function_to_new_file() {
        let fx = fixture();
        let target = fx.def_path.parent().unwrap().join("helpers.ex");
        let outcome = fx
            .refactorer
            .move_function(
                "MyApp.Worker",
                "foo",
                2,
                "MyApp.Helpers",
                Some(&target),
            )
            .await
            .unwrap();

        assert_eq!(outcome.files_modified.len(), 2);
        let source = fs::read_to_string(&fx.def_path).unwrap();
        let moved = fs::read_to_string(&target).unwrap();
        assert!(!source.contains("def foo"));
        assert!(moved.contains("def foo(a, b) do"));
    }

    #[tokio::test]
    async fn move_function_to_existing_module_file() {
        let fx = fixture();
        let target = fx.def_path.parent().unwrap().join("other.ex");
        fs::write(&target, "defmodule MyApp.Other do\n  def keep, do: :ok\nend\n").unwrap();
        fx.graph.add_node(
            Node::new(EntityId::module("MyApp.Other"))
                .with_attr("file", target.to_string_lossy().to_string()),
        );

        fx.refactorer
            .move_function("MyApp.Worker", "foo", 2, "MyApp.Other", None)
            .await
            .unwrap();

        let moved = fs::read_to_string(&target).unwrap();
        assert!(moved.contains("def keep, do: :ok"));
        assert!(moved.contains("def foo(a, b) do"));
        // Definition landed before the module's closing end
        assert!(moved.trim_end().ends_with("end"));
    }
}
