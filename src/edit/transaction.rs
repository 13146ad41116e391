//! Multi-file transactions
//!
//! A transaction is a list of per-file edits committed all-or-nothing:
//! every file is pre-checked first, edits then apply sequentially through
//! the editor contract, and the first failure rolls back every
//! already-edited file from its snapshot, in reverse order. Rollback is
//! best-effort; per-path rollback failures are reported but do not stop
//! the rest of the rollback.

use super::change::{apply_changes, Change};
use super::editor::{EditOptions, Editor};
use super::validate::Verdict;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// One file's worth of changes in a transaction
#[derive(Debug, Clone)]
pub struct FileEdit {
    pub path: PathBuf,
    pub changes: Vec<Change>,
    /// Overrides the transaction's shared options for this file
    pub opts: Option<EditOptions>,
}

impl FileEdit {
    pub fn new(path: impl Into<PathBuf>, changes: Vec<Change>) -> Self {
        Self {
            path: path.into(),
            changes,
            opts: None,
        }
    }
}

/// Overall transaction outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Success,
    Failure,
}

/// A successfully edited file within the transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEditResult {
    pub path: PathBuf,
    pub backup_id: Option<String>,
    pub lines_changed: usize,
}

/// A per-file failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionError {
    pub path: PathBuf,
    pub reason: String,
}

/// What the commit did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReport {
    pub status: TransactionStatus,
    pub files_edited: usize,
    pub results: Vec<FileEditResult>,
    pub errors: Vec<TransactionError>,
    pub rolled_back: bool,
    /// Paths whose rollback itself failed; these may be left modified
    pub rollback_failures: Vec<PathBuf>,
}

impl TransactionReport {
    fn failure(errors: Vec<TransactionError>) -> Self {
        Self {
            status: TransactionStatus::Failure,
            files_edited: 0,
            results: Vec::new(),
            errors,
            rolled_back: false,
            rollback_failures: Vec::new(),
        }
    }
}

/// An all-or-nothing batch of file edits
pub struct Transaction {
    edits: Vec<FileEdit>,
    shared_opts: EditOptions,
}

impl Transaction {
    pub fn new(shared_opts: EditOptions) -> Self {
        Self {
            edits: Vec::new(),
            shared_opts,
        }
    }

    pub fn add(&mut self, edit: FileEdit) -> &mut Self {
        self.edits.push(edit);
        self
    }

    pub fn with_edit(mut self, edit: FileEdit) -> Self {
        self.edits.push(edit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Effective options for one edit; backups are forced on because the
    /// rollback path depends on them
    fn effective_opts(&self, edit: &FileEdit) -> EditOptions {
        let mut opts = edit.opts.clone().unwrap_or_else(|| self.shared_opts.clone());
        opts.backup = true;
        opts
    }

    /// Commit every edit, or none
    pub async fn commit(&self, editor: &Editor) -> TransactionReport {
        // Pre-check: every file must read, apply, and validate cleanly
        // before anything is written.
        for edit in &self.edits {
            let opts = self.effective_opts(edit);
            let content = match std::fs::read_to_string(&edit.path) {
                Ok(content) => content,
                Err(e) => {
                    return TransactionReport::failure(vec![TransactionError {
                        path: edit.path.clone(),
                        reason: format!("read failed: {}", e),
                    }]);
                }
            };
            let candidate = match apply_changes(&content, &edit.changes) {
                Ok(candidate) => candidate,
                Err(e) => {
                    return TransactionReport::failure(vec![TransactionError {
                        path: edit.path.clone(),
                        reason: e.to_string(),
                    }]);
                }
            };
            if opts.validate {
                if let Verdict::Invalid(issues) =
                    editor.validators().validate(&candidate, &edit.path).await
                {
                    let reason = issues
                        .iter()
                        .map(|i| i.message.as_str())
                        .collect::<Vec<_>>()
                        .join("; ");
                    return TransactionReport::failure(vec![TransactionError {
                        path: edit.path.clone(),
                        reason: format!("validation failed: {}", reason),
                    }]);
                }
            }
        }

        // Apply phase.
        let mut results: Vec<FileEditResult> = Vec::new();
        for edit in &self.edits {
            let opts = self.effective_opts(edit);
            match editor.edit_file(&edit.path, &edit.changes, &opts).await {
                Ok(outcome) => results.push(FileEditResult {
                    path: outcome.path,
                    backup_id: outcome.backup_id,
                    lines_changed: outcome.lines_changed,
                }),
                Err(e) => {
                    // Roll back what already landed, newest first.
                    let mut rollback_failures = Vec::new();
                    for done in results.iter().rev() {
                        if let Err(rollback_err) =
                            editor.rollback(&done.path, done.backup_id.as_deref())
                        {
                            warn!(path = %done.path.display(), error = %rollback_err,
                                "rollback failed; file may be left modified");
                            rollback_failures.push(done.path.clone());
                        }
                    }
                    return TransactionReport {
                        status: TransactionStatus::Failure,
                        files_edited: 0,
                        results: Vec::new(),
                        errors: vec![TransactionError {
                            path: edit.path.clone(),
                            reason: e.to_string(),
                        }],
                        rolled_back: true,
                        rollback_failures,
                    };
                }
            }
        }

        TransactionReport {
            status: TransactionStatus::Success,
            files_edited: results.len(),
            results,
            errors: Vec::new(),
            rolled_back: false,
            rollback_failures: Vec::new(),
        }
    }
}
